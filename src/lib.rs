//! Texpack lays out sprites onto texture atlas pages.
//!
//! The packing itself is done by [`packos`]. This crate adds what a build
//! tool needs around it: per-atlas configuration read from `texpack.toml`,
//! sessions that save a packer's state between runs so new sprites land
//! around the ones already placed, and the per-page layout report consumed
//! by whatever renders the pages.

mod config;
mod layout;
mod session;

pub use config::*;
pub use layout::*;
pub use session::*;

pub use packos;
