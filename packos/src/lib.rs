//! Packos packs rectangles into bins using the MaxRects algorithm. It's the
//! layout core behind texpack, which lays out sprites onto texture atlas
//! pages.
//!
//! Each bin tracks its free space as a list of possibly overlapping free
//! rectangles, places new rectangles with a best short side fit heuristic,
//! and grows on demand up to a maximum size. [`Packer`][Packer] strings bins
//! together, opens new ones as they fill up, and can lay everything out again
//! after rectangles change.
//!
//! ## Example
//! ```
//! use packos::{Packer, PackingOptions, PlacedRect};
//!
//! // Describe the bins you want to pack into.
//! let options = PackingOptions::new()
//!     .with_max_size((512, 512))
//!     .with_padding(0, 0)
//!     .with_edge_border(0);
//!
//! let mut packer = Packer::new(options);
//!
//! // Rectangles carry whatever data you want to get back out.
//! let placements = packer.add_many(vec![
//!     PlacedRect::with_data((128, 64), "banner"),
//!     PlacedRect::with_data((64, 64), "icon"),
//!     PlacedRect::with_data((1, 300), "divider"),
//! ]);
//!
//! // Placements come back in the same order as the input, but the longest
//! // rectangle was packed first.
//! assert_eq!((placements[2].x, placements[2].y), (0, 0));
//!
//! for placement in &placements {
//!     let name = packer.get(placement.id).unwrap().data();
//!     println!("{} goes on page {}", name, placement.bin_index);
//! }
//! ```
//!
//! [Packer]: struct.Packer.html

mod bin;
mod free_rects;
mod geometry;
mod id;
mod packer;
mod types;

pub use bin::*;
pub use free_rects::*;
pub use geometry::*;
pub use id::*;
pub use packer::*;
pub use types::*;
