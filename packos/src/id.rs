use std::{
    num::NonZeroUsize,
    sync::atomic::{AtomicUsize, Ordering},
};

static LAST_ID: AtomicUsize = AtomicUsize::new(1);

/// Identifies a rectangle for as long as the process runs.
///
/// Rectangles are moved into bins when they're packed, so the ID is how a
/// consumer finds its rectangle again to read the result or mutate it before
/// a repack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id(NonZeroUsize);

impl Id {
    pub(crate) fn new() -> Self {
        let id = LAST_ID.fetch_add(1, Ordering::SeqCst);
        Id(NonZeroUsize::new(id).unwrap())
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0.get()
    }

    /// Adopts an ID that came from somewhere else (a saved session) and makes
    /// sure freshly allocated IDs never collide with it.
    #[cfg(feature = "serde")]
    fn restore(value: NonZeroUsize) -> Self {
        LAST_ID.fetch_max(value.get() + 1, Ordering::SeqCst);
        Id(value)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Id {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Id {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        NonZeroUsize::deserialize(deserializer).map(Id::restore)
    }
}
