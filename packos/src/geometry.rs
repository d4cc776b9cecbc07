#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle in bin space.
///
/// Free space and placed footprints both use this type. Coordinates are signed
/// because intermediate growth math can step past the edge border before
/// degenerate rectangles are filtered out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    #[inline]
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[inline]
    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    #[inline]
    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    #[inline]
    pub fn area(&self) -> i64 {
        i64::from(self.width) * i64::from(self.height)
    }

    /// Open-interval intersection: rectangles that only share an edge do not
    /// collide.
    pub fn collides(&self, other: &Rect) -> bool {
        other.x < self.right()
            && other.right() > self.x
            && other.y < self.bottom()
            && other.bottom() > self.y
    }

    /// Whether `other` lies entirely inside this rectangle's closed bounds.
    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }
}
