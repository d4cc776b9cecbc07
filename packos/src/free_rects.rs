//! Free space bookkeeping for a single MaxRects bin.
//!
//! The free list is a flat set of rectangles that may overlap each other.
//! Placing a rectangle splits every free rectangle it touches into up to four
//! maximal leftovers, and pruning throws away leftovers that are swallowed by
//! another one. The list order is significant: placement ties are broken by
//! it, so every operation here keeps survivors in place and appends new
//! rectangles at the end.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::geometry::Rect;

/// A spot that a rectangle of the requested size can occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fit {
    /// Footprint of the rectangle, including padding, in its fitted
    /// orientation.
    pub node: Rect,

    /// Whether the requested size had to be turned 90 degrees to fit.
    pub rotated: bool,

    /// Smallest leftover gap between the node and its free rectangle.
    pub score: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct FreeRects {
    rects: Vec<Rect>,
}

impl FreeRects {
    pub fn new(bounds: Rect) -> Self {
        Self {
            rects: vec![bounds],
        }
    }

    /// Restores a free list exactly as it was saved. The list can't be
    /// recomputed from placed rectangles once it has been pruned.
    pub fn from_rects(rects: Vec<Rect>) -> Self {
        for rect in &rects {
            assert!(
                rect.width > 0 && rect.height > 0,
                "free rectangles must have a positive size: {:?}",
                rect
            );
        }

        Self { rects }
    }

    pub fn reset(&mut self, bounds: Rect) {
        self.rects.clear();
        self.rects.push(bounds);
    }

    #[inline]
    pub fn as_slice(&self) -> &[Rect] {
        &self.rects
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rect> {
        self.rects.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rects.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Best short side fit search over every free rectangle.
    ///
    /// `size` is the rectangle itself; `padding` is added to whichever
    /// orientation is being scored, so a turned rectangle still carries the
    /// horizontal gap on its X axis.
    ///
    /// The upright orientation is scored before the rotated one for each free
    /// rectangle, and only a strictly smaller score replaces the current best.
    pub fn find_best_placement(
        &self,
        size: (i32, i32),
        padding: (i32, i32),
        allow_rotation: bool,
    ) -> Option<Fit> {
        let (width, height) = (size.0 + padding.0, size.1 + padding.1);
        let (turned_width, turned_height) = (size.1 + padding.0, size.0 + padding.1);

        let mut best: Option<Fit> = None;
        let mut best_score = i32::MAX;

        for free in &self.rects {
            if free.width >= width && free.height >= height {
                let score = (free.width - width).min(free.height - height);
                if score < best_score {
                    best_score = score;
                    best = Some(Fit {
                        node: Rect::new(free.x, free.y, width, height),
                        rotated: false,
                        score,
                    });
                }
            }

            if !allow_rotation {
                continue;
            }

            if free.width >= turned_width && free.height >= turned_height {
                let score = (free.width - turned_width).min(free.height - turned_height);
                if score < best_score {
                    best_score = score;
                    best = Some(Fit {
                        node: Rect::new(free.x, free.y, turned_width, turned_height),
                        rotated: true,
                        score,
                    });
                }
            }
        }

        best
    }

    /// Carves `node` out of the free space.
    pub fn commit(&mut self, node: &Rect) {
        let mut remaining = self.rects.len();
        let mut i = 0;

        while i < remaining {
            if self.split(i, node) {
                self.rects.remove(i);
                remaining -= 1;
            } else {
                i += 1;
            }
        }

        self.prune();
    }

    /// Appends the leftovers of the free rectangle at `index` around `used`.
    /// Returns false, leaving the list alone, if they don't touch.
    fn split(&mut self, index: usize, used: &Rect) -> bool {
        let free = self.rects[index];

        if !free.collides(used) {
            return false;
        }

        if used.x < free.right() && used.right() > free.x {
            if used.y > free.y && used.y < free.bottom() {
                self.rects
                    .push(Rect::new(free.x, free.y, free.width, used.y - free.y));
            }

            if used.bottom() < free.bottom() {
                self.rects.push(Rect::new(
                    free.x,
                    used.bottom(),
                    free.width,
                    free.bottom() - used.bottom(),
                ));
            }
        }

        if used.y < free.bottom() && used.bottom() > free.y {
            if used.x > free.x && used.x < free.right() {
                self.rects
                    .push(Rect::new(free.x, free.y, used.x - free.x, free.height));
            }

            if used.right() < free.right() {
                self.rects.push(Rect::new(
                    used.right(),
                    free.y,
                    free.right() - used.right(),
                    free.height,
                ));
            }
        }

        true
    }

    /// Drops every free rectangle that another free rectangle contains.
    pub fn prune(&mut self) {
        let mut i = 0;

        'outer: while i < self.rects.len() {
            let mut j = i + 1;

            while j < self.rects.len() {
                if self.rects[j].contains(&self.rects[i]) {
                    self.rects.remove(i);
                    continue 'outer;
                }

                if self.rects[i].contains(&self.rects[j]) {
                    self.rects.remove(j);
                } else {
                    j += 1;
                }
            }

            i += 1;
        }
    }

    /// Accounts for a bin growing from `old_size` to `new_size`.
    ///
    /// Both sizes are the bin's visible size; `padding` and `border` are the
    /// bin's gap settings. Free rectangles that reached the old outer edge are
    /// stretched (or clipped) to the new one, and the two freshly uncovered
    /// strips along the right and bottom are added.
    pub fn grow(
        &mut self,
        old_size: (i32, i32),
        new_size: (i32, i32),
        padding: (i32, i32),
        border: i32,
    ) {
        let (old_width, old_height) = old_size;
        let total_width = new_size.0 + padding.0;
        let total_height = new_size.1 + padding.1;

        let stale_right = (old_width + padding.0 - border).min(total_width);
        let stale_bottom = (old_height + padding.1 - border).min(total_height);

        for rect in &mut self.rects {
            if rect.right() >= stale_right {
                rect.width = total_width - rect.x - border;
            }

            if rect.bottom() >= stale_bottom {
                rect.height = total_height - rect.y - border;
            }
        }

        self.rects.push(Rect::new(
            old_width + padding.0 - border,
            border,
            total_width - old_width - padding.0,
            total_height - border * 2,
        ));

        self.rects.push(Rect::new(
            border,
            old_height + padding.1 - border,
            total_width - border * 2,
            total_height - old_height - padding.1,
        ));

        self.rects.retain(|rect| {
            rect.width > 0 && rect.height > 0 && rect.x >= border && rect.y >= border
        });

        self.prune();
    }
}
