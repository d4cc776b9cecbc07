use std::{convert::TryFrom, slice};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    free_rects::FreeRects,
    geometry::Rect,
    id::Id,
    types::{PackingOptions, PlacedRect},
};

/// A growable bin packed with the MaxRects algorithm.
///
/// A bin starts out 0x0 and grows as rectangles are added, never past the
/// maximum size from its options. The free list always covers at least the
/// area that is still reachable, which before the first placement is the
/// whole maximum working area.
#[derive(Debug, Clone)]
pub struct MaxRectsBin<T = ()> {
    options: PackingOptions,
    width: i32,
    height: i32,
    free: FreeRects,
    rects: Vec<PlacedRect<T>>,

    /// The area the bin already covers. Growth candidates inside of it don't
    /// gain anything.
    stage: Rect,

    /// Prefer growing downwards next, set while the bin is wider than tall.
    vertical_expand: bool,

    dirty: u32,
}

impl<T> MaxRectsBin<T> {
    pub fn new(options: PackingOptions) -> Self {
        options.assert_valid();

        Self {
            options,
            width: 0,
            height: 0,
            free: FreeRects::new(working_area(&options)),
            rects: Vec::new(),
            stage: Rect::default(),
            vertical_expand: false,
            dirty: 0,
        }
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.height
    }

    #[inline]
    pub fn options(&self) -> &PackingOptions {
        &self.options
    }

    #[inline]
    pub fn rects(&self) -> &[PlacedRect<T>] {
        &self.rects
    }

    #[inline]
    pub fn free_rects(&self) -> &[Rect] {
        self.free.as_slice()
    }

    pub fn get(&self, id: Id) -> Option<&PlacedRect<T>> {
        self.rects.iter().find(|rect| rect.id() == id)
    }

    pub fn get_mut(&mut self, id: Id) -> Option<&mut PlacedRect<T>> {
        self.rects.iter_mut().find(|rect| rect.id() == id)
    }

    /// Whether the bin or any of its rectangles changed since the last call
    /// to `clear_dirty`.
    pub fn is_dirty(&self) -> bool {
        self.dirty > 0 || self.rects.iter().any(PlacedRect::is_dirty)
    }

    pub fn mark_dirty(&mut self) {
        self.dirty += 1;
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = 0;
        self.rects.iter_mut().for_each(PlacedRect::clear_dirty);
    }

    /// Places `rect` in the bin, growing the bin if it has to.
    ///
    /// If the rectangle doesn't fit even at the maximum size, it's handed back
    /// untouched.
    pub fn add(&mut self, mut rect: PlacedRect<T>) -> Result<&PlacedRect<T>, PlacedRect<T>> {
        if self.place(&mut rect, true) {
            self.rects.push(rect);
            Ok(&self.rects[self.rects.len() - 1])
        } else {
            Err(rect)
        }
    }

    /// Forgets all free space and returns the bin to 0x0. A deep reset also
    /// drops every placed rectangle.
    pub fn reset(&mut self, deep: bool) {
        if deep {
            self.rects.clear();
        }

        self.width = 0;
        self.height = 0;
        self.free.reset(working_area(&self.options));
        self.stage = Rect::default();
        self.vertical_expand = false;
        self.dirty = 0;
    }

    /// Lays out every rectangle in the bin again, largest first.
    ///
    /// Rectangles that no longer fit are removed from the bin and returned.
    pub fn repack(&mut self) -> Vec<PlacedRect<T>> {
        self.reset(false);

        let mut rects = std::mem::take(&mut self.rects);
        rects.sort_by(|a, b| b.long_side().cmp(&a.long_side()));

        let mut unpacked = Vec::new();

        for mut rect in rects {
            if self.place(&mut rect, true) {
                self.rects.push(rect);
            } else {
                unpacked.push(rect);
            }
        }

        log::trace!(
            "Repacked bin into {}x{}, {} rects kept, {} unpacked",
            self.width,
            self.height,
            self.rects.len(),
            unpacked.len()
        );

        unpacked
    }

    pub fn into_rects(self) -> Vec<PlacedRect<T>> {
        self.rects
    }

    pub fn snapshot(&self) -> BinSnapshot<T>
    where
        T: Clone,
    {
        BinSnapshot {
            width: self.width,
            height: self.height,
            max_width: self.options.max_width,
            max_height: self.options.max_height,
            oversized: false,
            free_rects: self.free.as_slice().to_vec(),
            rects: self.rects.clone(),
            options: self.options,
        }
    }

    /// Rebuilds a bin from a snapshot, taking its free list verbatim.
    ///
    /// The restored bin starts clean: whatever changed before the snapshot was
    /// taken is already part of the saved layout.
    pub fn from_snapshot(snapshot: BinSnapshot<T>) -> Self {
        snapshot.options.assert_valid();

        let mut bin = Self {
            options: snapshot.options,
            width: snapshot.width,
            height: snapshot.height,
            free: FreeRects::from_rects(snapshot.free_rects),
            rects: snapshot.rects,
            stage: Rect::new(0, 0, snapshot.width, snapshot.height),
            vertical_expand: snapshot.width > snapshot.height,
            dirty: 0,
        };

        bin.clear_dirty();
        bin
    }

    fn padding(&self) -> (i32, i32) {
        (
            self.options.padding_horizontal,
            self.options.padding_vertical,
        )
    }

    fn place(&mut self, rect: &mut PlacedRect<T>, allow_growth: bool) -> bool {
        let allow_rotation = rect
            .allow_rotation()
            .unwrap_or(self.options.allow_rotation);

        let fit = self
            .free
            .find_best_placement(rect.size(), self.padding(), allow_rotation);

        if let Some(fit) = fit {
            self.cover(&fit.node);
            self.free.commit(&fit.node);
            self.vertical_expand = self.width > self.height;

            rect.set_x(fit.node.x);
            rect.set_y(fit.node.y);
            if fit.rotated {
                rect.turn();
            }
            rect.set_oversized(false);

            self.dirty += 1;
            return true;
        }

        // Growing rewrites the free list, so the rectangle is searched for
        // again instead of being dropped where the growth candidate was.
        if allow_growth && self.try_grow(rect, allow_rotation) {
            return self.place(rect, false);
        }

        false
    }

    /// Grows the bin so that it covers a node that was just placed.
    fn cover(&mut self, node: &Rect) {
        if self.stage.contains(node) {
            return;
        }

        let (pad_h, pad_v) = self.padding();
        let border = self.options.edge_border;

        let width = self.width.max(node.right() - pad_h + border);
        let height = self.height.max(node.bottom() - pad_v + border);

        let (width, height) = self.round_size(width, height);

        if (width, height) != (self.width, self.height) {
            self.resize(width, height);
        }
    }

    /// Tries to make room for `rect` along the right or bottom edge.
    fn try_grow(&mut self, rect: &PlacedRect<T>, allow_rotation: bool) -> bool {
        let (pad_h, pad_v) = self.padding();
        let border = self.options.edge_border;
        let size = rect.size();
        let footprint = (size.0 + pad_h, size.1 + pad_v);

        let right = Rect::new(self.width + pad_h - border, border, footprint.0, footprint.1);
        let below = Rect::new(border, self.height + pad_v - border, footprint.0, footprint.1);

        let candidates = if self.vertical_expand {
            [below, right]
        } else {
            [right, below]
        };

        candidates
            .iter()
            .any(|candidate| self.grow_to_fit(candidate, size, allow_rotation))
    }

    /// Grows the bin so that a rectangle of `size` fits at the position of
    /// `node`, its padded footprint.
    fn grow_to_fit(&mut self, node: &Rect, size: (i32, i32), allow_rotation: bool) -> bool {
        let border = self.options.edge_border;

        // An empty bin has nowhere to grow from; its working area already
        // covers everything a candidate could reach.
        if node.x < border || node.y < border || self.stage.contains(node) {
            return false;
        }

        let mut width = self.width.max(node.x + size.0 + border);
        let mut height = self.height.max(node.y + size.1 + border);

        if allow_rotation {
            let rotated_width = self.width.max(node.x + size.1 + border);
            let rotated_height = self.height.max(node.y + size.0 + border);

            if area(rotated_width, rotated_height) < area(width, height) {
                width = rotated_width;
                height = rotated_height;
            }
        }

        if width > self.options.max_width || height > self.options.max_height {
            return false;
        }

        let (width, height) = self.round_size(width, height);

        log::trace!(
            "Growing bin from {}x{} to {}x{}",
            self.width,
            self.height,
            width,
            height
        );

        self.resize(width, height);
        true
    }

    /// Applies power-of-two rounding, never past the maximum size.
    fn round_size(&self, width: i32, height: i32) -> (i32, i32) {
        let (max_width, max_height) = self.options.max_size();

        if self.options.output_pages_as_power_of_two {
            (
                next_power_of_two(width, max_width),
                next_power_of_two(height, max_height),
            )
        } else {
            (width.min(max_width), height.min(max_height))
        }
    }

    fn resize(&mut self, width: i32, height: i32) {
        self.free.grow(
            (self.width, self.height),
            (width, height),
            self.padding(),
            self.options.edge_border,
        );

        self.width = width;
        self.height = height;
        self.stage = Rect::new(0, 0, width, height);
    }
}

/// The usable area of an empty bin: the maximum size, minus the border on
/// every side, plus one padding gap that the last rectangle on each axis
/// doesn't need.
fn working_area(options: &PackingOptions) -> Rect {
    let border = options.edge_border;

    Rect::new(
        border,
        border,
        options.max_width + options.padding_horizontal - border * 2,
        options.max_height + options.padding_vertical - border * 2,
    )
}

fn area(width: i32, height: i32) -> i64 {
    i64::from(width) * i64::from(height)
}

/// Rounds `value` up to a power of two, capped at `max`. Powers of two past
/// `i32::MAX` are capped the same way.
fn next_power_of_two(value: i32, max: i32) -> i32 {
    assert!(value > 0, "bin dimensions must be positive, got {}", value);

    (value as u32)
        .checked_next_power_of_two()
        .and_then(|rounded| i32::try_from(rounded).ok())
        .map_or(max, |rounded| rounded.min(max))
}

/// A bin holding a single rectangle that is larger than the maximum bin size.
#[derive(Debug, Clone)]
pub struct OversizedBin<T = ()> {
    rect: PlacedRect<T>,
}

impl<T> OversizedBin<T> {
    pub fn new(mut rect: PlacedRect<T>) -> Self {
        rect.set_x(0);
        rect.set_y(0);
        rect.set_oversized(true);

        Self { rect }
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.rect.width()
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.rect.height()
    }

    #[inline]
    pub fn rect(&self) -> &PlacedRect<T> {
        &self.rect
    }

    /// Options describing this bin: exactly as large as its rectangle.
    pub fn options(&self) -> PackingOptions {
        PackingOptions {
            max_width: self.rect.width(),
            max_height: self.rect.height(),
            output_pages_as_power_of_two: false,
            ..PackingOptions::default()
        }
    }

    pub fn into_rect(self) -> PlacedRect<T> {
        self.rect
    }
}

/// Either kind of bin a packer can hold.
#[derive(Debug, Clone)]
pub enum Bin<T = ()> {
    MaxRects(MaxRectsBin<T>),
    Oversized(OversizedBin<T>),
}

impl<T> Bin<T> {
    pub fn width(&self) -> i32 {
        match self {
            Bin::MaxRects(bin) => bin.width(),
            Bin::Oversized(bin) => bin.width(),
        }
    }

    pub fn height(&self) -> i32 {
        match self {
            Bin::MaxRects(bin) => bin.height(),
            Bin::Oversized(bin) => bin.height(),
        }
    }

    #[inline]
    pub fn size(&self) -> (i32, i32) {
        (self.width(), self.height())
    }

    #[inline]
    pub fn is_oversized(&self) -> bool {
        matches!(self, Bin::Oversized(_))
    }

    pub fn options(&self) -> PackingOptions {
        match self {
            Bin::MaxRects(bin) => *bin.options(),
            Bin::Oversized(bin) => bin.options(),
        }
    }

    pub fn rects(&self) -> &[PlacedRect<T>] {
        match self {
            Bin::MaxRects(bin) => bin.rects(),
            Bin::Oversized(bin) => slice::from_ref(&bin.rect),
        }
    }

    pub fn free_rects(&self) -> &[Rect] {
        match self {
            Bin::MaxRects(bin) => bin.free_rects(),
            Bin::Oversized(_) => &[],
        }
    }

    pub fn get(&self, id: Id) -> Option<&PlacedRect<T>> {
        self.rects().iter().find(|rect| rect.id() == id)
    }

    pub fn get_mut(&mut self, id: Id) -> Option<&mut PlacedRect<T>> {
        match self {
            Bin::MaxRects(bin) => bin.get_mut(id),
            Bin::Oversized(bin) if bin.rect.id() == id => Some(&mut bin.rect),
            Bin::Oversized(_) => None,
        }
    }

    /// Oversized bins never accept more rectangles.
    pub fn add(&mut self, rect: PlacedRect<T>) -> Result<&PlacedRect<T>, PlacedRect<T>> {
        match self {
            Bin::MaxRects(bin) => bin.add(rect),
            Bin::Oversized(_) => Err(rect),
        }
    }

    pub fn reset(&mut self, deep: bool) {
        if let Bin::MaxRects(bin) = self {
            bin.reset(deep);
        }
    }

    pub fn repack(&mut self) -> Vec<PlacedRect<T>> {
        match self {
            Bin::MaxRects(bin) => bin.repack(),
            Bin::Oversized(_) => Vec::new(),
        }
    }

    pub fn is_dirty(&self) -> bool {
        match self {
            Bin::MaxRects(bin) => bin.is_dirty(),
            Bin::Oversized(bin) => bin.rect.is_dirty(),
        }
    }

    pub fn clear_dirty(&mut self) {
        match self {
            Bin::MaxRects(bin) => bin.clear_dirty(),
            Bin::Oversized(bin) => bin.rect.clear_dirty(),
        }
    }

    pub fn into_rects(self) -> Vec<PlacedRect<T>> {
        match self {
            Bin::MaxRects(bin) => bin.into_rects(),
            Bin::Oversized(bin) => vec![bin.into_rect()],
        }
    }

    pub fn snapshot(&self) -> BinSnapshot<T>
    where
        T: Clone,
    {
        match self {
            Bin::MaxRects(bin) => bin.snapshot(),
            Bin::Oversized(bin) => BinSnapshot {
                width: bin.width(),
                height: bin.height(),
                max_width: bin.width(),
                max_height: bin.height(),
                oversized: true,
                free_rects: Vec::new(),
                rects: vec![bin.rect.clone()],
                options: bin.options(),
            },
        }
    }

    pub fn from_snapshot(snapshot: BinSnapshot<T>) -> Self {
        if snapshot.oversized {
            let rect = snapshot
                .rects
                .into_iter()
                .next()
                .expect("oversized bin snapshots must hold a rectangle");

            let mut bin = OversizedBin::new(rect);
            bin.rect.clear_dirty();

            Bin::Oversized(bin)
        } else {
            Bin::MaxRects(MaxRectsBin::from_snapshot(snapshot))
        }
    }
}

/// Everything needed to keep packing into a bin later: its size, the free
/// list as it stands and the rectangles already inside.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BinSnapshot<T = ()> {
    pub width: i32,
    pub height: i32,
    pub max_width: i32,
    pub max_height: i32,
    pub oversized: bool,
    pub free_rects: Vec<Rect>,
    pub rects: Vec<PlacedRect<T>>,
    pub options: PackingOptions,
}
