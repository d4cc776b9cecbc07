#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{geometry::Rect, id::Id};

/// Constraints that every bin created by a packer follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PackingOptions {
    /// Whether rectangles may be turned 90 degrees to fit better. Individual
    /// rectangles can override this with `PlacedRect::with_allow_rotation`.
    pub allow_rotation: bool,

    /// Gap kept between neighbouring rectangles on the X axis.
    pub padding_horizontal: i32,

    /// Gap kept between neighbouring rectangles on the Y axis.
    pub padding_vertical: i32,

    /// Empty margin kept along every edge of a bin.
    pub edge_border: i32,

    pub max_width: i32,
    pub max_height: i32,

    /// Round bin dimensions up to the next power of two as they grow.
    pub output_pages_as_power_of_two: bool,
}

impl Default for PackingOptions {
    fn default() -> Self {
        Self {
            allow_rotation: false,
            padding_horizontal: 2,
            padding_vertical: 2,
            edge_border: 2,
            max_width: 4096,
            max_height: 4096,
            output_pages_as_power_of_two: true,
        }
    }
}

impl PackingOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_size(self, max_size: (i32, i32)) -> Self {
        Self {
            max_width: max_size.0,
            max_height: max_size.1,
            ..self
        }
    }

    pub fn with_padding(self, horizontal: i32, vertical: i32) -> Self {
        Self {
            padding_horizontal: horizontal,
            padding_vertical: vertical,
            ..self
        }
    }

    pub fn with_edge_border(self, edge_border: i32) -> Self {
        Self {
            edge_border,
            ..self
        }
    }

    pub fn with_rotation(self, allow_rotation: bool) -> Self {
        Self {
            allow_rotation,
            ..self
        }
    }

    pub fn with_power_of_two(self, output_pages_as_power_of_two: bool) -> Self {
        Self {
            output_pages_as_power_of_two,
            ..self
        }
    }

    #[inline]
    pub fn max_size(&self) -> (i32, i32) {
        (self.max_width, self.max_height)
    }

    pub(crate) fn assert_valid(&self) {
        assert!(
            self.padding_horizontal >= 0 && self.padding_vertical >= 0,
            "padding must not be negative: {:?}",
            self
        );
        assert!(
            self.edge_border >= 0,
            "edge border must not be negative: {:?}",
            self
        );
        assert!(
            self.max_width > 0 && self.max_height > 0,
            "maximum bin size must be positive: {:?}",
            self
        );
    }
}

/// A rectangle handed to a packer, along with the consumer's data for it.
///
/// Position and rotation are written by the bin that accepts the rectangle.
/// Every mutation made through the setters bumps a dirty counter, which is
/// how `repack` finds rectangles whose layout needs to be recomputed.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PlacedRect<T = ()> {
    id: Id,
    x: i32,
    y: i32,
    width: i32,
    height: i32,
    rotated: bool,

    /// Set while the packer has turned the rectangle an odd number of times,
    /// as opposed to the caller handing it over already rotated.
    #[cfg_attr(feature = "serde", serde(default))]
    turned: bool,

    allow_rotation: Option<bool>,
    oversized: bool,
    tag: Option<String>,
    dirty: u32,
    sequence: Option<u64>,
    data: T,
}

impl PlacedRect<()> {
    #[inline]
    pub fn new(size: (i32, i32)) -> Self {
        Self::with_data(size, ())
    }
}

impl<T> PlacedRect<T> {
    pub fn with_data(size: (i32, i32), data: T) -> Self {
        assert!(
            size.0 > 0 && size.1 > 0,
            "rectangles must have a positive size, got {}x{}",
            size.0,
            size.1
        );

        Self {
            id: Id::new(),
            x: 0,
            y: 0,
            width: size.0,
            height: size.1,
            rotated: false,
            turned: false,
            allow_rotation: None,
            oversized: false,
            tag: None,
            dirty: 0,
            sequence: None,
            data,
        }
    }

    /// Marks the rectangle as already rotated without swapping its size.
    pub fn with_rotated(mut self, rotated: bool) -> Self {
        self.rotated = rotated;
        self
    }

    pub fn with_allow_rotation(mut self, allow_rotation: Option<bool>) -> Self {
        self.allow_rotation = allow_rotation;
        self
    }

    pub fn with_tag<S: Into<String>>(mut self, tag: S) -> Self {
        self.tag = Some(tag.into());
        self
    }

    #[inline]
    pub fn id(&self) -> Id {
        self.id
    }

    #[inline]
    pub fn x(&self) -> i32 {
        self.x
    }

    #[inline]
    pub fn y(&self) -> i32 {
        self.y
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
    pub fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    #[inline]
    pub fn size(&self) -> (i32, i32) {
        (self.width, self.height)
    }

    #[inline]
    pub fn is_rotated(&self) -> bool {
        self.rotated
    }

    #[inline]
    pub fn allow_rotation(&self) -> Option<bool> {
        self.allow_rotation
    }

    #[inline]
    pub fn is_oversized(&self) -> bool {
        self.oversized
    }

    #[inline]
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// How many mutations happened since the owning bin last cleared its
    /// dirty state.
    #[inline]
    pub fn dirty_count(&self) -> u32 {
        self.dirty
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty > 0
    }

    #[inline]
    pub fn data(&self) -> &T {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut T {
        &mut self.data
    }

    pub fn into_data(self) -> T {
        self.data
    }

    #[inline]
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    pub fn area(&self) -> i64 {
        self.rect().area()
    }

    pub fn collides<U>(&self, other: &PlacedRect<U>) -> bool {
        self.rect().collides(&other.rect())
    }

    pub fn contains<U>(&self, other: &PlacedRect<U>) -> bool {
        self.rect().contains(&other.rect())
    }

    pub fn set_x(&mut self, x: i32) {
        if x != self.x {
            self.x = x;
            self.dirty += 1;
        }
    }

    pub fn set_y(&mut self, y: i32) {
        if y != self.y {
            self.y = y;
            self.dirty += 1;
        }
    }

    pub fn set_width(&mut self, width: i32) {
        assert!(width > 0, "rectangle width must be positive, got {}", width);

        if width != self.width {
            self.width = width;
            self.dirty += 1;
        }
    }

    pub fn set_height(&mut self, height: i32) {
        assert!(height > 0, "rectangle height must be positive, got {}", height);

        if height != self.height {
            self.height = height;
            self.dirty += 1;
        }
    }

    pub fn set_size(&mut self, size: (i32, i32)) {
        self.set_width(size.0);
        self.set_height(size.1);
    }

    /// Turns the rectangle by 90 degrees, swapping its width and height.
    ///
    /// Requests are ignored when the value is unchanged or when rotation was
    /// explicitly disallowed for this rectangle.
    pub fn set_rotated(&mut self, rotated: bool) {
        if self.allow_rotation == Some(false) || rotated == self.rotated {
            return;
        }

        let (width, height) = (self.width, self.height);
        self.set_width(height);
        self.set_height(width);
        self.rotated = rotated;
        self.dirty += 1;
    }

    pub fn set_allow_rotation(&mut self, allow_rotation: Option<bool>) {
        if allow_rotation != self.allow_rotation {
            self.allow_rotation = allow_rotation;
            self.dirty += 1;
        }
    }

    pub fn set_tag(&mut self, tag: Option<String>) {
        if tag != self.tag {
            self.tag = tag;
            self.dirty += 1;
        }
    }

    /// Flags the rectangle for relayout without changing any field, for
    /// consumers whose payload changed in a way that affects packing.
    pub fn mark_dirty(&mut self) {
        self.dirty += 1;
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty = 0;
    }

    /// Turns the rectangle on the packer's behalf.
    pub(crate) fn turn(&mut self) {
        let rotated = !self.rotated;
        self.set_rotated(rotated);
        self.turned = !self.turned;
    }

    /// Undoes every turn the packer made, leaving the orientation the caller
    /// handed the rectangle over in.
    pub(crate) fn unturn(&mut self) {
        if self.turned {
            self.turn();
        }
    }

    pub(crate) fn set_oversized(&mut self, oversized: bool) {
        self.oversized = oversized;
    }

    pub(crate) fn sequence(&self) -> Option<u64> {
        self.sequence
    }

    pub(crate) fn stamp_sequence(&mut self, next: &mut u64) {
        if self.sequence.is_none() {
            self.sequence = Some(*next);
            *next += 1;
        }
    }

    /// The longer side, which is the order packers feed rectangles in.
    pub(crate) fn long_side(&self) -> i32 {
        self.width.max(self.height)
    }
}

/// Where a packer put a rectangle.
///
/// This is a copy of the layout at the time it was returned. Consumer data
/// stays inside the packer and is reachable through `id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Placement {
    pub id: Id,
    pub bin_index: usize,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub rotated: bool,
    pub oversized: bool,
}

impl Placement {
    pub(crate) fn of<T>(bin_index: usize, rect: &PlacedRect<T>) -> Self {
        Self {
            id: rect.id(),
            bin_index,
            x: rect.x(),
            y: rect.y(),
            width: rect.width(),
            height: rect.height(),
            rotated: rect.is_rotated(),
            oversized: rect.is_oversized(),
        }
    }

    #[inline]
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}
