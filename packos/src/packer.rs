use std::cmp::Reverse;

use crate::{
    bin::{Bin, BinSnapshot, MaxRectsBin, OversizedBin},
    id::Id,
    types::{PackingOptions, PlacedRect, Placement},
};

/// Packs rectangles into as many MaxRects bins as it takes.
///
/// Rectangles are moved into the packer; each call returns a `Placement`
/// describing where a rectangle ended up, and the rectangle itself stays
/// reachable through its `Id`.
#[derive(Debug, Clone)]
pub struct Packer<T = ()> {
    options: PackingOptions,
    bins: Vec<Bin<T>>,

    /// Index of the first bin that still accepts new rectangles.
    lock_index: usize,

    next_sequence: u64,
}

impl<T> Packer<T> {
    pub fn new(options: PackingOptions) -> Self {
        options.assert_valid();

        Self {
            options,
            bins: Vec::new(),
            lock_index: 0,
            next_sequence: 0,
        }
    }

    #[inline]
    pub fn options(&self) -> &PackingOptions {
        &self.options
    }

    #[inline]
    pub fn bins(&self) -> &[Bin<T>] {
        &self.bins
    }

    #[inline]
    pub fn lock_index(&self) -> usize {
        self.lock_index
    }

    pub fn get(&self, id: Id) -> Option<&PlacedRect<T>> {
        self.bins.iter().find_map(|bin| bin.get(id))
    }

    /// Gives mutable access to a packed rectangle. Changes made through the
    /// setters mark its bin dirty for the next `repack`.
    pub fn get_mut(&mut self, id: Id) -> Option<&mut PlacedRect<T>> {
        self.bins.iter_mut().find_map(|bin| bin.get_mut(id))
    }

    pub fn placement(&self, id: Id) -> Option<Placement> {
        self.bins.iter().enumerate().find_map(|(index, bin)| {
            bin.get(id).map(|rect| Placement::of(index, rect))
        })
    }

    /// Every placement, bin by bin, in the order each bin accepted them.
    pub fn placements(&self) -> Vec<Placement> {
        self.bins
            .iter()
            .enumerate()
            .flat_map(|(index, bin)| bin.rects().iter().map(move |rect| Placement::of(index, rect)))
            .collect()
    }

    pub fn is_dirty(&self) -> bool {
        self.bins.iter().any(Bin::is_dirty)
    }

    pub fn clear_dirty(&mut self) {
        self.bins.iter_mut().for_each(Bin::clear_dirty);
    }

    /// Drops every bin.
    pub fn reset(&mut self) {
        self.bins.clear();
        self.lock_index = 0;
    }

    pub fn add(&mut self, size: (i32, i32), data: T) -> Placement {
        self.add_one(PlacedRect::with_data(size, data))
    }

    /// Packs a single rectangle into the first open bin that takes it,
    /// opening a new bin when none does.
    pub fn add_one(&mut self, mut rect: PlacedRect<T>) -> Placement {
        rect.stamp_sequence(&mut self.next_sequence);
        self.place(rect)
    }

    /// Packs a batch of rectangles, longest side first.
    ///
    /// Placements are returned in the same order as the input.
    pub fn add_many<I>(&mut self, rects: I) -> Vec<Placement>
    where
        I: IntoIterator<Item = PlacedRect<T>>,
    {
        let rects: Vec<_> = rects
            .into_iter()
            .map(|mut rect| {
                rect.stamp_sequence(&mut self.next_sequence);
                rect
            })
            .collect();

        let order = packing_order(&rects);
        let mut slots: Vec<_> = rects.into_iter().map(Some).collect();
        let mut placements = Vec::with_capacity(slots.len());

        for index in order {
            if let Some(rect) = slots[index].take() {
                placements.push((index, self.place(rect)));
            }
        }

        placements.sort_by_key(|&(index, _)| index);
        placements
            .into_iter()
            .map(|(_, placement)| placement)
            .collect()
    }

    /// Closes every existing bin; later rectangles start on a new one.
    pub fn next_page(&mut self) -> usize {
        self.lock_index = self.bins.len();

        log::trace!("Starting a new page at bin {}", self.lock_index);

        self.lock_index
    }

    /// Lays out changed rectangles again.
    ///
    /// A quick repack only touches dirty bins, and whatever no longer fits is
    /// offered to the open bins (those at or after the page lock) before new
    /// bins are opened. A deep repack throws every bin away and packs all
    /// rectangles again in the order they were first added. Turns made by
    /// the packer are undone first; a rectangle added already rotated keeps
    /// that orientation, so the result matches a fresh pack of the same
    /// input.
    ///
    /// Returns the placements of every rectangle that went through the
    /// packer again: the leftovers for a quick repack, everything for a deep
    /// one.
    pub fn repack(&mut self, deep: bool) -> Vec<Placement> {
        if deep {
            return self.deep_repack();
        }

        let mut leftovers = Vec::new();

        for bin in self.bins.iter_mut().filter(|bin| bin.is_dirty()) {
            leftovers.extend(bin.repack());
        }

        log::debug!(
            "Quick repack left {} rects to place again",
            leftovers.len()
        );

        if leftovers.is_empty() {
            return Vec::new();
        }

        self.add_many(leftovers)
    }

    fn deep_repack(&mut self) -> Vec<Placement> {
        let mut rects: Vec<_> = self
            .bins
            .drain(..)
            .flat_map(Bin::into_rects)
            .collect();

        rects.sort_by_key(|rect| rect.sequence());
        self.lock_index = 0;

        // Orientation is decided again from the caller's input, which keeps a
        // second deep repack from landing anywhere else.
        for rect in &mut rects {
            rect.unturn();
        }

        log::debug!("Deep repack of {} rects", rects.len());

        self.add_many(rects)
    }

    /// Captures the state of every bin, free lists included, so packing can
    /// continue later from exactly this point.
    pub fn save(&self) -> Vec<BinSnapshot<T>>
    where
        T: Clone,
    {
        self.bins.iter().map(Bin::snapshot).collect()
    }

    /// Replaces all bins with ones restored from `snapshots`.
    pub fn load(&mut self, snapshots: Vec<BinSnapshot<T>>) {
        self.bins = snapshots.into_iter().map(Bin::from_snapshot).collect();
        self.lock_index = 0;
        self.next_sequence = self
            .bins
            .iter()
            .flat_map(Bin::rects)
            .filter_map(PlacedRect::sequence)
            .max()
            .map_or(0, |last| last + 1);

        log::debug!("Loaded {} bins", self.bins.len());
    }

    fn place(&mut self, rect: PlacedRect<T>) -> Placement {
        if rect.width() > self.options.max_width || rect.height() > self.options.max_height {
            return self.push_oversized(rect);
        }

        let mut rect = rect;

        for index in self.lock_index..self.bins.len() {
            match self.bins[index].add(rect) {
                Ok(placed) => return Placement::of(index, placed),
                Err(rejected) => rect = rejected,
            }
        }

        let mut bin = MaxRectsBin::new(self.options);
        let index = self.bins.len();

        let placement = match bin.add(rect) {
            Ok(placed) => Placement::of(index, placed),

            // It's within the maximum size, but not once the border and
            // padding are taken out.
            Err(rect) => return self.push_oversized(rect),
        };

        log::debug!(
            "Opened bin {} for a {}x{} rect",
            index,
            placement.width,
            placement.height
        );

        self.bins.push(Bin::MaxRects(bin));
        placement
    }

    fn push_oversized(&mut self, rect: PlacedRect<T>) -> Placement {
        let index = self.bins.len();

        log::debug!(
            "Rect {}x{} does not fit a {}x{} bin, giving it bin {} of its own",
            rect.width(),
            rect.height(),
            self.options.max_width,
            self.options.max_height,
            index
        );

        let bin = OversizedBin::new(rect);
        let placement = Placement::of(index, bin.rect());
        self.bins.push(Bin::Oversized(bin));

        placement
    }
}

impl<T> Default for Packer<T> {
    fn default() -> Self {
        Self::new(PackingOptions::default())
    }
}

/// The order a packer feeds rectangles in: longest side first, ties kept in
/// input order. Returns indices into `rects`, which is left untouched.
pub fn packing_order<T>(rects: &[PlacedRect<T>]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..rects.len()).collect();
    order.sort_by_key(|&index| Reverse(rects[index].long_side()));
    order
}

#[cfg(test)]
mod test {
    use super::*;

    fn options() -> PackingOptions {
        PackingOptions::new()
            .with_max_size((1024, 1024))
            .with_padding(0, 0)
            .with_edge_border(0)
            .with_power_of_two(false)
    }

    fn numbers(bin: &Bin<u32>) -> Vec<u32> {
        bin.rects().iter().map(|rect| *rect.data()).collect()
    }

    #[test]
    fn adds_first_rect() {
        let mut packer = Packer::new(options());

        let placement = packer.add((1000, 1000), 1);

        assert_eq!(placement.bin_index, 0);
        assert_eq!(numbers(&packer.bins()[0]), vec![1]);
    }

    #[test]
    fn opens_bin_when_full() {
        let mut packer = Packer::new(options());

        packer.add((1000, 1000), 1);
        let placement = packer.add((1000, 1000), 2);

        assert_eq!(packer.bins().len(), 2);
        assert_eq!(placement.bin_index, 1);
        assert_eq!(numbers(&packer.bins()[1]), vec![2]);
    }

    #[test]
    fn reuses_existing_bins() {
        let mut packer = Packer::new(options());

        packer.add((1000, 1000), 1);
        packer.add((1000, 1000), 2);
        packer.add((10, 10), 3);
        packer.add((10, 10), 4);

        assert_eq!(packer.bins().len(), 2);
        assert_eq!(numbers(&packer.bins()[0]), vec![1, 3, 4]);
    }

    #[test]
    fn next_page_locks_existing_bins() {
        let mut packer = Packer::new(options());

        packer.add((1000, 1000), 1);
        packer.add((1000, 1000), 2);
        assert_eq!(packer.next_page(), 2);

        packer.add((10, 10), 3);
        packer.add((10, 10), 4);

        assert_eq!(packer.bins().len(), 3);
        assert_eq!(numbers(&packer.bins()[2]), vec![3, 4]);
    }

    #[test]
    fn oversized_rects_get_their_own_bin() {
        let mut packer = Packer::new(options());

        packer.add((1000, 1000), 1);
        let placement = packer.add((2000, 2000), 2);

        assert_eq!(packer.bins().len(), 2);
        assert!(placement.oversized);
        assert_eq!(placement.bin_index, 1);
        assert_eq!((placement.x, placement.y), (0, 0));

        let bin = &packer.bins()[1];
        assert!(bin.is_oversized());
        assert_eq!(bin.size(), (2000, 2000));
        assert_eq!(bin.rects()[0].width(), 2000);
        assert!(bin.rects()[0].is_oversized());

        // The regular bin is untouched and still takes rects.
        assert_eq!(packer.add((10, 10), 3).bin_index, 0);
    }

    #[test]
    fn rects_too_big_once_border_is_applied_are_oversized() {
        let mut packer = Packer::new(options().with_edge_border(5));

        let placement = packer.add((1024, 1024), 1);

        assert!(placement.oversized);
        assert_eq!(packer.bins().len(), 1);
        assert!(packer.bins()[0].is_oversized());
    }

    #[test]
    fn packing_order_leaves_input_alone() {
        let input = vec![
            PlacedRect::new((1, 1)),
            PlacedRect::new((3, 1)),
            PlacedRect::new((2, 2)),
        ];

        let order = packing_order(&input);

        assert_eq!(order, vec![1, 2, 0]);
        assert_eq!(input[0].width(), 1);
    }

    #[test]
    fn packing_order_is_stable() {
        let input = vec![
            PlacedRect::new((5, 1)),
            PlacedRect::new((1, 5)),
            PlacedRect::new((9, 9)),
            PlacedRect::new((5, 5)),
        ];

        assert_eq!(packing_order(&input), vec![2, 0, 1, 3]);
    }

    #[test]
    fn add_many_empty() {
        let mut packer: Packer<u32> = Packer::new(options());

        assert!(packer.add_many(Vec::new()).is_empty());
        assert!(packer.bins().is_empty());
    }

    #[test]
    fn add_many_single() {
        let mut packer = Packer::new(options());

        packer.add_many(vec![PlacedRect::with_data((1000, 1000), 1)]);

        assert_eq!(packer.bins().len(), 1);
    }

    #[test]
    fn add_many_places_big_rects_first() {
        let mut packer = Packer::new(options());

        let placements = packer.add_many(vec![
            PlacedRect::with_data((600, 20), 1),
            PlacedRect::with_data((600, 20), 2),
            PlacedRect::with_data((1000, 1000), 3),
            PlacedRect::with_data((1000, 1000), 4),
        ]);

        assert_eq!(packer.bins().len(), 2);
        assert_eq!(numbers(&packer.bins()[0]), vec![3, 1]);
        assert_eq!(numbers(&packer.bins()[1]), vec![4, 2]);

        // Returned in input order.
        let bins: Vec<usize> = placements.iter().map(|p| p.bin_index).collect();
        assert_eq!(bins, vec![0, 1, 0, 1]);
    }

    #[test]
    fn rotation() {
        let mut packer = Packer::new(options().with_rotation(true));

        packer.add((1024, 512), ());
        let placement = packer.add((512, 1024), ());

        assert!(placement.rotated);
        assert_eq!(placement.bin_index, 0);
        assert_eq!((placement.width, placement.height), (1024, 512));
    }

    #[test]
    fn get_mut_finds_rects_in_any_bin() {
        let mut packer = Packer::new(options());

        packer.add((1000, 1000), 1);
        let second = packer.add((1000, 1000), 2);
        let oversized = packer.add((2000, 10), 3);

        assert_eq!(*packer.get(second.id).unwrap().data(), 2);
        *packer.get_mut(oversized.id).unwrap().data_mut() = 30;
        assert_eq!(*packer.get(oversized.id).unwrap().data(), 30);
        assert_eq!(packer.placement(second.id), Some(second));
    }

    #[test]
    fn save_and_load_continue_packing() {
        let mut packer = Packer::new(options());
        let input = || (1..=4).map(|number| PlacedRect::with_data((512, 512), number));

        packer.add_many(input());
        assert_eq!(packer.bins().len(), 1);
        assert_eq!(packer.bins()[0].rects().len(), 4);

        let snapshots = packer.save();
        assert_eq!(snapshots[0].rects.len(), 4);
        assert_eq!(snapshots[0].free_rects, packer.bins()[0].free_rects());

        let mut resumed = Packer::new(options());
        resumed.load(snapshots);
        assert_eq!(resumed.bins().len(), 1);
        assert_eq!(resumed.bins()[0].rects().len(), 4);

        resumed.add_many(input());
        assert_eq!(resumed.bins().len(), 2);
        assert_eq!(resumed.bins()[0].rects().len(), 4);
        assert_eq!(resumed.bins()[1].rects().len(), 4);
    }

    #[test]
    fn load_keeps_partially_filled_free_space() {
        let mut packer = Packer::new(options());
        packer.add((512, 512), 1);
        packer.add((512, 512), 2);

        let mut resumed = Packer::new(options());
        resumed.load(packer.save());

        let from_saved = resumed.add((512, 512), 3);
        let from_original = packer.add((512, 512), 3);

        assert_eq!(
            (from_saved.bin_index, from_saved.x, from_saved.y),
            (from_original.bin_index, from_original.x, from_original.y)
        );
    }

    #[test]
    fn quick_and_deep_repack() {
        let mut packer = Packer::new(options());

        let big = packer.add((1024, 1024), 0);
        for number in 1..=5 {
            packer.add((512, 512), number);
        }
        assert_eq!(packer.bins().len(), 3);

        packer.clear_dirty();
        packer.get_mut(big.id).unwrap().set_width(512);

        assert!(packer.repack(false).is_empty());
        assert_eq!(packer.bins().len(), 3);

        packer.repack(true);
        assert_eq!(packer.bins().len(), 2);

        packer.get_mut(big.id).unwrap().set_width(1024);
        let moved = packer.repack(false);
        assert_eq!(moved.len(), 2);
        assert_eq!(packer.bins().len(), 3);
    }

    #[test]
    fn deep_repack_keeps_caller_rotation() {
        let input = || {
            vec![
                PlacedRect::with_data((1024, 512), 1),
                PlacedRect::with_data((1024, 512), 2).with_rotated(true),
                PlacedRect::with_data((512, 256), 3),
            ]
        };
        let layout = |packer: &Packer<u32>| -> Vec<_> {
            packer
                .bins()
                .iter()
                .flat_map(Bin::rects)
                .map(|rect| (*rect.data(), rect.rect(), rect.is_rotated()))
                .collect()
        };

        let mut fresh = Packer::new(options().with_rotation(true));
        fresh.add_many(input());

        let mut repacked = Packer::new(options().with_rotation(true));
        repacked.add_many(input());
        repacked.repack(true);

        assert_eq!(layout(&repacked), layout(&fresh));

        let second = &layout(&repacked)[1];
        assert_eq!(second.1.width, 1024);
        assert!(second.2);
    }

    #[test]
    fn load_starts_clean() {
        let mut packer = Packer::new(options());
        packer.add((1024, 100), 1);
        packer.add((1024, 100), 2);
        assert!(packer.is_dirty());

        let mut resumed = Packer::new(options());
        resumed.load(packer.save());

        assert!(!resumed.is_dirty());
        assert!(resumed.repack(false).is_empty());
        assert_eq!(resumed.placements(), packer.placements());
    }

    #[test]
    fn quick_repack_leaves_clean_bins_alone() {
        let mut packer = Packer::new(options());

        packer.add((1000, 1000), 1);
        let placement = packer.add((1000, 1000), 2);
        packer.clear_dirty();

        assert!(!packer.is_dirty());
        assert!(packer.repack(false).is_empty());
        assert_eq!(packer.placement(placement.id), Some(placement));
    }

    #[test]
    fn quick_repack_leftovers_respect_page_lock() {
        let mut packer = Packer::new(options());

        let first = packer.add((1024, 512), 1);
        packer.add((1024, 512), 2);
        packer.add((100, 100), 3);
        packer.next_page();
        packer.add((100, 100), 4);
        packer.clear_dirty();

        // Rect 2 no longer fits next to rect 1. Bin 1 has room for it, but
        // it's behind the lock.
        packer.get_mut(first.id).unwrap().set_height(600);
        let moved = packer.repack(false);

        assert_eq!(moved.len(), 1);
        assert_eq!(moved[0].bin_index, 2);
        assert_eq!((moved[0].x, moved[0].y), (0, 100));
        assert_eq!(numbers(&packer.bins()[0]), vec![1]);
        assert_eq!(numbers(&packer.bins()[1]), vec![3]);
        assert_eq!(numbers(&packer.bins()[2]), vec![4, 2]);
    }
}
