use std::sync::Arc;

use crate::coords::{TileIndex, Vec2};

use super::{SpriteGrid, SpriteSheet};

/// One sprite, as pushed by the caller.
///
/// Stored column-wise inside [`InstanceStreams`]; this type is only the row view.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct SpriteRecord {
    /// Top-left pixel of the sprite's cell in the sheet.
    pub sheet_offset: Vec2,
    /// Screen position (pixels) the origin is placed at.
    pub position: Vec2,
    /// Pixel size of the cell, which is also the on-screen size.
    pub size: Vec2,
    /// Pivot in sprite-local pixels; rotation happens around it.
    pub origin: Vec2,
    pub rotation: f32,
}

/// Growable per-instance attribute streams.
///
/// Five co-indexed columns, one per shader attribute, so each can be uploaded
/// as one contiguous slice. Columns are only ever resized together: every
/// column holds exactly `len` entries and has room for `capacity`.
///
/// Capacity grows by doubling from 1 (`0 -> 1 -> 2 -> 4 -> ...`) and is kept
/// across [`clear`](Self::clear), so a stream rebuilt every frame stops
/// allocating once it reaches its steady-state size.
#[derive(Debug, Clone, Default)]
pub struct InstanceStreams {
    sheet_offsets: Vec<Vec2>,
    positions: Vec<Vec2>,
    sizes: Vec<Vec2>,
    origins: Vec<Vec2>,
    rotations: Vec<f32>,
    capacity: usize,
}

impl InstanceStreams {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Number of sprites that fit before the next growth.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn push(&mut self, sheet_offset: Vec2, position: Vec2, size: Vec2, origin: Vec2, rotation: f32) {
        if self.len() == self.capacity {
            self.grow();
        }

        self.sheet_offsets.push(sheet_offset);
        self.positions.push(position);
        self.sizes.push(size);
        self.origins.push(origin);
        self.rotations.push(rotation);

        self.debug_check();
    }

    #[inline]
    pub fn push_record(&mut self, sprite: SpriteRecord) {
        self.push(sprite.sheet_offset, sprite.position, sprite.size, sprite.origin, sprite.rotation);
    }

    /// Pushes the grid cell at `tile`, sized to one tile.
    pub fn push_from_grid(
        &mut self,
        grid: &SpriteGrid,
        tile: impl Into<TileIndex>,
        position: Vec2,
        origin: Vec2,
        rotation: f32,
    ) {
        self.push(grid.offset(tile), position, grid.tile_size(), origin, rotation);
    }

    /// Forgets all sprites. Capacity and storage are kept.
    pub fn clear(&mut self) {
        self.sheet_offsets.clear();
        self.positions.clear();
        self.sizes.clear();
        self.origins.clear();
        self.rotations.clear();
    }

    /// Frees the backing storage and returns to capacity 0.
    pub fn release(&mut self) {
        *self = Self::default();
    }

    pub fn get(&self, index: usize) -> Option<SpriteRecord> {
        (index < self.len()).then(|| self.record(index))
    }

    /// Row `index`.
    ///
    /// # Panics
    /// If `index >= len()`.
    pub fn record(&self, index: usize) -> SpriteRecord {
        assert!(
            index < self.len(),
            "sprite index {index} out of range (len {})",
            self.len()
        );
        SpriteRecord {
            sheet_offset: self.sheet_offsets[index],
            position: self.positions[index],
            size: self.sizes[index],
            origin: self.origins[index],
            rotation: self.rotations[index],
        }
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = SpriteRecord> + '_ {
        (0..self.len()).map(|i| self.record(i))
    }

    #[inline]
    pub fn sheet_offsets(&self) -> &[Vec2] {
        &self.sheet_offsets
    }

    #[inline]
    pub fn positions(&self) -> &[Vec2] {
        &self.positions
    }

    #[inline]
    pub fn sizes(&self) -> &[Vec2] {
        &self.sizes
    }

    #[inline]
    pub fn origins(&self) -> &[Vec2] {
        &self.origins
    }

    #[inline]
    pub fn rotations(&self) -> &[f32] {
        &self.rotations
    }

    fn grow(&mut self) {
        let new_capacity = (self.capacity * 2).max(1);
        let extra = new_capacity - self.len();

        // Aborts on allocation failure, like any Vec growth.
        self.sheet_offsets.reserve_exact(extra);
        self.positions.reserve_exact(extra);
        self.sizes.reserve_exact(extra);
        self.origins.reserve_exact(extra);
        self.rotations.reserve_exact(extra);

        log::trace!("sprite streams grew {} -> {new_capacity}", self.capacity);
        self.capacity = new_capacity;
    }

    #[inline]
    fn debug_check(&self) {
        let n = self.positions.len();
        debug_assert!(
            self.sheet_offsets.len() == n
                && self.sizes.len() == n
                && self.origins.len() == n
                && self.rotations.len() == n,
            "instance stream columns out of step"
        );
        debug_assert!(n <= self.capacity);
    }
}

/// Per-sheet batch of sprites, rendered with one instanced draw.
///
/// The sheet is shared, not owned: several buffers (or frames) may reference
/// the same [`SpriteSheet`]. Typical use is push / render / clear every frame,
/// keeping the buffer alive so its storage is reused.
#[derive(Debug, Clone)]
pub struct DrawBuffer {
    sheet: Arc<SpriteSheet>,
    streams: InstanceStreams,
}

impl DrawBuffer {
    /// Empty buffer (capacity 0) bound to `sheet`.
    pub fn new(sheet: Arc<SpriteSheet>) -> Self {
        Self {
            sheet,
            streams: InstanceStreams::new(),
        }
    }

    #[inline]
    pub fn sheet(&self) -> &SpriteSheet {
        &self.sheet
    }

    /// The sheet handle itself, for callers that key state by sheet.
    #[inline]
    pub fn shared_sheet(&self) -> &Arc<SpriteSheet> {
        &self.sheet
    }

    #[inline]
    pub fn streams(&self) -> &InstanceStreams {
        &self.streams
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.streams.capacity()
    }

    #[inline]
    pub fn push(&mut self, sheet_offset: Vec2, position: Vec2, size: Vec2, origin: Vec2, rotation: f32) {
        self.streams.push(sheet_offset, position, size, origin, rotation);
    }

    #[inline]
    pub fn push_record(&mut self, sprite: SpriteRecord) {
        self.streams.push_record(sprite);
    }

    #[inline]
    pub fn push_from_grid(
        &mut self,
        grid: &SpriteGrid,
        tile: impl Into<TileIndex>,
        position: Vec2,
        origin: Vec2,
        rotation: f32,
    ) {
        self.streams.push_from_grid(grid, tile, position, origin, rotation);
    }

    #[inline]
    pub fn clear(&mut self) {
        self.streams.clear();
    }

    #[inline]
    pub fn release(&mut self) {
        self.streams.release();
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<SpriteRecord> {
        self.streams.get(index)
    }

    #[inline]
    pub fn record(&self, index: usize) -> SpriteRecord {
        self.streams.record(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sprite(i: usize) -> SpriteRecord {
        let f = i as f32;
        SpriteRecord {
            sheet_offset: Vec2::new(f, f + 0.5),
            position: Vec2::new(10.0 * f, -f),
            size: Vec2::new(21.0, 21.0 + f),
            origin: Vec2::new(10.0, f * 0.25),
            rotation: f * 0.1,
        }
    }

    // ── push ──────────────────────────────────────────────────────────────

    #[test]
    fn new_is_empty_with_no_capacity() {
        let s = InstanceStreams::new();
        assert_eq!(s.len(), 0);
        assert_eq!(s.capacity(), 0);
        assert!(s.get(0).is_none());
    }

    #[test]
    fn push_appends_and_preserves_earlier_records() {
        let mut s = InstanceStreams::new();
        for i in 0..100 {
            s.push_record(sprite(i));
            assert_eq!(s.len(), i + 1);
            for j in 0..=i {
                assert_eq!(s.record(j), sprite(j));
            }
        }
    }

    #[test]
    fn pushed_record_reads_back_bit_exact() {
        let mut s = InstanceStreams::new();
        let r = SpriteRecord {
            sheet_offset: Vec2::new(0.1, 1.0e-7),
            position: Vec2::new(-0.0, f32::MAX),
            size: Vec2::new(-3.0, 0.0),
            origin: Vec2::new(f32::MIN_POSITIVE, 7.25),
            rotation: std::f32::consts::PI * 3.0,
        };
        s.push(r.sheet_offset, r.position, r.size, r.origin, r.rotation);

        let back = s.record(s.len() - 1);
        assert_eq!(back.sheet_offset.x.to_bits(), r.sheet_offset.x.to_bits());
        assert_eq!(back.sheet_offset.y.to_bits(), r.sheet_offset.y.to_bits());
        assert_eq!(back.position.x.to_bits(), r.position.x.to_bits());
        assert_eq!(back.position.y.to_bits(), r.position.y.to_bits());
        assert_eq!(back.size.x.to_bits(), r.size.x.to_bits());
        assert_eq!(back.origin.x.to_bits(), r.origin.x.to_bits());
        assert_eq!(back.rotation.to_bits(), r.rotation.to_bits());
    }

    #[test]
    fn columns_line_up_with_records() {
        let mut s = InstanceStreams::new();
        for i in 0..5 {
            s.push_record(sprite(i));
        }
        for i in 0..5 {
            let r = sprite(i);
            assert_eq!(s.sheet_offsets()[i], r.sheet_offset);
            assert_eq!(s.positions()[i], r.position);
            assert_eq!(s.sizes()[i], r.size);
            assert_eq!(s.origins()[i], r.origin);
            assert_eq!(s.rotations()[i], r.rotation);
        }
    }

    #[test]
    fn get_stops_at_len_not_capacity() {
        let mut s = InstanceStreams::new();
        for i in 0..3 {
            s.push_record(sprite(i));
        }
        assert_eq!(s.capacity(), 4);
        assert_eq!(s.get(2), Some(sprite(2)));
        assert_eq!(s.get(3), None);

        s.clear();
        assert_eq!(s.get(0), None);
    }

    // ── growth ────────────────────────────────────────────────────────────

    #[test]
    fn capacity_doubles_from_one() {
        let mut s = InstanceStreams::new();
        let mut seen = vec![s.capacity()];
        for i in 0..9 {
            s.push_record(sprite(i));
            if *seen.last().unwrap() != s.capacity() {
                seen.push(s.capacity());
            }
        }
        assert_eq!(seen, vec![0, 1, 2, 4, 8, 16]);
    }

    #[test]
    fn growth_happens_exactly_on_power_of_two_plus_one() {
        let mut s = InstanceStreams::new();
        for n in 1..=64usize {
            let before = s.capacity();
            s.push_record(sprite(n));
            let grew = s.capacity() != before;
            let expected = n == 1 || (n - 1).is_power_of_two();
            assert_eq!(grew, expected, "push #{n}");
        }
    }

    // ── clear / release ───────────────────────────────────────────────────

    #[test]
    fn clear_keeps_capacity_and_storage() {
        let mut s = InstanceStreams::new();
        for i in 0..6 {
            s.push_record(sprite(i));
        }
        let cap = s.capacity();
        let ptr = s.positions().as_ptr();

        s.clear();
        assert_eq!(s.len(), 0);
        assert_eq!(s.capacity(), cap);

        for i in 0..cap {
            s.push_record(sprite(i));
            assert_eq!(s.capacity(), cap);
        }
        assert_eq!(s.positions().as_ptr(), ptr);

        s.push_record(sprite(cap));
        assert_eq!(s.capacity(), cap * 2);
    }

    #[test]
    fn release_returns_to_empty() {
        let mut s = InstanceStreams::new();
        for i in 0..3 {
            s.push_record(sprite(i));
        }
        s.release();
        assert_eq!(s.len(), 0);
        assert_eq!(s.capacity(), 0);

        s.push_record(sprite(0));
        assert_eq!(s.capacity(), 1);
        assert_eq!(s.record(0), sprite(0));
    }

    // ── grid ──────────────────────────────────────────────────────────────

    #[test]
    fn push_from_grid_uses_cell_offset_and_tile_size() {
        let grid = SpriteGrid::new(21, 21, 2);
        let mut s = InstanceStreams::new();
        s.push_from_grid(&grid, (1, 2), Vec2::new(500.0, 300.0), Vec2::new(10.0, 10.0), 0.5);

        let r = s.record(0);
        assert_eq!(r.sheet_offset, Vec2::new(25.0, 48.0));
        assert_eq!(r.size, Vec2::new(21.0, 21.0));
        assert_eq!(r.position, Vec2::new(500.0, 300.0));
        assert_eq!(r.origin, Vec2::new(10.0, 10.0));
        assert_eq!(r.rotation, 0.5);
    }

    // ── access ────────────────────────────────────────────────────────────

    #[test]
    #[should_panic(expected = "out of range")]
    fn record_past_len_panics() {
        let mut s = InstanceStreams::new();
        s.push_record(sprite(0));
        s.push_record(sprite(1));
        s.clear();
        let _ = s.record(0);
    }

    #[test]
    fn iter_yields_in_push_order() {
        let mut s = InstanceStreams::new();
        for i in 0..4 {
            s.push_record(sprite(i));
        }
        let all: Vec<_> = s.iter().collect();
        assert_eq!(all, (0..4).map(sprite).collect::<Vec<_>>());
    }
}
