use super::Vec2;

/// Integer `(column, row)` address of a cell in a sprite grid.
///
/// Negative indices are representable; grids do not bounds-check them.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct TileIndex {
    pub col: i32,
    pub row: i32,
}

impl TileIndex {
    #[inline]
    pub const fn new(col: i32, row: i32) -> Self {
        Self { col, row }
    }

    #[inline]
    pub fn as_vec2(self) -> Vec2 {
        Vec2::new(self.col as f32, self.row as f32)
    }
}

impl From<(i32, i32)> for TileIndex {
    #[inline]
    fn from((col, row): (i32, i32)) -> Self {
        TileIndex::new(col, row)
    }
}
