use crate::coords::{TileIndex, Vec2};

/// Uniform tile grid over a sprite sheet.
///
/// Cells are `tile_size` pixels, separated (and surrounded) by `margin`
/// pixels. Tile `(col, row)` starts at `(col, row) * (tile_size + margin) + margin`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SpriteGrid {
    tile_size: Vec2,
    cell_stride: Vec2,
    margin: f32,
}

impl SpriteGrid {
    pub fn new(tile_width: u32, tile_height: u32, margin: u32) -> Self {
        let tile_size = Vec2::new(tile_width as f32, tile_height as f32);
        let margin = margin as f32;
        Self {
            tile_size,
            cell_stride: tile_size + margin,
            margin,
        }
    }

    #[inline]
    pub fn tile_size(&self) -> Vec2 {
        self.tile_size
    }

    #[inline]
    pub fn cell_stride(&self) -> Vec2 {
        self.cell_stride
    }

    #[inline]
    pub fn margin(&self) -> f32 {
        self.margin
    }

    /// Top-left pixel of `tile` within the sheet.
    ///
    /// No bounds check: keeping the cell inside the sheet is the caller's job.
    #[inline]
    pub fn offset(&self, tile: impl Into<TileIndex>) -> Vec2 {
        tile.into().as_vec2() * self.cell_stride + self.margin
    }
}
