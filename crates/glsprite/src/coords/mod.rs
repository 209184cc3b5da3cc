//! Coordinate types shared by the sprite renderer and the demo glue.
//!
//! Canonical CPU space:
//! - Pixels, origin top-left
//! - +X right, +Y down
//!
//! Sheet offsets use the same convention inside the sheet texture.

mod tile;
mod vec2;
mod viewport;

pub use tile::TileIndex;
pub use vec2::Vec2;
pub use viewport::Viewport;
