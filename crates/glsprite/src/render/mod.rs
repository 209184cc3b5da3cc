//! Instanced sprite rendering.
//!
//! A [`SpriteSheet`] is one texture, a [`SpriteGrid`] maps tile indices to
//! pixel offsets inside it, and a [`DrawBuffer`] collects per-sprite records
//! for one sheet. The [`Renderer`] draws a whole buffer with one instanced
//! draw of a shared quad.
//!
//! Convention:
//! - Positions, sizes and origins are in pixels (top-left origin, +Y down).
//! - The vertex shader converts to NDC using the `screen_size` uniform.

mod ctx;
mod draw_buffer;
mod error;
mod grid;
mod quad;
mod renderer;
mod shader;
mod sheet;

pub use ctx::{RenderCtx, RenderTarget};
pub use draw_buffer::{DrawBuffer, InstanceStreams, SpriteRecord};
pub use error::RenderError;
pub use grid::SpriteGrid;
pub use quad::{AttributeSlot, QUAD_VERTEX_COUNT, QUAD_VERTICES};
pub use renderer::Renderer;
pub use shader::{
    BindingSlot, ResourceKind, ShaderProgram, ShaderResource, VertexInput, FRAGMENT_ENTRY,
    SCREEN_SIZE_UNIFORM, SHEET_SIZE_UNIFORM, VERTEX_ENTRY,
};
pub use sheet::{SpriteSheet, SHEET_FORMAT};
