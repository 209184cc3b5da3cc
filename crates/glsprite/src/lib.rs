//! Instanced 2D sprite batching on wgpu.
//!
//! [`render`] is the core: sprite sheets, tile grids, per-sheet draw buffers
//! and the instanced renderer. The remaining modules are the platform glue a
//! binary needs to put sprites on screen (window, device, frame loop).

pub mod coords;
pub mod core;
pub mod device;
pub mod logging;
pub mod render;
pub mod time;
pub mod window;
