//! winit event loop driving one window.

mod runtime;

pub use runtime::{Runtime, RuntimeConfig};
