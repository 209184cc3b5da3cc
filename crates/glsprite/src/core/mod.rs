//! Contract between the runtime loop and an application.
//!
//! The runtime owns the window and the GPU; the application owns everything it
//! draws (sheets, draw buffers, the renderer) and sees the platform only
//! through [`StartCtx`] and [`FrameCtx`].

mod app;
mod ctx;

pub use app::{App, AppControl};
pub use ctx::{FrameCtx, StartCtx};
