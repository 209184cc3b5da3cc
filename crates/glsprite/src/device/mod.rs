//! wgpu device and window surface.
//!
//! [`Gpu`] owns the instance, adapter, device, queue and the configured
//! surface. Each frame is a [`GpuFrame`]: the acquired swapchain texture, its
//! view and the one command encoder every renderer records into.

mod error;
mod frame;
mod gpu;
mod init;
mod surface;

pub use error::SurfaceErrorAction;
pub use frame::GpuFrame;
pub use gpu::Gpu;
pub use init::GpuInit;
