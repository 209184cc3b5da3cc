/// One acquired swapchain image plus the encoder recording into it.
///
/// Keep it short-lived: the surface hands out no further textures until this
/// one is submitted and dropped.
pub struct GpuFrame {
    pub surface_texture: wgpu::SurfaceTexture,
    pub view: wgpu::TextureView,
    pub encoder: wgpu::CommandEncoder,
}
