use winit::window::Window;

use crate::device::{Gpu, SurfaceErrorAction};
use crate::render::{RenderCtx, RenderTarget};
use crate::time::FrameTime;

use super::app::AppControl;

/// Handed to [`App::on_start`](super::App::on_start).
pub struct StartCtx<'a, 'w> {
    pub window: &'a Window,
    pub gpu: &'a Gpu<'w>,
}

impl StartCtx<'_, '_> {
    pub fn render_ctx(&self) -> RenderCtx<'_> {
        self.gpu.render_ctx()
    }
}

/// Per-frame context passed to [`App::on_frame`](super::App::on_frame).
///
/// `'a` is the callback, `'w` the window borrow carried by `Gpu<'w>`.
pub struct FrameCtx<'a, 'w> {
    pub window: &'a Window,
    pub gpu: &'a mut Gpu<'w>,
    pub time: FrameTime,
    exit: bool,
}

impl<'a, 'w> FrameCtx<'a, 'w> {
    pub(crate) fn new(window: &'a Window, gpu: &'a mut Gpu<'w>, time: FrameTime) -> Self {
        Self { window, gpu, time, exit: false }
    }

    /// Ask the runtime to exit after this frame.
    pub fn exit(&mut self) {
        self.exit = true;
    }

    pub(crate) fn exit_requested(&self) -> bool {
        self.exit
    }

    /// Acquire the frame, clear it to `clear`, run `draw`, then submit and
    /// present.
    ///
    /// Everything `draw` records goes into one encoder and one submission. A
    /// skipped frame (outdated surface, timeout) returns `Continue` without
    /// calling `draw`.
    pub fn render<F>(&mut self, clear: wgpu::Color, draw: F) -> AppControl
    where
        F: FnOnce(&RenderCtx<'_>, &mut RenderTarget<'_>),
    {
        let mut frame = match self.gpu.begin_frame() {
            Ok(f) => f,
            Err(err) => {
                return match self.gpu.handle_surface_error(err) {
                    SurfaceErrorAction::Fatal => {
                        log::error!("surface out of memory; exiting");
                        AppControl::Exit
                    }
                    _ => AppControl::Continue,
                };
            }
        };

        let rctx = self.gpu.render_ctx();
        {
            let mut target = RenderTarget::new(&mut frame.encoder, &frame.view);
            drop(target.clear_pass("glsprite clear", clear));
            draw(&rctx, &mut target);
        }

        self.window.pre_present_notify();
        self.gpu.submit(frame);
        AppControl::Continue
    }
}
