/// What the runtime should do after `get_current_texture` fails.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SurfaceErrorAction {
    /// The surface was configured again; try next frame.
    Reconfigured,
    /// Drop this frame.
    SkipFrame,
    /// Out of memory. Exit.
    Fatal,
}
