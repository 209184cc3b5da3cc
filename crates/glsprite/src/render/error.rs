use std::fmt;
use std::path::PathBuf;

use super::AttributeSlot;

/// Errors raised while loading a sprite shader, creating a sheet, or
/// initializing the renderer.
///
/// Renderer-initialization variants other than [`RenderError::Pipeline`]
/// are returned before any GPU object is created.
#[derive(Debug)]
pub enum RenderError {
    /// A shader file could not be read.
    Io { path: PathBuf, source: std::io::Error },
    /// WGSL failed to parse or validate; `message` holds the formatted diagnostic.
    Parse { label: String, message: String },
    /// The program lacks a required entry point (`vs_main` / `fs_main`).
    MissingEntryPoint(&'static str),
    /// A required `var<uniform>` is not declared by the program.
    MissingUniform(&'static str),
    /// A required uniform exists but is not `vec2<f32>`.
    UniformType(&'static str),
    /// The vertex entry point does not consume `slot` with the expected format.
    AttributeMismatch {
        slot: AttributeSlot,
        expected: wgpu::VertexFormat,
        found: Option<wgpu::VertexFormat>,
    },
    /// The vertex entry point reads a location no sprite stream feeds.
    UnexpectedAttribute(u32),
    /// The program binds a resource the renderer cannot supply.
    UnsupportedBinding { name: String, group: u32, binding: u32 },
    /// wgpu rejected the shader module or the render pipeline.
    Pipeline(String),
    /// A sheet needs at least one pixel in each direction.
    EmptySheet { width: u32, height: u32 },
    /// Pixel buffer length does not match `width * height * 4`.
    PixelData { expected: usize, found: usize },
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Io { path, source } => {
                write!(f, "failed to load shader file \"{}\": {source}", path.display())
            }
            RenderError::Parse { label, message } => {
                write!(f, "shader \"{label}\" failed to compile:\n{message}")
            }
            RenderError::MissingEntryPoint(name) => {
                write!(f, "shader has no entry point `{name}`")
            }
            RenderError::MissingUniform(name) => {
                write!(f, "shader has no uniform `{name}`")
            }
            RenderError::UniformType(name) => {
                write!(f, "uniform `{name}` must be declared as vec2<f32>")
            }
            RenderError::AttributeMismatch { slot, expected, found } => match found {
                Some(found) => write!(
                    f,
                    "vertex input @location({}) ({slot:?}) is {found:?}, expected {expected:?}",
                    slot.location()
                ),
                None => write!(
                    f,
                    "vertex input @location({}) ({slot:?}) is not consumed by the shader",
                    slot.location()
                ),
            },
            RenderError::UnexpectedAttribute(location) => {
                write!(f, "vertex input @location({location}) has no sprite stream")
            }
            RenderError::UnsupportedBinding { name, group, binding } => write!(
                f,
                "shader binding `{name}` at @group({group}) @binding({binding}) is not supported"
            ),
            RenderError::Pipeline(message) => {
                write!(f, "sprite pipeline could not be created: {message}")
            }
            RenderError::EmptySheet { width, height } => {
                write!(f, "sprite sheet must not be empty (got {width}x{height})")
            }
            RenderError::PixelData { expected, found } => {
                write!(f, "pixel buffer has {found} bytes, expected {expected}")
            }
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
