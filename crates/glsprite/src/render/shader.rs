use std::path::Path;

use wgpu::naga;

use super::error::RenderError;

/// Entry point the vertex stage must export.
pub const VERTEX_ENTRY: &str = "vs_main";
/// Entry point the fragment stage must export.
pub const FRAGMENT_ENTRY: &str = "fs_main";

/// Uniform holding the framebuffer size in pixels.
pub const SCREEN_SIZE_UNIFORM: &str = "screen_size";
/// Uniform holding the sprite sheet size in pixels.
pub const SHEET_SIZE_UNIFORM: &str = "sheet_size";

const BUILTIN_SOURCE: &str = include_str!("shaders/sprite.wgsl");

/// `@group(g) @binding(b)` address of a shader resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingSlot {
    pub group: u32,
    pub binding: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// `var<uniform>`; `vec2_f32` is true when the declared type is `vec2<f32>`.
    Uniform { vec2_f32: bool },
    /// `texture_2d<f32>`.
    Texture,
    /// Filtering `sampler`.
    Sampler,
    /// Anything else (storage buffers, depth textures, arrays, ...).
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderResource {
    pub name: String,
    pub slot: BindingSlot,
    pub kind: ResourceKind,
}

/// One `@location(n)` input of the vertex entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexInput {
    pub location: u32,
    /// `None` when the declared type has no matching vertex format.
    pub format: Option<wgpu::VertexFormat>,
}

/// A parsed and validated WGSL program plus the reflection the renderer needs.
///
/// Nothing here touches the GPU; the `wgpu::ShaderModule` is created by the
/// renderer once the program has been checked against the sprite layout.
#[derive(Debug, Clone)]
pub struct ShaderProgram {
    label: String,
    source: String,
    resources: Vec<ShaderResource>,
    vertex_inputs: Vec<VertexInput>,
    entry_points: Vec<(String, naga::ShaderStage)>,
}

impl ShaderProgram {
    /// Parse and validate WGSL source.
    pub fn from_wgsl(label: impl Into<String>, source: impl Into<String>) -> Result<Self, RenderError> {
        let label = label.into();
        let source = source.into();

        let module = naga::front::wgsl::parse_str(&source).map_err(|e| RenderError::Parse {
            label: label.clone(),
            message: e.emit_to_string(&source),
        })?;

        let mut validator = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::default(),
        );
        validator.validate(&module).map_err(|e| RenderError::Parse {
            label: label.clone(),
            message: e.emit_to_string(&source),
        })?;

        let resources = reflect_resources(&module);
        let vertex_inputs = reflect_vertex_inputs(&module);
        let entry_points = module
            .entry_points
            .iter()
            .map(|ep| (ep.name.clone(), ep.stage))
            .collect();

        log::debug!(
            "shader '{label}': {} resources, {} vertex inputs",
            resources.len(),
            vertex_inputs.len()
        );

        Ok(Self { label, source, resources, vertex_inputs, entry_points })
    }

    /// Read a WGSL file from disk. The path becomes the program label.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RenderError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| RenderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_wgsl(path.display().to_string(), source)
    }

    /// The bundled sprite shader.
    pub fn builtin() -> Result<Self, RenderError> {
        Self::from_wgsl("glsprite builtin sprite shader", BUILTIN_SOURCE)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Look up a bound resource by its WGSL variable name.
    pub fn resource(&self, name: &str) -> Option<&ShaderResource> {
        self.resources.iter().find(|r| r.name == name)
    }

    /// Address of the uniform called `name`, if the program declares one.
    pub fn uniform(&self, name: &str) -> Option<BindingSlot> {
        self.resource(name)
            .filter(|r| matches!(r.kind, ResourceKind::Uniform { .. }))
            .map(|r| r.slot)
    }

    pub fn resources(&self) -> &[ShaderResource] {
        &self.resources
    }

    /// Location inputs of the vertex entry point, sorted by location.
    pub fn vertex_inputs(&self) -> &[VertexInput] {
        &self.vertex_inputs
    }

    pub fn vertex_input(&self, location: u32) -> Option<VertexInput> {
        self.vertex_inputs.iter().copied().find(|v| v.location == location)
    }

    pub fn has_entry_point(&self, name: &str, stage: naga::ShaderStage) -> bool {
        self.entry_points.iter().any(|(n, s)| n == name && *s == stage)
    }
}

// ── reflection ────────────────────────────────────────────────────────────

fn reflect_resources(module: &naga::Module) -> Vec<ShaderResource> {
    let mut out: Vec<ShaderResource> = module
        .global_variables
        .iter()
        .filter_map(|(_, var)| {
            let binding = var.binding.as_ref()?;
            let inner = &module.types[var.ty].inner;
            let kind = match var.space {
                naga::AddressSpace::Uniform => ResourceKind::Uniform { vec2_f32: is_vec2_f32(inner) },
                naga::AddressSpace::Handle => match *inner {
                    naga::TypeInner::Image {
                        dim: naga::ImageDimension::D2,
                        arrayed: false,
                        class: naga::ImageClass::Sampled { kind: naga::ScalarKind::Float, multi: false },
                    } => ResourceKind::Texture,
                    naga::TypeInner::Sampler { comparison: false } => ResourceKind::Sampler,
                    _ => ResourceKind::Other,
                },
                _ => ResourceKind::Other,
            };
            Some(ShaderResource {
                name: var.name.clone().unwrap_or_default(),
                slot: BindingSlot { group: binding.group, binding: binding.binding },
                kind,
            })
        })
        .collect();
    out.sort_by_key(|r| (r.slot.group, r.slot.binding));
    out
}

fn reflect_vertex_inputs(module: &naga::Module) -> Vec<VertexInput> {
    let Some(ep) = module
        .entry_points
        .iter()
        .find(|ep| ep.name == VERTEX_ENTRY && ep.stage == naga::ShaderStage::Vertex)
    else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for arg in &ep.function.arguments {
        match (&arg.binding, &module.types[arg.ty].inner) {
            (Some(binding), inner) => push_location(&mut out, binding, inner),
            (None, naga::TypeInner::Struct { members, .. }) => {
                for member in members {
                    if let Some(binding) = &member.binding {
                        push_location(&mut out, binding, &module.types[member.ty].inner);
                    }
                }
            }
            (None, _) => {}
        }
    }
    out.sort_by_key(|v| v.location);
    out
}

fn push_location(out: &mut Vec<VertexInput>, binding: &naga::Binding, inner: &naga::TypeInner) {
    if let naga::Binding::Location { location, .. } = *binding {
        out.push(VertexInput { location, format: vertex_format(inner) });
    }
}

fn is_vec2_f32(inner: &naga::TypeInner) -> bool {
    matches!(
        *inner,
        naga::TypeInner::Vector {
            size: naga::VectorSize::Bi,
            scalar: naga::Scalar { kind: naga::ScalarKind::Float, width: 4 },
        }
    )
}

fn vertex_format(inner: &naga::TypeInner) -> Option<wgpu::VertexFormat> {
    use naga::{ScalarKind as K, VectorSize as S};
    use wgpu::VertexFormat as F;

    let (kind, width, size) = match *inner {
        naga::TypeInner::Scalar(s) => (s.kind, s.width, None),
        naga::TypeInner::Vector { size, scalar } => (scalar.kind, scalar.width, Some(size)),
        _ => return None,
    };
    if width != 4 {
        return None;
    }
    Some(match (kind, size) {
        (K::Float, None) => F::Float32,
        (K::Float, Some(S::Bi)) => F::Float32x2,
        (K::Float, Some(S::Tri)) => F::Float32x3,
        (K::Float, Some(S::Quad)) => F::Float32x4,
        (K::Sint, None) => F::Sint32,
        (K::Sint, Some(S::Bi)) => F::Sint32x2,
        (K::Sint, Some(S::Tri)) => F::Sint32x3,
        (K::Sint, Some(S::Quad)) => F::Sint32x4,
        (K::Uint, None) => F::Uint32,
        (K::Uint, Some(S::Bi)) => F::Uint32x2,
        (K::Uint, Some(S::Tri)) => F::Uint32x3,
        (K::Uint, Some(S::Quad)) => F::Uint32x4,
        _ => return None,
    })
}
