use std::sync::{Arc, Weak};

use wgpu::naga::ShaderStage;
use wgpu::util::DeviceExt;

use crate::coords::Viewport;
use crate::render::{RenderCtx, RenderTarget};

use super::draw_buffer::{DrawBuffer, InstanceStreams};
use super::error::RenderError;
use super::quad::{AttributeSlot, QUAD_VERTEX_COUNT, QUAD_VERTICES};
use super::shader::{
    BindingSlot, ResourceKind, ShaderProgram, FRAGMENT_ENTRY, SCREEN_SIZE_UNIFORM,
    SHEET_SIZE_UNIFORM, VERTEX_ENTRY,
};
use super::sheet::SpriteSheet;

/// Smallest per-stream allocation, in instances.
const MIN_STREAM_CAPACITY: usize = 64;

/// Byte size of a `vec2<f32>` uniform.
const VEC2_BYTES: u64 = 8;

/// Instanced sprite renderer.
///
/// Owns the pipeline, the static quad, the two size uniforms and one vertex
/// buffer per per-sprite attribute stream. [`Renderer::render`] draws a whole
/// [`DrawBuffer`] with a single instanced draw.
///
/// The screen size is fixed when the renderer is created; a different
/// viewport at render time is reported once and otherwise ignored.
pub struct Renderer {
    screen_size: Viewport,
    bindings: SpriteBindings,

    shader: wgpu::ShaderModule,
    group_layouts: Vec<wgpu::BindGroupLayout>,
    pipeline_layout: wgpu::PipelineLayout,
    pipeline_format: wgpu::TextureFormat,
    pipeline: wgpu::RenderPipeline,

    sampler: wgpu::Sampler,
    screen_ubo: wgpu::Buffer,
    sheet_ubo: wgpu::Buffer,
    quad_vbo: wgpu::Buffer,

    stream_vbos: [wgpu::Buffer; 5],
    stream_capacity: usize,

    sheet_bindings: Vec<SheetBindGroups>,

    warned_viewport: bool,
    /// Surface format a pipeline rebuild already failed for.
    failed_format: Option<wgpu::TextureFormat>,
}

impl Renderer {
    /// Check `program` against the sprite layout and create all GPU state.
    ///
    /// Fails before creating any GPU object if the program lacks a size
    /// uniform, declares one with the wrong type, reads the attribute streams
    /// differently, or binds something the renderer cannot provide. Anything
    /// wgpu still rejects while building the pipeline (stage interface,
    /// fragment outputs) comes back as [`RenderError::Pipeline`].
    pub fn new(
        ctx: &RenderCtx<'_>,
        program: &ShaderProgram,
        screen_width: u32,
        screen_height: u32,
    ) -> Result<Self, RenderError> {
        let bindings = SpriteBindings::resolve(program)?;
        let screen_size = Viewport::new(screen_width as f32, screen_height as f32);
        let device = ctx.device;

        let scope = device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(program.label()),
            source: wgpu::ShaderSource::Wgsl(program.source().into()),
        });

        let group_layouts: Vec<wgpu::BindGroupLayout> = (0..bindings.group_count)
            .map(|group| {
                let entries: Vec<wgpu::BindGroupLayoutEntry> = bindings
                    .in_group(group)
                    .map(|(slot, resource)| wgpu::BindGroupLayoutEntry {
                        binding: slot.binding,
                        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                        ty: resource.binding_type(),
                        count: None,
                    })
                    .collect();
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("glsprite bgl"),
                    entries: &entries,
                })
            })
            .collect();

        let layout_refs: Vec<&wgpu::BindGroupLayout> = group_layouts.iter().collect();
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("glsprite pipeline layout"),
            bind_group_layouts: &layout_refs,
            immediate_size: 0,
        });

        let pipeline = build_pipeline(device, &shader, &pipeline_layout, ctx.surface_format);

        if let Some(err) = pollster::block_on(scope.pop()) {
            return Err(RenderError::Pipeline(err.to_string()));
        }

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("glsprite sheet sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        let screen_ubo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("glsprite screen_size ubo"),
            contents: bytemuck::cast_slice(&screen_size.to_array()),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let sheet_ubo = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("glsprite sheet_size ubo"),
            size: VEC2_BYTES,
            usage: wgpu::BufferUsages::UNIFORM
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let quad_vbo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("glsprite quad vbo"),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let stream_vbos = create_stream_buffers(device, MIN_STREAM_CAPACITY);

        log::debug!(
            "glsprite renderer ready: shader '{}', screen {}x{}, {} bind groups",
            program.label(),
            screen_width,
            screen_height,
            bindings.group_count
        );

        Ok(Self {
            screen_size,
            bindings,
            shader,
            group_layouts,
            pipeline_layout,
            pipeline_format: ctx.surface_format,
            pipeline,
            sampler,
            screen_ubo,
            sheet_ubo,
            quad_vbo,
            stream_vbos,
            stream_capacity: MIN_STREAM_CAPACITY,
            sheet_bindings: Vec::new(),
            warned_viewport: false,
            failed_format: None,
        })
    }

    /// Screen size the `screen_size` uniform was written with.
    pub fn screen_size(&self) -> Viewport {
        self.screen_size
    }

    /// Instances each attribute stream can currently hold.
    pub fn stream_capacity(&self) -> usize {
        self.stream_capacity
    }

    /// Record one instanced draw of every sprite in `buffer` into `target`.
    ///
    /// Uploads go through the frame's encoder, so several buffers can be
    /// rendered into the same frame and each draw sees its own data. The
    /// pass loads the existing colour contents; clearing is up to the caller.
    /// Nothing is recorded if no pipeline could be built for the target format.
    pub fn render(&mut self, ctx: &RenderCtx<'_>, target: &mut RenderTarget<'_>, buffer: &DrawBuffer) {
        self.check_viewport(ctx.viewport);
        if !self.ensure_pipeline(ctx) {
            return;
        }

        let count = buffer.len();
        self.ensure_stream_capacity(ctx.device, count);
        self.record_uploads(ctx.device, target.encoder, buffer);

        let cached = self.bind_groups_for(ctx.device, buffer.shared_sheet());
        let bind_groups = &self.sheet_bindings[cached].groups;

        let mut rpass = target.load_pass("glsprite sprite pass");
        rpass.set_pipeline(&self.pipeline);
        for (group, bind_group) in bind_groups.iter().enumerate() {
            rpass.set_bind_group(group as u32, bind_group, &[]);
        }
        rpass.set_vertex_buffer(AttributeSlot::QuadVertex.location(), self.quad_vbo.slice(..));
        for (slot, vbo) in AttributeSlot::INSTANCED.iter().zip(&self.stream_vbos) {
            rpass.set_vertex_buffer(slot.location(), vbo.slice(..));
        }
        rpass.draw(0..QUAD_VERTEX_COUNT, 0..count as u32);

        log::trace!("glsprite: drew {count} sprites");
    }

    // ── per-frame helpers ─────────────────────────────────────────────────

    fn check_viewport(&mut self, viewport: Viewport) {
        if self.warned_viewport || viewport == self.screen_size {
            return;
        }
        log::warn!(
            "glsprite: viewport is {}x{} but screen_size was fixed at {}x{}; sprites will be scaled",
            viewport.width,
            viewport.height,
            self.screen_size.width,
            self.screen_size.height
        );
        self.warned_viewport = true;
    }

    /// Returns `false` when no pipeline matches the target format.
    fn ensure_pipeline(&mut self, ctx: &RenderCtx<'_>) -> bool {
        if self.pipeline_format == ctx.surface_format {
            return true;
        }
        if self.failed_format == Some(ctx.surface_format) {
            return false;
        }
        log::debug!(
            "glsprite: rebuilding pipeline for {:?} (was {:?})",
            ctx.surface_format,
            self.pipeline_format
        );

        let scope = ctx.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = build_pipeline(ctx.device, &self.shader, &self.pipeline_layout, ctx.surface_format);
        if let Some(err) = pollster::block_on(scope.pop()) {
            log::error!(
                "glsprite: no pipeline for {:?}, sprites will not be drawn: {err}",
                ctx.surface_format
            );
            self.failed_format = Some(ctx.surface_format);
            return false;
        }

        self.pipeline = pipeline;
        self.pipeline_format = ctx.surface_format;
        self.failed_format = None;
        true
    }

    fn ensure_stream_capacity(&mut self, device: &wgpu::Device, required: usize) {
        if required <= self.stream_capacity {
            return;
        }
        let new_cap = required.next_power_of_two().max(MIN_STREAM_CAPACITY);
        log::debug!("glsprite: growing sprite streams {} -> {new_cap}", self.stream_capacity);
        self.stream_vbos = create_stream_buffers(device, new_cap);
        self.stream_capacity = new_cap;
    }

    /// Stage `sheet_size` followed by the five columns in one buffer and
    /// record copies into the uniform and the stream buffers.
    fn record_uploads(&self, device: &wgpu::Device, encoder: &mut wgpu::CommandEncoder, buffer: &DrawBuffer) {
        let streams = buffer.streams();
        let floats_per_sprite: usize = AttributeSlot::INSTANCED
            .iter()
            .map(|slot| slot.components() as usize)
            .sum();

        let mut staged: Vec<f32> = Vec::with_capacity(2 + streams.len() * floats_per_sprite);
        staged.extend_from_slice(&buffer.sheet().size().to_array());

        let mut ranges = [(0u64, 0u64); 5];
        for (range, slot) in ranges.iter_mut().zip(AttributeSlot::INSTANCED) {
            let column = stream_column(streams, slot);
            *range = (byte_len(staged.len()), byte_len(column.len()));
            staged.extend_from_slice(column);
        }

        let staging = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("glsprite staging"),
            contents: bytemuck::cast_slice(&staged),
            usage: wgpu::BufferUsages::COPY_SRC,
        });

        encoder.copy_buffer_to_buffer(&staging, 0, &self.sheet_ubo, 0, VEC2_BYTES);
        for (vbo, (offset, size)) in self.stream_vbos.iter().zip(ranges) {
            if size > 0 {
                encoder.copy_buffer_to_buffer(&staging, offset, vbo, 0, size);
            }
        }
    }

    /// Index into `sheet_bindings` for `sheet`, creating its bind groups on
    /// first use. Entries whose sheet has been dropped are pruned on a miss.
    fn bind_groups_for(&mut self, device: &wgpu::Device, sheet: &Arc<SpriteSheet>) -> usize {
        let key = Arc::as_ptr(sheet);
        if let Some(i) = self.sheet_bindings.iter().position(|b| b.sheet.as_ptr() == key) {
            return i;
        }

        self.sheet_bindings.retain(|b| b.sheet.strong_count() > 0);
        let groups = self.create_bind_groups(device, sheet);
        log::debug!(
            "glsprite: bind groups for a {}x{} sheet ({} cached)",
            sheet.width(),
            sheet.height(),
            self.sheet_bindings.len() + 1
        );
        self.sheet_bindings.push(SheetBindGroups { sheet: Arc::downgrade(sheet), groups });
        self.sheet_bindings.len() - 1
    }

    fn create_bind_groups(&self, device: &wgpu::Device, sheet: &SpriteSheet) -> Vec<wgpu::BindGroup> {
        self.group_layouts
            .iter()
            .zip(0u32..)
            .map(|(layout, group)| {
                let entries: Vec<wgpu::BindGroupEntry<'_>> = self
                    .bindings
                    .in_group(group)
                    .map(|(slot, resource)| wgpu::BindGroupEntry {
                        binding: slot.binding,
                        resource: match resource {
                            SpriteResource::ScreenSize => self.screen_ubo.as_entire_binding(),
                            SpriteResource::SheetSize => self.sheet_ubo.as_entire_binding(),
                            SpriteResource::SheetTexture => wgpu::BindingResource::TextureView(sheet.view()),
                            SpriteResource::SheetSampler => wgpu::BindingResource::Sampler(&self.sampler),
                        },
                    })
                    .collect();
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("glsprite bind group"),
                    layout,
                    entries: &entries,
                })
            })
            .collect()
    }
}

// ── bindings ──────────────────────────────────────────────────────────────

/// Bind groups built for one sheet. The uniforms and sampler they reference
/// belong to the renderer and never change, so only the sheet keys them.
struct SheetBindGroups {
    sheet: Weak<SpriteSheet>,
    groups: Vec<wgpu::BindGroup>,
}

/// What the renderer plugs into a shader binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpriteResource {
    ScreenSize,
    SheetSize,
    SheetTexture,
    SheetSampler,
}

impl SpriteResource {
    fn binding_type(self) -> wgpu::BindingType {
        match self {
            SpriteResource::ScreenSize | SpriteResource::SheetSize => wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: wgpu::BufferSize::new(VEC2_BYTES),
            },
            SpriteResource::SheetTexture => wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            SpriteResource::SheetSampler => {
                wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering)
            }
        }
    }
}

/// A program's resources mapped onto what the renderer supplies.
#[derive(Debug)]
struct SpriteBindings {
    entries: Vec<(BindingSlot, SpriteResource)>,
    group_count: u32,
}

impl SpriteBindings {
    /// Validate `program` against the sprite layout. Pure reflection; no GPU.
    fn resolve(program: &ShaderProgram) -> Result<Self, RenderError> {
        for name in [SCREEN_SIZE_UNIFORM, SHEET_SIZE_UNIFORM] {
            if program.uniform(name).is_none() {
                return Err(RenderError::MissingUniform(name));
            }
        }
        for name in [SCREEN_SIZE_UNIFORM, SHEET_SIZE_UNIFORM] {
            let vec2 = program
                .resource(name)
                .is_some_and(|r| r.kind == ResourceKind::Uniform { vec2_f32: true });
            if !vec2 {
                return Err(RenderError::UniformType(name));
            }
        }

        if !program.has_entry_point(VERTEX_ENTRY, ShaderStage::Vertex) {
            return Err(RenderError::MissingEntryPoint(VERTEX_ENTRY));
        }
        if !program.has_entry_point(FRAGMENT_ENTRY, ShaderStage::Fragment) {
            return Err(RenderError::MissingEntryPoint(FRAGMENT_ENTRY));
        }

        for slot in AttributeSlot::ALL {
            let found = program.vertex_input(slot.location()).and_then(|v| v.format);
            if found != Some(slot.format()) {
                return Err(RenderError::AttributeMismatch { slot, expected: slot.format(), found });
            }
        }
        let slot_count = AttributeSlot::ALL.len() as u32;
        if let Some(extra) = program.vertex_inputs().iter().find(|v| v.location >= slot_count) {
            return Err(RenderError::UnexpectedAttribute(extra.location));
        }

        let mut entries = Vec::with_capacity(program.resources().len());
        for res in program.resources() {
            let resource = match res.kind {
                ResourceKind::Uniform { .. } if res.name == SCREEN_SIZE_UNIFORM => SpriteResource::ScreenSize,
                ResourceKind::Uniform { .. } if res.name == SHEET_SIZE_UNIFORM => SpriteResource::SheetSize,
                ResourceKind::Texture => SpriteResource::SheetTexture,
                ResourceKind::Sampler => SpriteResource::SheetSampler,
                _ => {
                    return Err(RenderError::UnsupportedBinding {
                        name: res.name.clone(),
                        group: res.slot.group,
                        binding: res.slot.binding,
                    });
                }
            };
            entries.push((res.slot, resource));
        }

        let group_count = entries.iter().map(|(slot, _)| slot.group + 1).max().unwrap_or(0);
        Ok(Self { entries, group_count })
    }

    fn in_group(&self, group: u32) -> impl Iterator<Item = (BindingSlot, SpriteResource)> + '_ {
        self.entries.iter().copied().filter(move |(slot, _)| slot.group == group)
    }
}

// ── construction helpers ──────────────────────────────────────────────────

fn build_pipeline(
    device: &wgpu::Device,
    shader: &wgpu::ShaderModule,
    layout: &wgpu::PipelineLayout,
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let buffers = AttributeSlot::ALL.map(AttributeSlot::layout);

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("glsprite pipeline"),
        layout: Some(layout),

        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some(VERTEX_ENTRY),
            compilation_options: Default::default(),
            buffers: &buffers,
        },

        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some(FRAGMENT_ENTRY),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),

        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleStrip,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },

        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    })
}

fn create_stream_buffers(device: &wgpu::Device, capacity: usize) -> [wgpu::Buffer; 5] {
    AttributeSlot::INSTANCED.map(|slot| {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("glsprite sprite stream vbo"),
            size: slot.stride() * capacity as u64,
            usage: wgpu::BufferUsages::VERTEX
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        })
    })
}

fn stream_column(streams: &InstanceStreams, slot: AttributeSlot) -> &[f32] {
    match slot {
        AttributeSlot::SpritePosition => bytemuck::cast_slice(streams.positions()),
        AttributeSlot::SpriteSize => bytemuck::cast_slice(streams.sizes()),
        AttributeSlot::SpriteRotation => streams.rotations(),
        AttributeSlot::SheetOffset => bytemuck::cast_slice(streams.sheet_offsets()),
        AttributeSlot::SpriteOrigin => bytemuck::cast_slice(streams.origins()),
        AttributeSlot::QuadVertex => &[],
    }
}

#[inline]
fn byte_len(floats: usize) -> u64 {
    (floats * std::mem::size_of::<f32>()) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Vec2;
    use crate::render::SpriteGrid;

    const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

    fn noop_gpu() -> (wgpu::Device, wgpu::Queue) {
        wgpu::Device::noop(&wgpu::DeviceDescriptor::default())
    }

    fn ctx<'a>(device: &'a wgpu::Device, queue: &'a wgpu::Queue) -> RenderCtx<'a> {
        RenderCtx::new(device, queue, TARGET_FORMAT, Viewport::new(640.0, 480.0))
    }

    fn sheet(device: &wgpu::Device, queue: &wgpu::Queue) -> Arc<SpriteSheet> {
        let pixels = vec![0x80u8; 64 * 32 * 4];
        Arc::new(SpriteSheet::from_rgba8(device, queue, "test sheet", 64, 32, &pixels).unwrap())
    }

    fn color_target(device: &wgpu::Device) -> wgpu::Texture {
        device.create_texture(&wgpu::TextureDescriptor {
            label: Some("test target"),
            size: wgpu::Extent3d { width: 640, height: 480, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
    }

    fn read_buffer(device: &wgpu::Device, queue: &wgpu::Queue, src: &wgpu::Buffer, size: u64) -> Vec<f32> {
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("test readback"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        encoder.copy_buffer_to_buffer(src, 0, &readback, 0, size);
        queue.submit([encoder.finish()]);

        readback.slice(..).map_async(wgpu::MapMode::Read, |r| r.unwrap());
        device.poll(wgpu::PollType::wait_indefinitely()).unwrap();
        let mapped = readback.slice(..).get_mapped_range();
        let floats: Vec<f32> = mapped
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        floats
    }

    const PLAIN_FRAGMENT: &str = "fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }";

    fn program_with(uniforms: &str, inputs: &str) -> ShaderProgram {
        program_from(uniforms, inputs, PLAIN_FRAGMENT)
    }

    fn program_from(uniforms: &str, inputs: &str, fragment: &str) -> ShaderProgram {
        let src = format!(
            r#"
            {uniforms}

            struct Out {{ @builtin(position) clip: vec4<f32> }};

            @vertex
            fn vs_main({inputs}) -> Out {{
                var out: Out;
                out.clip = vec4<f32>(0.0, 0.0, 0.0, 1.0);
                return out;
            }}

            @fragment
            {fragment}
            "#
        );
        ShaderProgram::from_wgsl("test", src).unwrap()
    }

    const SIX_INPUTS: &str = "@location(0) q: vec3<f32>, @location(1) p: vec2<f32>, \
        @location(2) s: vec2<f32>, @location(3) r: f32, @location(4) o: vec2<f32>, \
        @location(5) g: vec2<f32>";

    const BOTH_UNIFORMS: &str = "@group(0) @binding(0) var<uniform> screen_size: vec2<f32>;\n\
        @group(0) @binding(1) var<uniform> sheet_size: vec2<f32>;";

    #[test]
    fn builtin_program_resolves() {
        let program = ShaderProgram::builtin().unwrap();
        let bindings = SpriteBindings::resolve(&program).unwrap();
        assert_eq!(bindings.group_count, 2);
        let resources: Vec<_> = bindings.entries.iter().map(|(_, r)| *r).collect();
        assert_eq!(
            resources,
            vec![
                SpriteResource::ScreenSize,
                SpriteResource::SheetSize,
                SpriteResource::SheetTexture,
                SpriteResource::SheetSampler,
            ]
        );
    }

    #[test]
    fn missing_sheet_size_is_reported() {
        let program = program_with(
            "@group(0) @binding(0) var<uniform> screen_size: vec2<f32>;",
            SIX_INPUTS,
        );
        let err = SpriteBindings::resolve(&program).unwrap_err();
        assert!(matches!(err, RenderError::MissingUniform("sheet_size")));
    }

    #[test]
    fn missing_screen_size_is_reported_first() {
        let program = program_with("", SIX_INPUTS);
        let err = SpriteBindings::resolve(&program).unwrap_err();
        assert!(matches!(err, RenderError::MissingUniform("screen_size")));
    }

    #[test]
    fn non_vec2_uniform_is_rejected() {
        let program = program_with(
            "@group(0) @binding(0) var<uniform> screen_size: vec2<f32>;\n\
             @group(0) @binding(1) var<uniform> sheet_size: vec4<f32>;",
            SIX_INPUTS,
        );
        let err = SpriteBindings::resolve(&program).unwrap_err();
        assert!(matches!(err, RenderError::UniformType("sheet_size")));
    }

    #[test]
    fn rotation_declared_as_vector_is_a_mismatch() {
        let inputs = SIX_INPUTS.replace("@location(3) r: f32", "@location(3) r: vec2<f32>");
        let program = program_with(BOTH_UNIFORMS, &inputs);
        let err = SpriteBindings::resolve(&program).unwrap_err();
        match err {
            RenderError::AttributeMismatch { slot, expected, found } => {
                assert_eq!(slot, AttributeSlot::SpriteRotation);
                assert_eq!(expected, wgpu::VertexFormat::Float32);
                assert_eq!(found, Some(wgpu::VertexFormat::Float32x2));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unread_stream_is_a_mismatch() {
        let inputs = "@location(0) q: vec3<f32>, @location(1) p: vec2<f32>";
        let program = program_with(BOTH_UNIFORMS, inputs);
        let err = SpriteBindings::resolve(&program).unwrap_err();
        assert!(matches!(
            err,
            RenderError::AttributeMismatch { slot: AttributeSlot::SpriteSize, found: None, .. }
        ));
    }

    #[test]
    fn extra_location_is_rejected() {
        let inputs = format!("{SIX_INPUTS}, @location(6) extra: f32");
        let program = program_with(BOTH_UNIFORMS, &inputs);
        let err = SpriteBindings::resolve(&program).unwrap_err();
        assert!(matches!(err, RenderError::UnexpectedAttribute(6)));
    }

    #[test]
    fn storage_buffer_is_unsupported() {
        let uniforms = format!(
            "{BOTH_UNIFORMS}\n@group(2) @binding(0) var<storage, read> extra: array<f32>;"
        );
        let program = program_with(&uniforms, SIX_INPUTS);
        let err = SpriteBindings::resolve(&program).unwrap_err();
        match err {
            RenderError::UnsupportedBinding { name, group, binding } => {
                assert_eq!((name.as_str(), group, binding), ("extra", 2, 0));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn init_fails_without_sheet_size() {
        let (device, queue) = noop_gpu();
        let program = program_with(
            "@group(0) @binding(0) var<uniform> screen_size: vec2<f32>;",
            SIX_INPUTS,
        );
        let err = Renderer::new(&ctx(&device, &queue), &program, 640, 480).err();
        assert!(matches!(err, Some(RenderError::MissingUniform("sheet_size"))));
    }

    #[test]
    fn init_reports_stage_interface_mismatch() {
        let (device, queue) = noop_gpu();
        let fragment = "fn fs_main(@location(3) uv: vec2<f32>) -> @location(0) vec4<f32> {\n\
            return vec4<f32>(uv, 0.0, 1.0);\n\
        }";
        let program = program_from(BOTH_UNIFORMS, SIX_INPUTS, fragment);
        SpriteBindings::resolve(&program).unwrap();

        let err = Renderer::new(&ctx(&device, &queue), &program, 640, 480).err();
        assert!(matches!(err, Some(RenderError::Pipeline(_))));
    }

    #[test]
    fn failed_rebuild_skips_the_draw() {
        let (device, queue) = noop_gpu();
        let program = ShaderProgram::builtin().unwrap();
        let mut renderer = Renderer::new(&ctx(&device, &queue), &program, 640, 480).unwrap();

        // Depth formats cannot take a colour target.
        let depth = RenderCtx::new(
            &device,
            &queue,
            wgpu::TextureFormat::Depth32Float,
            Viewport::new(640.0, 480.0),
        );
        assert!(!renderer.ensure_pipeline(&depth));
        assert_eq!(renderer.failed_format, Some(wgpu::TextureFormat::Depth32Float));
        assert_eq!(renderer.pipeline_format, TARGET_FORMAT);
        assert!(renderer.ensure_pipeline(&ctx(&device, &queue)));
    }

    #[test]
    fn init_writes_screen_size() {
        let (device, queue) = noop_gpu();
        let program = ShaderProgram::builtin().unwrap();
        let renderer = Renderer::new(&ctx(&device, &queue), &program, 640, 480).unwrap();
        assert_eq!(renderer.screen_size(), Viewport::new(640.0, 480.0));
        assert_eq!(renderer.stream_capacity(), MIN_STREAM_CAPACITY);
    }

    #[test]
    fn gaps_in_groups_get_empty_layouts() {
        let (device, queue) = noop_gpu();
        let uniforms = "@group(0) @binding(0) var<uniform> screen_size: vec2<f32>;\n\
            @group(2) @binding(3) var<uniform> sheet_size: vec2<f32>;";
        let program = program_with(uniforms, SIX_INPUTS);
        let mut renderer = Renderer::new(&ctx(&device, &queue), &program, 640, 480).unwrap();
        assert_eq!(renderer.group_layouts.len(), 3);

        let sheet = sheet(&device, &queue);
        let buffer = DrawBuffer::new(sheet);
        let target = color_target(&device);
        let view = target.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        renderer.render(&ctx(&device, &queue), &mut RenderTarget::new(&mut encoder, &view), &buffer);
        queue.submit([encoder.finish()]);
    }

    #[test]
    fn empty_buffer_renders() {
        let (device, queue) = noop_gpu();
        let program = ShaderProgram::builtin().unwrap();
        let mut renderer = Renderer::new(&ctx(&device, &queue), &program, 640, 480).unwrap();
        let buffer = DrawBuffer::new(sheet(&device, &queue));

        let target = color_target(&device);
        let view = target.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        renderer.render(&ctx(&device, &queue), &mut RenderTarget::new(&mut encoder, &view), &buffer);
        queue.submit([encoder.finish()]);

        let sheet_size = read_buffer(&device, &queue, &renderer.sheet_ubo, VEC2_BYTES);
        assert_eq!(sheet_size, vec![64.0, 32.0]);
    }

    #[test]
    fn streams_hold_uploaded_columns() {
        let (device, queue) = noop_gpu();
        let program = ShaderProgram::builtin().unwrap();
        let mut renderer = Renderer::new(&ctx(&device, &queue), &program, 640, 480).unwrap();

        let grid = SpriteGrid::new(21, 21, 2);
        let mut buffer = DrawBuffer::new(sheet(&device, &queue));
        buffer.push_from_grid(&grid, (0, 0), Vec2::new(100.0, 100.0), Vec2::new(10.0, 10.0), 0.1);
        buffer.push_from_grid(&grid, (1, 2), Vec2::new(500.0, 300.0), Vec2::new(10.0, 10.0), 0.0);

        let target = color_target(&device);
        let view = target.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        renderer.render(&ctx(&device, &queue), &mut RenderTarget::new(&mut encoder, &view), &buffer);
        queue.submit([encoder.finish()]);

        let [positions, sizes, rotations, offsets, origins] = &renderer.stream_vbos;
        assert_eq!(read_buffer(&device, &queue, positions, 16), vec![100.0, 100.0, 500.0, 300.0]);
        assert_eq!(read_buffer(&device, &queue, sizes, 16), vec![21.0, 21.0, 21.0, 21.0]);
        assert_eq!(read_buffer(&device, &queue, rotations, 8), vec![0.1, 0.0]);
        assert_eq!(read_buffer(&device, &queue, offsets, 16), vec![2.0, 2.0, 25.0, 48.0]);
        assert_eq!(read_buffer(&device, &queue, origins, 16), vec![10.0, 10.0, 10.0, 10.0]);
    }

    #[test]
    fn two_buffers_in_one_frame() {
        let (device, queue) = noop_gpu();
        let program = ShaderProgram::builtin().unwrap();
        let mut renderer = Renderer::new(&ctx(&device, &queue), &program, 640, 480).unwrap();

        let mut first = DrawBuffer::new(sheet(&device, &queue));
        first.push(Vec2::zero(), Vec2::new(1.0, 1.0), Vec2::splat(4.0), Vec2::zero(), 0.0);

        let pixels = vec![0u8; 16 * 16 * 4];
        let other = SpriteSheet::from_rgba8(&device, &queue, "other", 16, 16, &pixels).unwrap();
        let mut second = DrawBuffer::new(Arc::new(other));
        second.push(Vec2::zero(), Vec2::new(7.0, 7.0), Vec2::splat(4.0), Vec2::zero(), 0.0);

        let target = color_target(&device);
        let view = target.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        {
            let mut rt = RenderTarget::new(&mut encoder, &view);
            renderer.render(&ctx(&device, &queue), &mut rt, &first);
            renderer.render(&ctx(&device, &queue), &mut rt, &second);
        }
        queue.submit([encoder.finish()]);

        // The last recorded upload wins once the frame has executed.
        let sheet_size = read_buffer(&device, &queue, &renderer.sheet_ubo, VEC2_BYTES);
        assert_eq!(sheet_size, vec![16.0, 16.0]);
        let positions = read_buffer(&device, &queue, &renderer.stream_vbos[0], 8);
        assert_eq!(positions, vec![7.0, 7.0]);
    }

    #[test]
    fn bind_groups_are_cached_per_sheet() {
        let (device, queue) = noop_gpu();
        let program = ShaderProgram::builtin().unwrap();
        let mut renderer = Renderer::new(&ctx(&device, &queue), &program, 640, 480).unwrap();
        let target = color_target(&device);
        let view = target.create_view(&wgpu::TextureViewDescriptor::default());

        let kept = DrawBuffer::new(sheet(&device, &queue));
        let dropped = DrawBuffer::new(sheet(&device, &queue));
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        {
            let mut rt = RenderTarget::new(&mut encoder, &view);
            renderer.render(&ctx(&device, &queue), &mut rt, &kept);
            renderer.render(&ctx(&device, &queue), &mut rt, &kept);
            renderer.render(&ctx(&device, &queue), &mut rt, &dropped);
        }
        queue.submit([encoder.finish()]);
        assert_eq!(renderer.sheet_bindings.len(), 2);

        drop(dropped);
        let fresh = DrawBuffer::new(sheet(&device, &queue));
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        renderer.render(&ctx(&device, &queue), &mut RenderTarget::new(&mut encoder, &view), &fresh);
        queue.submit([encoder.finish()]);

        assert_eq!(renderer.sheet_bindings.len(), 2);
        assert!(renderer.sheet_bindings.iter().all(|b| b.sheet.strong_count() == 1));
    }

    #[test]
    fn streams_grow_to_power_of_two() {
        let (device, queue) = noop_gpu();
        let program = ShaderProgram::builtin().unwrap();
        let mut renderer = Renderer::new(&ctx(&device, &queue), &program, 640, 480).unwrap();

        let mut buffer = DrawBuffer::new(sheet(&device, &queue));
        for i in 0..100 {
            buffer.push(Vec2::zero(), Vec2::splat(i as f32), Vec2::splat(1.0), Vec2::zero(), 0.0);
        }

        let target = color_target(&device);
        let view = target.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        renderer.render(&ctx(&device, &queue), &mut RenderTarget::new(&mut encoder, &view), &buffer);
        queue.submit([encoder.finish()]);

        assert_eq!(renderer.stream_capacity(), 128);
        assert_eq!(
            renderer.stream_vbos[0].size(),
            AttributeSlot::SpritePosition.stride() * 128
        );
    }
}
