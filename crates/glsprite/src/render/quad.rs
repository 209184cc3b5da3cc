//! Shared quad geometry and the fixed vertex attribute slots.

// ── quad geometry ─────────────────────────────────────────────────────────

/// Unit quad as a 4-vertex triangle strip, in `[-1, 1]`.
///
/// Uploaded once per renderer and reused by every instance.
pub const QUAD_VERTICES: [[f32; 3]; 4] = [
    [-1.0, -1.0, 0.0],
    [ 1.0, -1.0, 0.0],
    [-1.0,  1.0, 0.0],
    [ 1.0,  1.0, 0.0],
];

pub const QUAD_VERTEX_COUNT: u32 = QUAD_VERTICES.len() as u32;

// ── attribute slots ───────────────────────────────────────────────────────

/// Vertex attribute slots shared between the renderer and the sprite shader.
///
/// The discriminant is both the `@location` in WGSL and the vertex buffer
/// index the stream is bound to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum AttributeSlot {
    QuadVertex = 0,
    SpritePosition = 1,
    SpriteSize = 2,
    SpriteRotation = 3,
    SheetOffset = 4,
    SpriteOrigin = 5,
}

impl AttributeSlot {
    pub const ALL: [AttributeSlot; 6] = [
        AttributeSlot::QuadVertex,
        AttributeSlot::SpritePosition,
        AttributeSlot::SpriteSize,
        AttributeSlot::SpriteRotation,
        AttributeSlot::SheetOffset,
        AttributeSlot::SpriteOrigin,
    ];

    /// Per-instance streams, in upload order.
    pub const INSTANCED: [AttributeSlot; 5] = [
        AttributeSlot::SpritePosition,
        AttributeSlot::SpriteSize,
        AttributeSlot::SpriteRotation,
        AttributeSlot::SheetOffset,
        AttributeSlot::SpriteOrigin,
    ];

    #[inline]
    pub const fn location(self) -> u32 {
        self as u32
    }

    pub const fn format(self) -> wgpu::VertexFormat {
        match self {
            AttributeSlot::QuadVertex => wgpu::VertexFormat::Float32x3,
            AttributeSlot::SpriteRotation => wgpu::VertexFormat::Float32,
            _ => wgpu::VertexFormat::Float32x2,
        }
    }

    /// Number of `f32` components per element.
    pub const fn components(self) -> u64 {
        match self {
            AttributeSlot::QuadVertex => 3,
            AttributeSlot::SpriteRotation => 1,
            _ => 2,
        }
    }

    pub const fn step_mode(self) -> wgpu::VertexStepMode {
        match self {
            AttributeSlot::QuadVertex => wgpu::VertexStepMode::Vertex,
            _ => wgpu::VertexStepMode::Instance,
        }
    }

    /// Byte stride of one element of this stream.
    pub const fn stride(self) -> wgpu::BufferAddress {
        self.components() * std::mem::size_of::<f32>() as u64
    }

    const fn attributes(self) -> &'static [wgpu::VertexAttribute] {
        match self {
            AttributeSlot::QuadVertex => &QUAD_VERTEX_ATTRS,
            AttributeSlot::SpritePosition => &SPRITE_POSITION_ATTRS,
            AttributeSlot::SpriteSize => &SPRITE_SIZE_ATTRS,
            AttributeSlot::SpriteRotation => &SPRITE_ROTATION_ATTRS,
            AttributeSlot::SheetOffset => &SHEET_OFFSET_ATTRS,
            AttributeSlot::SpriteOrigin => &SPRITE_ORIGIN_ATTRS,
        }
    }

    pub fn layout(self) -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: self.stride(),
            step_mode: self.step_mode(),
            attributes: self.attributes(),
        }
    }
}

const QUAD_VERTEX_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];
const SPRITE_POSITION_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Float32x2];
const SPRITE_SIZE_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![2 => Float32x2];
const SPRITE_ROTATION_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![3 => Float32];
const SHEET_OFFSET_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![4 => Float32x2];
const SPRITE_ORIGIN_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![5 => Float32x2];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_are_dense_and_ordered() {
        for (i, slot) in AttributeSlot::ALL.iter().enumerate() {
            assert_eq!(slot.location(), i as u32);
        }
    }

    #[test]
    fn layouts_agree_with_slot_metadata() {
        for slot in AttributeSlot::ALL {
            let layout = slot.layout();
            assert_eq!(layout.attributes.len(), 1);
            assert_eq!(layout.attributes[0].shader_location, slot.location());
            assert_eq!(layout.attributes[0].format, slot.format());
            assert_eq!(layout.attributes[0].format.size(), slot.stride());
        }
    }

    #[test]
    fn only_the_quad_steps_per_vertex() {
        assert_eq!(AttributeSlot::QuadVertex.step_mode(), wgpu::VertexStepMode::Vertex);
        for slot in AttributeSlot::INSTANCED {
            assert_eq!(slot.step_mode(), wgpu::VertexStepMode::Instance);
        }
    }
}
