use bytemuck::{Pod, Zeroable};

/// Vertex layout shared by every batched shader variant.
///
/// `packed_texture_index` selects the atlas page (texture array layer) and
/// `transform_index` selects the local-to-world matrix in the transform table.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct PackedVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub packed_texture_index: u32,
    pub transform_index: u32,
}

impl PackedVertex {
    const ATTRS: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
        0 => Float32x3, // position
        1 => Float32x3, // normal
        2 => Float32x2, // uv (already atlas-remapped)
        3 => Uint32,    // packed texture index
        4 => Uint32     // transform index
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<PackedVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}
