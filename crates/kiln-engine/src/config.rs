use crate::shader::ShaderVariant;
use crate::transform::DEFAULT_TRANSFORM_TABLE_CAPACITY;

/// Renderer configuration consumed when the shader cache and backend are built.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Shader variants compiled up front. Order is the flush order.
    pub variants: Vec<ShaderVariant>,

    /// Slots in the transform table. Bounded by the device's uniform binding
    /// size (64 bytes per slot).
    pub transform_table_capacity: usize,

    /// Color the frame is cleared to before batches are drawn.
    pub clear_color: wgpu::Color,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            variants: vec![ShaderVariant::AtlasTransformTableAmbientDiffuse],
            transform_table_capacity: DEFAULT_TRANSFORM_TABLE_CAPACITY,
            clear_color: wgpu::Color {
                r: 0.05,
                g: 0.05,
                b: 0.07,
                a: 1.0,
            },
        }
    }
}
