use std::fmt;

use glam::Mat4;
use image::RgbaImage;

use crate::render::PackedVertex;
use crate::shader::{ProgramSource, ShaderError, UniformLocation};
use crate::transform::TransformError;

/// GPU operations needed by the shader cache and the batcher.
///
/// Implemented by [`WgpuBackend`](super::WgpuBackend) for rendering and by
/// [`RecordingBackend`](super::recording::RecordingBackend) for headless runs
/// and tests. All calls come from the render-loop thread.
pub trait GpuBackend {
    /// Opaque, copyable handle to a compiled program.
    type Program: Copy + Eq + fmt::Debug;

    /// Number of slots in the transform table the programs index into.
    fn transform_table_capacity(&self) -> usize;

    /// Compiles and links one program.
    fn compile_program(&mut self, source: &ProgramSource) -> Result<Self::Program, ShaderError>;

    /// Frees a program. The handle is not used again.
    fn release_program(&mut self, program: Self::Program);

    /// Makes `program` the active program for subsequent draws.
    fn bind_program(&mut self, program: Self::Program);

    /// Uploads `bytes` at `location` inside the program's uniform block.
    fn write_uniform(&mut self, program: Self::Program, location: UniformLocation, bytes: &[u8]);

    /// Replaces the program's vertex and index data with a single upload.
    fn upload_geometry(&mut self, program: Self::Program, vertices: &[PackedVertex], indices: &[u32]);

    /// Issues one indexed draw over the first `index_count` uploaded indices.
    fn draw_indexed(&mut self, program: Self::Program, index_count: u32);

    /// Uploads the transform table. More matrices than the capacity is an error.
    fn upload_transform_table(&mut self, matrices: &[Mat4]) -> Result<(), TransformError>;

    /// Replaces the atlas pages sampled by every program. Page `i` becomes
    /// packed texture index `i`.
    fn upload_atlas_pages(&mut self, pages: &[RgbaImage]) -> anyhow::Result<()>;
}
