//! Headless backend that records every GPU call.
//!
//! Used by tests and tools that need to drive the shader cache and batcher
//! without a device. Uniform writes, uploads and draws are kept so they can be
//! inspected (and read back) afterwards.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use glam::Mat4;
use image::RgbaImage;

use crate::render::{GpuBackend, PackedVertex};
use crate::shader::{ProgramSource, ShaderError, ShaderVariant, UniformLocation, UniformValue};
use crate::transform::{TransformError, DEFAULT_TRANSFORM_TABLE_CAPACITY};

/// Program handle issued by [`RecordingBackend`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct RecordedProgram(pub u32);

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum GpuCall {
    Compile(ShaderVariant),
    Release(RecordedProgram),
    Bind(RecordedProgram),
    WriteUniform {
        program: RecordedProgram,
        location: UniformLocation,
    },
    UploadGeometry {
        program: RecordedProgram,
        vertices: usize,
        indices: usize,
    },
    DrawIndexed {
        program: RecordedProgram,
        index_count: u32,
    },
    UploadTransforms(usize),
    UploadAtlasPages(usize),
}

#[derive(Debug, Default)]
struct ProgramState {
    variant: Option<ShaderVariant>,
    uniform_block: Vec<u8>,
    vertices: Vec<PackedVertex>,
    indices: Vec<u32>,
}

/// Everything a [`RecordingBackend`] has seen.
#[derive(Debug, Default)]
pub struct Recording {
    calls: Vec<GpuCall>,
    programs: HashMap<RecordedProgram, ProgramState>,
    bound: Option<RecordedProgram>,
    transforms: Vec<Mat4>,
    atlas_pages: usize,
}

impl Recording {
    pub fn calls(&self) -> &[GpuCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Number of `DrawIndexed` calls recorded.
    pub fn draw_calls(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, GpuCall::DrawIndexed { .. }))
            .count()
    }

    /// Programs compiled and not yet released.
    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn bound(&self) -> Option<RecordedProgram> {
        self.bound
    }

    pub fn variant_of(&self, program: RecordedProgram) -> Option<ShaderVariant> {
        self.programs.get(&program)?.variant
    }

    /// Reads a uniform back from the program's uniform block.
    pub fn read_uniform(
        &self,
        program: RecordedProgram,
        location: UniformLocation,
    ) -> Option<UniformValue> {
        let block = &self.programs.get(&program)?.uniform_block;
        let bytes = block.get(location.byte_range())?;
        UniformValue::read_from(location.kind, bytes)
    }

    /// Reads a uniform back from the currently bound program.
    pub fn read_bound_uniform(&self, location: UniformLocation) -> Option<UniformValue> {
        self.read_uniform(self.bound?, location)
    }

    /// Last geometry uploaded for `program`.
    pub fn geometry(&self, program: RecordedProgram) -> Option<(&[PackedVertex], &[u32])> {
        let state = self.programs.get(&program)?;
        Some((&state.vertices, &state.indices))
    }

    pub fn transforms(&self) -> &[Mat4] {
        &self.transforms
    }

    pub fn atlas_pages(&self) -> usize {
        self.atlas_pages
    }
}

/// Instrumented [`GpuBackend`] that performs no GPU work.
///
/// The recording is shared through an `Rc`, so it stays readable after the
/// backend has been moved into (and dropped with) a `ShaderCache`.
#[derive(Debug)]
pub struct RecordingBackend {
    log: Rc<RefCell<Recording>>,
    transform_table_capacity: usize,
    failing: Vec<ShaderVariant>,
    next_program: u32,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::with_transform_capacity(DEFAULT_TRANSFORM_TABLE_CAPACITY)
    }

    pub fn with_transform_capacity(capacity: usize) -> Self {
        Self {
            log: Rc::new(RefCell::new(Recording::default())),
            transform_table_capacity: capacity,
            failing: Vec::new(),
            next_program: 0,
        }
    }

    /// Makes `compile_program` fail for `variant`.
    pub fn failing_on(mut self, variant: ShaderVariant) -> Self {
        self.failing.push(variant);
        self
    }

    /// Shared handle to the recording.
    pub fn log(&self) -> Rc<RefCell<Recording>> {
        Rc::clone(&self.log)
    }
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuBackend for RecordingBackend {
    type Program = RecordedProgram;

    fn transform_table_capacity(&self) -> usize {
        self.transform_table_capacity
    }

    fn compile_program(&mut self, source: &ProgramSource) -> Result<Self::Program, ShaderError> {
        let mut log = self.log.borrow_mut();
        log.calls.push(GpuCall::Compile(source.variant));

        if self.failing.contains(&source.variant) {
            return Err(ShaderError::Compile {
                variant: source.variant,
                message: "injected compile failure".to_string(),
            });
        }

        let program = RecordedProgram(self.next_program);
        self.next_program += 1;
        log.programs.insert(
            program,
            ProgramState {
                variant: Some(source.variant),
                uniform_block: vec![0; source.uniform_block_size as usize],
                ..ProgramState::default()
            },
        );
        Ok(program)
    }

    fn release_program(&mut self, program: Self::Program) {
        let mut log = self.log.borrow_mut();
        log.calls.push(GpuCall::Release(program));
        log.programs.remove(&program);
        if log.bound == Some(program) {
            log.bound = None;
        }
    }

    fn bind_program(&mut self, program: Self::Program) {
        let mut log = self.log.borrow_mut();
        log.calls.push(GpuCall::Bind(program));
        log.bound = Some(program);
    }

    fn write_uniform(&mut self, program: Self::Program, location: UniformLocation, bytes: &[u8]) {
        let mut log = self.log.borrow_mut();
        log.calls.push(GpuCall::WriteUniform { program, location });
        if let Some(dst) = log
            .programs
            .get_mut(&program)
            .and_then(|state| state.uniform_block.get_mut(location.byte_range()))
        {
            dst.copy_from_slice(bytes);
        }
    }

    fn upload_geometry(&mut self, program: Self::Program, vertices: &[PackedVertex], indices: &[u32]) {
        let mut log = self.log.borrow_mut();
        log.calls.push(GpuCall::UploadGeometry {
            program,
            vertices: vertices.len(),
            indices: indices.len(),
        });
        if let Some(state) = log.programs.get_mut(&program) {
            state.vertices = vertices.to_vec();
            state.indices = indices.to_vec();
        }
    }

    fn draw_indexed(&mut self, program: Self::Program, index_count: u32) {
        self.log
            .borrow_mut()
            .calls
            .push(GpuCall::DrawIndexed { program, index_count });
    }

    fn upload_transform_table(&mut self, matrices: &[Mat4]) -> Result<(), TransformError> {
        if matrices.len() > self.transform_table_capacity {
            return Err(TransformError::CapacityExceeded {
                capacity: self.transform_table_capacity,
            });
        }
        let mut log = self.log.borrow_mut();
        log.calls.push(GpuCall::UploadTransforms(matrices.len()));
        log.transforms = matrices.to_vec();
        Ok(())
    }

    fn upload_atlas_pages(&mut self, pages: &[RgbaImage]) -> anyhow::Result<()> {
        anyhow::ensure!(!pages.is_empty(), "at least one atlas page is required");
        let mut log = self.log.borrow_mut();
        log.calls.push(GpuCall::UploadAtlasPages(pages.len()));
        log.atlas_pages = pages.len();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::UniformKind;

    #[test]
    fn uniform_writes_land_in_program_block() {
        let mut backend = RecordingBackend::new();
        let program = backend
            .compile_program(&ShaderVariant::AtlasTransformTable.program_source(16))
            .unwrap();

        let location = UniformLocation { offset: 128, kind: UniformKind::Int };
        backend.write_uniform(program, location, bytemuck::bytes_of(&42i32));
        backend.bind_program(program);

        let log = backend.log();
        assert_eq!(log.borrow().read_bound_uniform(location), Some(UniformValue::Int(42)));
    }

    #[test]
    fn transform_upload_respects_capacity() {
        let mut backend = RecordingBackend::with_transform_capacity(2);
        assert!(backend.upload_transform_table(&[Mat4::IDENTITY; 2]).is_ok());
        assert_eq!(
            backend.upload_transform_table(&[Mat4::IDENTITY; 3]),
            Err(TransformError::CapacityExceeded { capacity: 2 })
        );
        assert_eq!(backend.log().borrow().transforms().len(), 2);
    }
}
