//! GPU rendering subsystem.
//!
//! Shader cache and batcher talk to the GPU only through [`GpuBackend`].
//! [`WgpuBackend`] is the real implementation; [`recording::RecordingBackend`]
//! records calls for headless use.
//!
//! Convention:
//! - Geometry is in model space; the vertex shader applies the transform table
//!   entry, then world→camera and camera→clip.
//! - UVs are already remapped into atlas space when they reach the GPU.

mod backend;
mod ctx;
mod vertex;
mod wgpu_backend;

pub mod recording;

pub use backend::GpuBackend;
pub use ctx::{RenderCtx, RenderTarget};
pub use vertex::PackedVertex;
pub use wgpu_backend::{WgpuBackend, WgpuProgram};
