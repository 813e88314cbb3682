//! Shader program cache.
//!
//! Programs are identified by a closed [`ShaderVariant`] enum; uniforms by a
//! closed [`UniformKey`] enum. Each variant has a static table entry holding
//! its WGSL source and the byte offset of every uniform it exposes, so call
//! sites never deal with GPU-side names.

mod cache;
mod error;
mod uniform;
mod variant;

pub use cache::{CompiledProgram, ShaderCache};
pub use error::{ShaderError, UniformError};
pub use uniform::{UniformKey, UniformKind, UniformLocation, UniformValue};
pub use variant::{ProgramSource, ShaderVariant, UniformSlot, VariantInfo};
