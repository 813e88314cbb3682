//! Texture atlas packing.
//!
//! Source images are packed offline into a few atlas pages; a JSON descriptor
//! records where each one landed. [`TexturePacker`] loads that result and
//! remaps per-image UVs into page space so differently textured meshes can
//! share one draw.

mod descriptor;
mod error;
mod packer;
mod region;

pub use descriptor::{AtlasDescriptor, AtlasPage, ImageRegion};
pub use error::AtlasError;
pub use packer::{PackedUv, TexturePacker};
pub use region::{PixelRect, UvTransform};
