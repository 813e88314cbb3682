//! Kiln engine crate.
//!
//! Draws textured, lit meshes with as few GPU submissions as possible:
//! a shader cache of precompiled program variants, a batcher that merges
//! per-object geometry into one draw per variant, and a texture packer that
//! remaps per-image UVs into shared atlas pages.

pub mod atlas;
pub mod batch;
pub mod config;
pub mod device;
pub mod logging;
pub mod mesh;
pub mod render;
pub mod shader;
pub mod transform;
