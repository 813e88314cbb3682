use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Context;
use glam::Vec2;
use image::RgbaImage;

use crate::mesh::{PackedMesh, TexturedMesh};

use super::{AtlasDescriptor, AtlasError, UvTransform};

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// A texture coordinate remapped into atlas space.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PackedUv {
    /// Page the image lives on (texture array layer).
    pub atlas_slot: u32,
    pub uv: Vec2,
}

/// Atlas pages plus the per-image UV remap built from a descriptor.
///
/// Every packer gets a fresh generation; meshes packed by one packer are
/// reported stale by any other, so a rebuild invalidates earlier remaps.
#[derive(Debug)]
pub struct TexturePacker {
    descriptor: AtlasDescriptor,
    remaps: HashMap<String, (u32, UvTransform)>,
    pages: Vec<RgbaImage>,
    generation: u64,
}

impl TexturePacker {
    /// Reads the JSON descriptor and one image per atlas page.
    ///
    /// `atlas_paths[i]` is the image for atlas index `i`.
    pub fn load<P: AsRef<Path>>(
        descriptor_path: impl AsRef<Path>,
        atlas_paths: &[P],
    ) -> anyhow::Result<Self> {
        let descriptor = AtlasDescriptor::from_path(descriptor_path)?;

        let pages = atlas_paths
            .iter()
            .map(|path| {
                let path = path.as_ref();
                image::open(path)
                    .map(|img| img.to_rgba8())
                    .with_context(|| format!("failed to load atlas page {}", path.display()))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let packer = Self::from_descriptor(descriptor, pages)?;
        log::info!(
            "texture packer: {} image(s) on {} page(s), generation {}",
            packer.remaps.len(),
            packer.pages.len(),
            packer.generation
        );
        Ok(packer)
    }

    /// Builds a packer from an in-memory descriptor and its page images.
    ///
    /// `pages[i]` is the image for atlas index `i`; indices must be dense.
    pub fn from_descriptor(
        descriptor: AtlasDescriptor,
        pages: Vec<RgbaImage>,
    ) -> Result<Self, AtlasError> {
        descriptor.validate()?;

        if let Some(page) = descriptor
            .atlases
            .iter()
            .find(|p| p.index as usize >= pages.len())
        {
            return Err(AtlasError::MissingPage { atlas: page.index });
        }

        for (slot, image) in pages.iter().enumerate() {
            let atlas = slot as u32;
            let Some(page) = descriptor.page(atlas) else {
                return Err(AtlasError::UndescribedPage { atlas });
            };
            if image.dimensions() != (page.width, page.height) {
                return Err(AtlasError::PageSizeMismatch {
                    atlas,
                    expected: (page.width, page.height),
                    found: image.dimensions(),
                });
            }
        }

        // Pages are layers of one texture array.
        if let Some(first) = pages.first() {
            if let Some((slot, image)) = pages
                .iter()
                .enumerate()
                .find(|(_, image)| image.dimensions() != first.dimensions())
            {
                return Err(AtlasError::PageSizeMismatch {
                    atlas: slot as u32,
                    expected: first.dimensions(),
                    found: image.dimensions(),
                });
            }
        }

        let mut remaps = HashMap::with_capacity(descriptor.images.len());
        for (image, region) in &descriptor.images {
            // Checked by validate().
            let Some(page) = descriptor.page(region.atlas) else {
                continue;
            };
            let transform = region.rect().uv_transform(page.width, page.height);
            remaps.insert(image.clone(), (region.atlas, transform));
        }

        Ok(Self {
            descriptor,
            remaps,
            pages,
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
        })
    }

    /// Remaps `uv` of `image` into its atlas page. Pure.
    pub fn remap(&self, image: &str, uv: Vec2) -> Result<PackedUv, AtlasError> {
        let (atlas_slot, transform) = self.uv_transform(image)?;
        Ok(PackedUv {
            atlas_slot,
            uv: transform.apply(uv),
        })
    }

    /// Atlas slot and affine UV transform for `image`.
    pub fn uv_transform(&self, image: &str) -> Result<(u32, UvTransform), AtlasError> {
        self.remaps
            .get(image)
            .copied()
            .ok_or_else(|| AtlasError::UnknownImage(image.to_string()))
    }

    /// Remaps every UV of `mesh` and stamps this packer's generation.
    pub fn pack_mesh(&self, mesh: &TexturedMesh) -> Result<PackedMesh, AtlasError> {
        let (atlas_slot, transform) = self.uv_transform(&mesh.source_image)?;
        let packed_uvs = mesh
            .uvs
            .iter()
            .map(|&uv| transform.apply(Vec2::from(uv)).to_array())
            .collect();
        Ok(PackedMesh::new(mesh, packed_uvs, atlas_slot, self.generation))
    }

    /// `StaleRemap` if `mesh` was packed by a different packer.
    pub fn check_generation(&self, mesh: &PackedMesh) -> Result<(), AtlasError> {
        if mesh.generation() == self.generation {
            Ok(())
        } else {
            Err(AtlasError::StaleRemap {
                packed: mesh.generation(),
                current: self.generation,
            })
        }
    }

    /// Page images indexed by atlas slot.
    #[inline]
    pub fn pages(&self) -> &[RgbaImage] {
        &self.pages
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn descriptor(&self) -> &AtlasDescriptor {
        &self.descriptor
    }
}
