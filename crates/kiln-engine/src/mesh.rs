use crate::batch::Submission;
use crate::transform::TransformIndex;

/// Model-loader output: one textured mesh with raw (per-image) UVs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TexturedMesh {
    pub indices: Vec<u32>,
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    /// Id of the source image in the atlas descriptor.
    pub source_image: String,
}

impl TexturedMesh {
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}

/// A [`TexturedMesh`] with UVs remapped into an atlas page.
///
/// Built by [`TexturePacker::pack_mesh`](crate::atlas::TexturePacker::pack_mesh).
/// Keeps per-vertex atlas slot and transform index arrays so it can be
/// queued without further allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedMesh {
    indices: Vec<u32>,
    positions: Vec<[f32; 3]>,
    normals: Vec<[f32; 3]>,
    packed_uvs: Vec<[f32; 2]>,
    packed_texture_indices: Vec<u32>,
    transform_indices: Vec<u32>,
    atlas_slot: u32,
    generation: u64,
}

impl PackedMesh {
    pub(crate) fn new(
        mesh: &TexturedMesh,
        packed_uvs: Vec<[f32; 2]>,
        atlas_slot: u32,
        generation: u64,
    ) -> Self {
        let n = mesh.vertex_count();
        Self {
            indices: mesh.indices.clone(),
            positions: mesh.positions.clone(),
            normals: mesh.normals.clone(),
            packed_uvs,
            packed_texture_indices: vec![atlas_slot; n],
            transform_indices: vec![0; n],
            atlas_slot,
            generation,
        }
    }

    /// Points every vertex at one transform-table slot.
    pub fn set_transform_index(&mut self, index: TransformIndex) {
        self.transform_indices.fill(index);
    }

    /// Borrowed view for `queue_draw`.
    pub fn submission(&self) -> Submission<'_> {
        Submission {
            indices: &self.indices,
            positions: &self.positions,
            transform_indices: &self.transform_indices,
            packed_texture_indices: &self.packed_texture_indices,
            uvs: &self.packed_uvs,
            normals: &self.normals,
        }
    }

    #[inline]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    #[inline]
    pub fn packed_uvs(&self) -> &[[f32; 2]] {
        &self.packed_uvs
    }

    #[inline]
    pub fn atlas_slot(&self) -> u32 {
        self.atlas_slot
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::DrawBatch;
    use crate::shader::ShaderVariant;

    fn triangle() -> TexturedMesh {
        TexturedMesh {
            indices: vec![0, 1, 2],
            positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            normals: vec![[0.0, 0.0, 1.0]; 3],
            uvs: vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]],
            source_image: "tri".to_string(),
        }
    }

    #[test]
    fn submission_carries_slot_and_transform_per_vertex() {
        let mesh = triangle();
        let mut packed = PackedMesh::new(&mesh, mesh.uvs.clone(), 2, 7);
        packed.set_transform_index(5);

        let sub = packed.submission();
        assert_eq!(sub.packed_texture_indices, &[2, 2, 2]);
        assert_eq!(sub.transform_indices, &[5, 5, 5]);
        assert_eq!(sub.vertex_count(), 3);
    }

    #[test]
    fn packed_mesh_queues_cleanly() {
        let mesh = triangle();
        let packed = PackedMesh::new(&mesh, mesh.uvs.clone(), 0, 1);

        let mut batch = DrawBatch::new(ShaderVariant::AtlasTransformTable, 4);
        assert!(batch.queue_draw(0, &packed.submission()).is_ok());
        assert_eq!(batch.index_count(), 3);
    }
}
