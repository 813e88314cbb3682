use std::collections::HashMap;
use std::ops::Range;

use crate::render::PackedVertex;
use crate::shader::ShaderVariant;

use super::error::BatchError;

/// Caller-chosen object identifier, unique per variant within a frame.
pub type ObjectId = u32;

/// One object's geometry as parallel per-vertex arrays.
///
/// Indices are local to the object (0 addresses its first vertex). UVs and
/// packed texture indices are expected to be atlas-remapped already.
#[derive(Debug, Clone, Copy, Default)]
pub struct Submission<'a> {
    pub indices: &'a [u32],
    pub positions: &'a [[f32; 3]],
    pub transform_indices: &'a [u32],
    pub packed_texture_indices: &'a [u32],
    pub uvs: &'a [[f32; 2]],
    pub normals: &'a [[f32; 3]],
}

impl Submission<'_> {
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    fn check_lengths(&self, object: ObjectId) -> Result<(), BatchError> {
        let expected = self.positions.len();
        let lengths = [
            ("normals", self.normals.len()),
            ("uvs", self.uvs.len()),
            ("packed_texture_indices", self.packed_texture_indices.len()),
            ("transform_indices", self.transform_indices.len()),
        ];
        match lengths.into_iter().find(|&(_, len)| len != expected) {
            Some((attribute, found)) => Err(BatchError::InconsistentAttributeLength {
                object,
                attribute,
                expected,
                found,
            }),
            None => Ok(()),
        }
    }
}

/// Vertex and index ranges an object occupies in its merged batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRange {
    pub vertices: Range<u32>,
    pub indices: Range<u32>,
}

/// Merged geometry for one shader variant.
///
/// Indices are rebased on append, so every index addresses a vertex of this
/// batch: `indices.iter().all(|&i| i < vertex_count)` holds after any sequence
/// of `queue_draw`/`remove` calls.
#[derive(Debug)]
pub struct DrawBatch {
    variant: ShaderVariant,
    transform_table_capacity: usize,
    vertices: Vec<PackedVertex>,
    indices: Vec<u32>,
    objects: HashMap<ObjectId, ObjectRange>,
}

impl DrawBatch {
    pub fn new(variant: ShaderVariant, transform_table_capacity: usize) -> Self {
        Self {
            variant,
            transform_table_capacity,
            vertices: Vec::new(),
            indices: Vec::new(),
            objects: HashMap::new(),
        }
    }

    #[inline]
    pub fn variant(&self) -> ShaderVariant {
        self.variant
    }

    #[inline]
    pub fn vertices(&self) -> &[PackedVertex] {
        &self.vertices
    }

    #[inline]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// True when there is nothing to draw (no indices).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn object_range(&self, object: ObjectId) -> Option<&ObjectRange> {
        self.objects.get(&object)
    }

    /// Validates and appends one object.
    ///
    /// On error nothing is appended and the rejection is logged.
    pub fn queue_draw(
        &mut self,
        object: ObjectId,
        submission: &Submission<'_>,
    ) -> Result<ObjectRange, BatchError> {
        self.validate(object, submission).inspect_err(|err| {
            log::warn!("{}: dropping submission: {err}", self.variant);
        })?;

        let base = self.vertices.len() as u32;
        let index_start = self.indices.len() as u32;

        self.vertices.extend((0..submission.vertex_count()).map(|i| PackedVertex {
            position: submission.positions[i],
            normal: submission.normals[i],
            uv: submission.uvs[i],
            packed_texture_index: submission.packed_texture_indices[i],
            transform_index: submission.transform_indices[i],
        }));
        self.indices
            .extend(submission.indices.iter().map(|&i| base + i));

        let range = ObjectRange {
            vertices: base..self.vertices.len() as u32,
            indices: index_start..self.indices.len() as u32,
        };
        self.objects.insert(object, range.clone());
        Ok(range)
    }

    fn validate(&self, object: ObjectId, submission: &Submission<'_>) -> Result<(), BatchError> {
        if self.objects.contains_key(&object) {
            return Err(BatchError::DuplicateObject {
                object,
                variant: self.variant,
            });
        }

        submission.check_lengths(object)?;

        let vertex_count = submission.vertex_count();
        if let Some(&index) = submission
            .indices
            .iter()
            .find(|&&i| i as usize >= vertex_count)
        {
            return Err(BatchError::IndexOutOfRange {
                object,
                index,
                vertex_count,
            });
        }

        if let Some(&index) = submission
            .transform_indices
            .iter()
            .find(|&&t| t as usize >= self.transform_table_capacity)
        {
            return Err(BatchError::TransformIndexOutOfRange {
                object,
                index,
                capacity: self.transform_table_capacity,
            });
        }

        let vertices = self.vertices.len() + vertex_count;
        let indices = self.indices.len() + submission.indices.len();
        if vertices > u32::MAX as usize || indices > u32::MAX as usize {
            return Err(BatchError::VertexLimitExceeded { object, vertices });
        }

        Ok(())
    }

    /// Removes every object with a transform index that leaves the table once
    /// shifted by `offset`. Returns one error per removed object, by id.
    pub fn reject_shifted_transforms(&mut self, offset: i32) -> Vec<BatchError> {
        // Unshifted indices were checked on queue.
        if offset == 0 {
            return Vec::new();
        }

        let capacity = self.transform_table_capacity;
        let mut rejected: Vec<(ObjectId, u32)> = self
            .objects
            .iter()
            .filter_map(|(&object, range)| {
                self.vertices[range.vertices.start as usize..range.vertices.end as usize]
                    .iter()
                    .map(|v| v.transform_index)
                    .find(|&t| {
                        let slot = offset as i64 + t as i64;
                        slot < 0 || slot >= capacity as i64
                    })
                    .map(|index| (object, index))
            })
            .collect();
        rejected.sort_unstable();

        rejected
            .into_iter()
            .map(|(object, index)| {
                self.remove(object);
                BatchError::ShiftedTransformOutOfRange {
                    object,
                    index,
                    offset,
                    capacity,
                }
            })
            .collect()
    }

    /// Removes an object's vertices and indices, rebasing everything queued
    /// after it.
    pub fn remove(&mut self, object: ObjectId) -> Option<ObjectRange> {
        let removed = self.objects.remove(&object)?;
        let vertex_shift = removed.vertices.end - removed.vertices.start;
        let index_shift = removed.indices.end - removed.indices.start;

        self.vertices
            .drain(removed.vertices.start as usize..removed.vertices.end as usize);
        self.indices
            .drain(removed.indices.start as usize..removed.indices.end as usize);

        // Later objects sit after the removed ranges, so their indices all
        // reference vertices past it.
        for index in &mut self.indices[removed.indices.start as usize..] {
            *index -= vertex_shift;
        }
        for range in self.objects.values_mut() {
            if range.vertices.start >= removed.vertices.end {
                range.vertices.start -= vertex_shift;
                range.vertices.end -= vertex_shift;
            }
            if range.indices.start >= removed.indices.end {
                range.indices.start -= index_shift;
                range.indices.end -= index_shift;
            }
        }

        Some(removed)
    }

    /// Drops all geometry; allocations are kept for the next frame.
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
        self.objects.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARIANT: ShaderVariant = ShaderVariant::AtlasTransformTable;

    /// Owned storage for a quad-like object with `n` vertices.
    struct Geometry {
        indices: Vec<u32>,
        positions: Vec<[f32; 3]>,
        transforms: Vec<u32>,
        textures: Vec<u32>,
        uvs: Vec<[f32; 2]>,
        normals: Vec<[f32; 3]>,
    }

    impl Geometry {
        fn new(vertices: usize, indices: Vec<u32>, tag: f32) -> Self {
            Self {
                indices,
                positions: (0..vertices).map(|i| [tag, i as f32, 0.0]).collect(),
                transforms: vec![0; vertices],
                textures: vec![0; vertices],
                uvs: vec![[0.5, 0.5]; vertices],
                normals: vec![[0.0, 0.0, 1.0]; vertices],
            }
        }

        fn quad(tag: f32) -> Self {
            Self::new(4, vec![0, 1, 2, 2, 3, 0], tag)
        }

        fn submission(&self) -> Submission<'_> {
            Submission {
                indices: &self.indices,
                positions: &self.positions,
                transform_indices: &self.transforms,
                packed_texture_indices: &self.textures,
                uvs: &self.uvs,
                normals: &self.normals,
            }
        }
    }

    fn batch() -> DrawBatch {
        DrawBatch::new(VARIANT, 16)
    }

    fn all_indices_in_range(batch: &DrawBatch) -> bool {
        batch
            .indices()
            .iter()
            .all(|&i| (i as usize) < batch.vertex_count())
    }

    // ── merging ───────────────────────────────────────────────────────────

    #[test]
    fn two_quads_merge_with_offset_indices() {
        let mut b = batch();
        b.queue_draw(1, &Geometry::quad(1.0).submission()).unwrap();
        b.queue_draw(2, &Geometry::quad(2.0).submission()).unwrap();

        assert_eq!(b.vertex_count(), 8);
        assert_eq!(b.index_count(), 12);
        assert_eq!(&b.indices()[..6], &[0, 1, 2, 2, 3, 0]);
        assert_eq!(&b.indices()[6..], &[4, 5, 6, 6, 7, 4]);
    }

    #[test]
    fn queue_draw_records_object_ranges() {
        let mut b = batch();
        b.queue_draw(7, &Geometry::quad(0.0).submission()).unwrap();
        let range = b.queue_draw(9, &Geometry::quad(1.0).submission()).unwrap();

        assert_eq!(range, ObjectRange { vertices: 4..8, indices: 6..12 });
        assert_eq!(b.object_range(9), Some(&range));
        assert_eq!(b.object_range(7).map(|r| r.vertices.clone()), Some(0..4));
        assert_eq!(b.object_range(8), None);
    }

    #[test]
    fn attributes_are_interleaved_per_vertex() {
        let mut g = Geometry::quad(3.0);
        g.transforms = vec![1, 2, 3, 4];
        g.textures = vec![0, 0, 1, 1];
        g.uvs[2] = [0.25, 0.75];

        let mut b = batch();
        b.queue_draw(0, &g.submission()).unwrap();

        let v = b.vertices()[2];
        assert_eq!(v.position, [3.0, 2.0, 0.0]);
        assert_eq!(v.uv, [0.25, 0.75]);
        assert_eq!(v.transform_index, 3);
        assert_eq!(v.packed_texture_index, 1);
    }

    #[test]
    fn empty_batch_has_nothing_to_draw() {
        let mut b = batch();
        assert!(b.is_empty());

        // Vertices without indices still draw nothing.
        b.queue_draw(0, &Geometry::new(3, vec![], 0.0).submission()).unwrap();
        assert!(b.is_empty());
        assert_eq!(b.vertex_count(), 3);
    }

    #[test]
    fn indices_stay_in_range_for_arbitrary_sequences() {
        // Small LCG keeps the sequence deterministic.
        let mut seed: u32 = 0x2545_f491;
        let mut next = move |bound: u32| {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (seed >> 8) % bound
        };

        let mut b = batch();
        for object in 0..64 {
            let vertices = 1 + next(12) as usize;
            let indices = (0..next(30)).map(|_| next(vertices as u32)).collect();
            let g = Geometry::new(vertices, indices, object as f32);
            b.queue_draw(object, &g.submission()).unwrap();

            if next(4) == 0 {
                b.remove(next(object + 1));
            }
            assert!(all_indices_in_range(&b), "after object {object}");
        }
    }

    // ── rejection ─────────────────────────────────────────────────────────

    #[test]
    fn inconsistent_lengths_are_rejected_without_side_effects() {
        let mut b = batch();
        b.queue_draw(1, &Geometry::quad(1.0).submission()).unwrap();

        let mut bad = Geometry::quad(2.0);
        bad.normals.pop();
        let err = b.queue_draw(2, &bad.submission()).unwrap_err();

        assert_eq!(
            err,
            BatchError::InconsistentAttributeLength {
                object: 2,
                attribute: "normals",
                expected: 4,
                found: 3,
            }
        );
        assert_eq!(b.vertex_count(), 4);
        assert_eq!(b.index_count(), 6);
        assert_eq!(b.object_range(2), None);

        // The batch keeps accepting well-formed objects.
        let range = b.queue_draw(3, &Geometry::quad(3.0).submission()).unwrap();
        assert_eq!(range.vertices, 4..8);
        assert!(all_indices_in_range(&b));
    }

    #[test]
    fn local_index_past_vertex_count_is_rejected() {
        let mut b = batch();
        let g = Geometry::new(3, vec![0, 1, 3], 0.0);
        assert_eq!(
            b.queue_draw(0, &g.submission()),
            Err(BatchError::IndexOutOfRange { object: 0, index: 3, vertex_count: 3 })
        );
        assert_eq!(b.vertex_count(), 0);
    }

    #[test]
    fn transform_index_past_capacity_is_rejected() {
        let mut b = batch();
        let mut g = Geometry::quad(0.0);
        g.transforms[1] = 16;
        assert_eq!(
            b.queue_draw(0, &g.submission()),
            Err(BatchError::TransformIndexOutOfRange { object: 0, index: 16, capacity: 16 })
        );
    }

    #[test]
    fn duplicate_object_is_rejected() {
        let mut b = batch();
        b.queue_draw(5, &Geometry::quad(0.0).submission()).unwrap();
        assert_eq!(
            b.queue_draw(5, &Geometry::quad(1.0).submission()),
            Err(BatchError::DuplicateObject { object: 5, variant: VARIANT })
        );
        assert_eq!(b.object_count(), 1);
    }

    #[test]
    fn shifted_transform_indices_must_stay_in_table() {
        let mut b = batch();
        let low = Geometry::quad(0.0);
        let mut high = Geometry::quad(1.0);
        high.transforms = vec![0, 15, 15, 0];
        b.queue_draw(1, &low.submission()).unwrap();
        b.queue_draw(2, &high.submission()).unwrap();

        assert!(b.reject_shifted_transforms(0).is_empty());
        assert_eq!(
            b.reject_shifted_transforms(1),
            vec![BatchError::ShiftedTransformOutOfRange {
                object: 2,
                index: 15,
                offset: 1,
                capacity: 16,
            }]
        );
        assert_eq!(b.object_count(), 1);
        assert_eq!(b.vertex_count(), 4);
        assert!(all_indices_in_range(&b));

        let errors = b.reject_shifted_transforms(-1);
        assert!(matches!(
            errors.as_slice(),
            [BatchError::ShiftedTransformOutOfRange { object: 1, index: 0, offset: -1, .. }]
        ));
        assert!(b.is_empty());
    }

    // ── remove / clear ────────────────────────────────────────────────────

    #[test]
    fn remove_rebases_later_objects() {
        let mut b = batch();
        b.queue_draw(1, &Geometry::quad(1.0).submission()).unwrap();
        b.queue_draw(2, &Geometry::new(3, vec![0, 1, 2], 2.0).submission()).unwrap();
        b.queue_draw(3, &Geometry::quad(3.0).submission()).unwrap();

        let removed = b.remove(2).unwrap();
        assert_eq!(removed, ObjectRange { vertices: 4..7, indices: 6..9 });

        assert_eq!(b.vertex_count(), 8);
        assert_eq!(&b.indices()[6..], &[4, 5, 6, 6, 7, 4]);
        assert_eq!(b.vertices()[4].position, [3.0, 0.0, 0.0]);
        assert_eq!(
            b.object_range(3),
            Some(&ObjectRange { vertices: 4..8, indices: 6..12 })
        );
        assert_eq!(b.object_range(1).map(|r| r.indices.clone()), Some(0..6));
        assert_eq!(b.remove(2), None);
    }

    #[test]
    fn clear_forgets_objects() {
        let mut b = batch();
        b.queue_draw(1, &Geometry::quad(1.0).submission()).unwrap();
        b.clear();

        assert!(b.is_empty());
        assert_eq!(b.vertex_count(), 0);
        assert_eq!(b.object_range(1), None);
        // The id can be queued again in the next frame.
        assert!(b.queue_draw(1, &Geometry::quad(1.0).submission()).is_ok());
    }
}
