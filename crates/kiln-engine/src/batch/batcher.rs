use crate::render::GpuBackend;
use crate::shader::{ShaderCache, ShaderVariant, UniformKey, UniformValue};

use super::draw_batch::{DrawBatch, ObjectId, ObjectRange, Submission};
use super::error::BatchError;

/// What one `draw_everything` call submitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub draws: usize,
    pub vertices: usize,
    pub indices: usize,
}

/// One [`DrawBatch`] per shader variant of a cache.
///
/// Geometry does not persist: every flush clears all batches, so each frame
/// re-queues what it wants drawn.
#[derive(Debug)]
pub struct Batcher {
    batches: Vec<DrawBatch>,
}

impl Batcher {
    /// Creates an empty batch for every variant in `cache`, in cache order.
    pub fn new<B: GpuBackend>(cache: &ShaderCache<B>) -> Self {
        let capacity = cache.backend().transform_table_capacity();
        Self {
            batches: cache
                .variants()
                .map(|variant| DrawBatch::new(variant, capacity))
                .collect(),
        }
    }

    pub fn batch(&self, variant: ShaderVariant) -> Option<&DrawBatch> {
        self.batches.iter().find(|b| b.variant() == variant)
    }

    pub fn batch_mut(&mut self, variant: ShaderVariant) -> Option<&mut DrawBatch> {
        self.batches.iter_mut().find(|b| b.variant() == variant)
    }

    /// Batches in flush order.
    pub fn batches(&self) -> &[DrawBatch] {
        &self.batches
    }

    /// Appends one object to `variant`'s batch. See [`DrawBatch::queue_draw`].
    pub fn queue_draw(
        &mut self,
        variant: ShaderVariant,
        object: ObjectId,
        submission: &Submission<'_>,
    ) -> Result<ObjectRange, BatchError> {
        self.batch_mut(variant)
            .ok_or(BatchError::UnknownVariant(variant))?
            .queue_draw(object, submission)
    }

    pub fn object_range(&self, variant: ShaderVariant, object: ObjectId) -> Option<&ObjectRange> {
        self.batch(variant)?.object_range(object)
    }

    pub fn remove(&mut self, variant: ShaderVariant, object: ObjectId) -> Option<ObjectRange> {
        self.batch_mut(variant)?.remove(object)
    }

    pub fn clear(&mut self) {
        self.batches.iter_mut().for_each(DrawBatch::clear);
    }

    /// Uploads and draws every non-empty batch, then clears them all.
    ///
    /// Per non-empty batch: bind its program, upload the merged buffers once,
    /// issue one indexed draw over all of them. Empty batches cost nothing.
    pub fn draw_everything<B: GpuBackend>(&mut self, cache: &mut ShaderCache<B>) -> FlushStats {
        let mut stats = FlushStats::default();

        for batch in &mut self.batches {
            let variant = batch.variant();
            let offset = match cache.uniform(variant, UniformKey::TransformTableOffset) {
                Some(UniformValue::Int(offset)) => offset,
                _ => 0,
            };
            for err in batch.reject_shifted_transforms(offset) {
                log::warn!("{variant}: dropping submission: {err}");
            }

            if batch.is_empty() {
                continue;
            }

            let handle = match cache.get_program(variant) {
                Ok(program) => program.handle(),
                Err(err) => {
                    log::error!("draw_everything: {err}; dropping {} objects", batch.object_count());
                    continue;
                }
            };
            if let Err(err) = cache.use_program(variant) {
                log::error!("draw_everything: {err}");
                continue;
            }

            let backend = cache.backend_mut();
            backend.upload_geometry(handle, batch.vertices(), batch.indices());
            backend.draw_indexed(handle, batch.index_count() as u32);

            stats.draws += 1;
            stats.vertices += batch.vertex_count();
            stats.indices += batch.index_count();
        }

        self.clear();
        log::trace!(
            "flushed {} draws ({} vertices, {} indices)",
            stats.draws,
            stats.vertices,
            stats.indices
        );
        stats
    }
}
