//! Transform table shared by every batched vertex.
//!
//! Each vertex carries an index into this table; the shader multiplies the
//! vertex position by the matrix at that slot. The table is owned by the
//! application and uploaded through the backend; the batcher only validates
//! indices against its capacity.

use std::fmt;

use glam::Mat4;

/// Default number of slots. 1024 `mat4x4<f32>` fill exactly 64 KiB, the
/// default wgpu uniform binding limit.
pub const DEFAULT_TRANSFORM_TABLE_CAPACITY: usize = 1024;

/// Index of a slot in a [`TransformTable`].
pub type TransformIndex = u32;

/// Errors reported by [`TransformTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformError {
    /// `push` on a full table.
    CapacityExceeded { capacity: usize },
    /// `set` past the end of the table.
    OutOfRange { index: TransformIndex, capacity: usize },
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapacityExceeded { capacity } => {
                write!(f, "transform table is full ({capacity} slots)")
            }
            Self::OutOfRange { index, capacity } => {
                write!(f, "transform index {index} is outside the table ({capacity} slots)")
            }
        }
    }
}

impl std::error::Error for TransformError {}

/// Fixed-capacity array of local-to-world matrices.
///
/// All slots start as identity. `push` hands out slots in order and refuses
/// to wrap around once the table is full.
#[derive(Debug, Clone)]
pub struct TransformTable {
    matrices: Vec<Mat4>,
    len: usize,
}

impl TransformTable {
    /// Creates a table with `capacity` identity slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            matrices: vec![Mat4::IDENTITY; capacity],
            len: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.matrices.len()
    }

    /// Number of slots handed out by [`push`](Self::push).
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Registers a new object transform and returns its slot.
    pub fn push(&mut self, matrix: Mat4) -> Result<TransformIndex, TransformError> {
        if self.len >= self.matrices.len() {
            return Err(TransformError::CapacityExceeded {
                capacity: self.matrices.len(),
            });
        }
        let index = self.len;
        self.matrices[index] = matrix;
        self.len += 1;
        Ok(index as TransformIndex)
    }

    /// Overwrites an existing slot.
    pub fn set(&mut self, index: TransformIndex, matrix: Mat4) -> Result<(), TransformError> {
        let capacity = self.matrices.len();
        let slot = self
            .matrices
            .get_mut(index as usize)
            .ok_or(TransformError::OutOfRange { index, capacity })?;
        *slot = matrix;
        Ok(())
    }

    #[inline]
    pub fn get(&self, index: TransformIndex) -> Option<Mat4> {
        self.matrices.get(index as usize).copied()
    }

    /// All slots, including unused identity slots, in upload order.
    #[inline]
    pub fn matrices(&self) -> &[Mat4] {
        &self.matrices
    }
}

impl Default for TransformTable {
    fn default() -> Self {
        Self::new(DEFAULT_TRANSFORM_TABLE_CAPACITY)
    }
}
