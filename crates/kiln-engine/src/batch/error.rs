use std::fmt;

use crate::shader::ShaderVariant;

use super::ObjectId;

/// Rejected `queue_draw` submission.
///
/// Apart from `UnknownVariant`, the object's contribution is dropped and the
/// batch is left as it was before the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    /// An attribute array's length differs from the position count.
    InconsistentAttributeLength {
        object: ObjectId,
        attribute: &'static str,
        expected: usize,
        found: usize,
    },
    /// A local index does not address one of the object's vertices.
    IndexOutOfRange {
        object: ObjectId,
        index: u32,
        vertex_count: usize,
    },
    /// A per-vertex transform index is past the transform table.
    TransformIndexOutOfRange {
        object: ObjectId,
        index: u32,
        capacity: usize,
    },
    /// A transform index, shifted by the program's transform-table offset,
    /// leaves the table.
    ShiftedTransformOutOfRange {
        object: ObjectId,
        index: u32,
        offset: i32,
        capacity: usize,
    },
    /// The id is already queued in this variant's batch.
    DuplicateObject { object: ObjectId, variant: ShaderVariant },
    /// The merged batch would no longer be addressable with `u32` indices.
    VertexLimitExceeded { object: ObjectId, vertices: usize },
    /// No batch exists for the variant (it was not requested from the cache).
    UnknownVariant(ShaderVariant),
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchError::InconsistentAttributeLength {
                object,
                attribute,
                expected,
                found,
            } => write!(
                f,
                "object {object}: inconsistent attribute length: {attribute} has {found} entries, expected {expected}"
            ),
            BatchError::IndexOutOfRange {
                object,
                index,
                vertex_count,
            } => write!(
                f,
                "object {object}: index {index} out of range for {vertex_count} vertices"
            ),
            BatchError::TransformIndexOutOfRange {
                object,
                index,
                capacity,
            } => write!(
                f,
                "object {object}: transform index {index} out of range for table of {capacity}"
            ),
            BatchError::ShiftedTransformOutOfRange {
                object,
                index,
                offset,
                capacity,
            } => write!(
                f,
                "object {object}: transform index {index} with table offset {offset} out of range for table of {capacity}"
            ),
            BatchError::DuplicateObject { object, variant } => {
                write!(f, "object {object} already queued for {variant}")
            }
            BatchError::VertexLimitExceeded { object, vertices } => write!(
                f,
                "object {object}: batch would hold {vertices} vertices, more than u32 indices can address"
            ),
            BatchError::UnknownVariant(variant) => write!(f, "no batch for shader variant {variant}"),
        }
    }
}

impl std::error::Error for BatchError {}
