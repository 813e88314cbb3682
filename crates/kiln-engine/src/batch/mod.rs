//! Per-variant geometry batching.
//!
//! Objects are queued into the batch of the variant that draws them; a flush
//! then costs one upload and one draw per non-empty variant, regardless of how
//! many objects were queued.

mod batcher;
mod draw_batch;
mod error;

pub use batcher::{Batcher, FlushStats};
pub use draw_batch::{DrawBatch, ObjectId, ObjectRange, Submission};
pub use error::BatchError;
