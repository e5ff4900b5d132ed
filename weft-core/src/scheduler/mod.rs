//! Batching Scheduler
//!
//! Invalidated computations are not re-run on the spot. They are queued,
//! and the first enqueue of a batch asks the deferred-callback facility for
//! one flush. Everything invalidated synchronously after that joins the
//! same batch.
//!
//! # Ordering
//!
//! A flush runs computations in ascending id order. Ids follow creation
//! order, so a computation created in an outer scope always re-runs before
//! the ones nested inside it.

mod queue;
mod tick;

pub(crate) use queue::enqueue;
pub use queue::{flush, is_flushing, pending_count};
pub use tick::{
    flush_callbacks, next_tick, set_deferrer, tick, Deferrer, LocalQueue, Task, TokioLocal,
};
