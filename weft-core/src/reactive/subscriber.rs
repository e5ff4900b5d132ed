//! The subscriber side of the reactive system.
//!
//! A subscriber is anything a [`Subject`](super::Subject) can invalidate.
//! In practice that is a [`Computation`](super::Computation), but the seam is
//! a trait so the runtime only ever holds weak, type-erased handles.

use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::SubjectId;

/// Unique identifier for a computation.
///
/// Ids are handed out in creation order and never reused. The scheduler
/// relies on that order: a computation created inside another computation's
/// scope always has the larger id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComputationId(u64);

impl ComputationId {
    /// Generate the next computation id.
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw id value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// A subscriber to reactive subjects.
pub trait Reactive {
    /// The id under which this subscriber is registered.
    fn computation_id(&self) -> ComputationId;

    /// Record that the current evaluation read `subject`.
    fn add_dependency(&self, subject: SubjectId);

    /// One of the subjects this subscriber reads has changed.
    fn invalidate(self: Rc<Self>);
}
