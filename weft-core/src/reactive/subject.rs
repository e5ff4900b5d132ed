//! Subject Implementation
//!
//! A Subject is the per-slot broadcast list behind every reactive property,
//! every observed container's shape, and every derived computation's result.
//!
//! # How Subjects Work
//!
//! 1. When a reactive slot is read inside an evaluation, the slot calls
//!    [`Subject::depend`], which asks the current computation to record the
//!    dependency. The computation subscribes itself at most once.
//!
//! 2. When the slot changes, [`Subject::notify`] invalidates every
//!    subscriber, in subscription order, over a snapshot of the list.
//!
//! A `Subject` value owns its entry in the runtime; dropping it releases the
//! subscriber list. Computations only ever refer to it by [`SubjectId`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use super::runtime::Runtime;
use super::ComputationId;

/// Unique identifier for a subject, in creation order, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubjectId(u64);

impl SubjectId {
    /// Generate the next subject id.
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw id value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// A broadcast list of subscriber computations.
pub struct Subject {
    id: SubjectId,
}

impl Subject {
    /// Create a subject with no subscribers.
    pub fn new() -> Self {
        Self {
            id: SubjectId::next(),
        }
    }

    /// Get the subject's unique id.
    pub fn id(&self) -> SubjectId {
        self.id
    }

    /// Append a subscriber. No-op if it is already subscribed.
    pub fn subscribe(&self, subscriber: ComputationId) {
        Runtime::subscribe(self.id, subscriber);
    }

    /// Remove a subscriber. No-op if absent.
    pub fn unsubscribe(&self, subscriber: ComputationId) {
        Runtime::unsubscribe(self.id, subscriber);
    }

    /// Invalidate every current subscriber.
    pub fn notify(&self) {
        Runtime::notify(self.id);
    }

    /// Subscribe the currently evaluating computation, if there is one.
    pub fn depend(&self) {
        Runtime::depend(self.id);
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        Runtime::subscriber_count(self.id)
    }

    /// Snapshot of the subscriber list.
    pub fn subscribers(&self) -> Vec<ComputationId> {
        Runtime::subscribers(self.id)
    }
}

impl Default for Subject {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Subject {
    fn drop(&mut self) {
        Runtime::release_subject(self.id);
    }
}

impl fmt::Debug for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subject")
            .field("id", &self.id)
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
