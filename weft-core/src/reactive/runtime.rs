//! Reactive Runtime
//!
//! The runtime is the arena that connects subjects and computations. It
//! owns no computation: the registry maps ids to weak handles, and each
//! subject's subscriber list holds computation ids. Teardown is therefore a
//! simple index-based sweep.
//!
//! # How It Works
//!
//! 1. When a computation is created, it registers a weak handle here.
//!
//! 2. When a computation reads a subject during evaluation, the subject asks
//!    the current target to record the dependency, which in turn subscribes
//!    it here (once per subject).
//!
//! 3. When a subject notifies, the runtime snapshots its subscriber list and
//!    invalidates every computation that is still alive.
//!
//! # Thread Model
//!
//! All state is thread-local. The engine is single-threaded and
//! callback-driven, so a `RefCell` is enough; no borrow is ever held while
//! user code runs.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;
use tracing::trace;

use super::context::EvaluationContext;
use super::subscriber::{ComputationId, Reactive};
use super::SubjectId;

thread_local! {
    static RUNTIME: RefCell<RuntimeState> = RefCell::new(RuntimeState::default());
}

#[derive(Default)]
struct RuntimeState {
    /// Registered computations, by id.
    registry: HashMap<ComputationId, Weak<dyn Reactive>>,

    /// Ordered subscriber list per subject.
    subscribers: HashMap<SubjectId, SmallVec<[ComputationId; 4]>>,
}

/// Run `f` against the runtime. Returns `None` while the thread is shutting
/// down, which only happens from destructors.
fn with_state<R>(f: impl FnOnce(&mut RuntimeState) -> R) -> Option<R> {
    RUNTIME
        .try_with(|rt| rt.try_borrow_mut().ok().map(|mut state| f(&mut state)))
        .ok()
        .flatten()
}

/// Entry points into the per-thread reactive runtime.
pub struct Runtime;

impl Runtime {
    /// Register a subscriber so subjects can resolve its id.
    pub fn register(id: ComputationId, reactive: Weak<dyn Reactive>) {
        with_state(|rt| rt.registry.insert(id, reactive));
    }

    /// Remove a subscriber from the registry and from every subject.
    pub fn unregister(id: ComputationId) {
        with_state(|rt| {
            rt.registry.remove(&id);
            for subs in rt.subscribers.values_mut() {
                subs.retain(|s| *s != id);
            }
        });
    }

    /// Look up a live subscriber.
    pub fn resolve(id: ComputationId) -> Option<Rc<dyn Reactive>> {
        with_state(|rt| rt.registry.get(&id).and_then(Weak::upgrade)).flatten()
    }

    /// Append `id` to the subject's subscribers unless already present.
    ///
    /// Returns whether the subscriber was added.
    pub fn subscribe(subject: SubjectId, id: ComputationId) -> bool {
        let added = with_state(|rt| {
            let subs = rt.subscribers.entry(subject).or_default();
            if subs.contains(&id) {
                false
            } else {
                subs.push(id);
                true
            }
        })
        .unwrap_or(false);

        if added {
            trace!(?subject, computation = ?id, "subscribed");
        }
        added
    }

    /// Remove `id` from the subject's subscribers. No-op if absent.
    pub fn unsubscribe(subject: SubjectId, id: ComputationId) {
        let removed = with_state(|rt| match rt.subscribers.get_mut(&subject) {
            Some(subs) => {
                let before = subs.len();
                subs.retain(|s| *s != id);
                before != subs.len()
            }
            None => false,
        })
        .unwrap_or(false);

        if removed {
            trace!(?subject, computation = ?id, "unsubscribed");
        }
    }

    /// Snapshot of a subject's subscribers, in subscription order.
    pub fn subscribers(subject: SubjectId) -> Vec<ComputationId> {
        with_state(|rt| {
            rt.subscribers
                .get(&subject)
                .map(|subs| subs.to_vec())
                .unwrap_or_default()
        })
        .unwrap_or_default()
    }

    /// Number of subscribers a subject currently has.
    pub fn subscriber_count(subject: SubjectId) -> usize {
        with_state(|rt| rt.subscribers.get(&subject).map_or(0, |subs| subs.len())).unwrap_or(0)
    }

    /// Forget a subject whose owner is gone.
    pub fn release_subject(subject: SubjectId) {
        with_state(|rt| rt.subscribers.remove(&subject));
    }

    /// Invalidate every subscriber of `subject`.
    ///
    /// Iterates a snapshot: invalidation may re-enter evaluation and add or
    /// remove subscribers of this same subject.
    pub fn notify(subject: SubjectId) {
        for id in Self::subscribers(subject) {
            if let Some(reactive) = Self::resolve(id) {
                reactive.invalidate();
            }
        }
    }

    /// Register `subject` as a dependency of the current evaluation, if any.
    pub fn depend(subject: SubjectId) {
        if let Some(target) = EvaluationContext::current_target() {
            if let Some(reactive) = Self::resolve(target) {
                reactive.add_dependency(subject);
            }
        }
    }

    /// Get the computation currently being evaluated, if any.
    pub fn current_target() -> Option<ComputationId> {
        EvaluationContext::current_target()
    }

    /// Check if we're inside a tracked evaluation.
    pub fn is_tracking() -> bool {
        EvaluationContext::is_tracking()
    }
}
