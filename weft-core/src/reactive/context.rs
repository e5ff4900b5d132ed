//! Evaluation Context
//!
//! The evaluation context tracks which computation is currently running.
//! This enables implicit subscription: when a reactive property is read, the
//! subject behind it can register the current computation as a subscriber.
//!
//! # Implementation
//!
//! We use a thread-local stack. Entering an evaluation pushes the
//! computation's id; the returned guard pops it again, even on panic. A
//! computation evaluated inside another computation's evaluation (a derived
//! value read while rendering, say) therefore restores the outer target on
//! completion.
//!
//! Pushing `None` is valid and suspends tracking, which is how
//! [`untracked`] reads without subscribing.

use std::cell::RefCell;

use super::ComputationId;

thread_local! {
    static TARGET_STACK: RefCell<Vec<Option<ComputationId>>> = const { RefCell::new(Vec::new()) };
}

/// Guard that pops the evaluation target when dropped.
pub struct EvaluationContext {
    target: Option<ComputationId>,
}

impl EvaluationContext {
    /// Make `target` the currently evaluating computation until the guard
    /// is dropped.
    pub fn enter(target: Option<ComputationId>) -> Self {
        TARGET_STACK.with(|stack| stack.borrow_mut().push(target));
        Self { target }
    }

    /// The computation currently being evaluated, if tracking is on.
    pub fn current_target() -> Option<ComputationId> {
        TARGET_STACK.with(|stack| stack.borrow().last().copied().flatten())
    }

    /// Whether reads are currently being tracked.
    pub fn is_tracking() -> bool {
        Self::current_target().is_some()
    }

    /// Depth of the evaluation stack, counting suspended entries.
    pub fn depth() -> usize {
        TARGET_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for EvaluationContext {
    fn drop(&mut self) {
        let _ = TARGET_STACK.try_with(|stack| {
            let popped = stack.borrow_mut().pop();

            // Verify we're popping the right context.
            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry, self.target,
                    "EvaluationContext mismatch: expected {:?}, got {:?}",
                    self.target, entry
                );
            }
        });
    }
}

/// Run `f` without subscribing the current computation to anything it reads.
pub fn untracked<T>(f: impl FnOnce() -> T) -> T {
    let _ctx = EvaluationContext::enter(None);
    f()
}
