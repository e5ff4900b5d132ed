//! Reactive Primitives
//!
//! This module implements the dependency-tracking core: subjects,
//! computations, and the context that connects them.
//!
//! # Concepts
//!
//! ## Subjects
//!
//! A [`Subject`] is a broadcast list attached to something observable: one
//! per reactive property, one per observed container's shape, and one per
//! derived value. Reading the slot inside an evaluation subscribes the
//! evaluating computation; changing it invalidates every subscriber.
//!
//! ## Computations
//!
//! A [`Computation`] runs an evaluation function, records which subjects it
//! read, and re-runs when any of them changes. Depending on its options it
//! is a render-style loop, an explicit watch with a `(new, old)` callback, or
//! a lazily evaluated derived value.
//!
//! # Implementation Notes
//!
//! Tracking uses a thread-local stack of evaluation targets. A read checks
//! the top of the stack and, if a computation is there, records the
//! dependency. [`untracked`] pushes an empty frame so reads inside it are
//! invisible.

mod computation;
mod context;
mod path;
mod runtime;
mod subject;
mod subscriber;
mod traverse;

pub use computation::{
    BeforeHook, Callback, Computation, ComputationBuilder, ComputationOptions, EvalFn,
};
pub use context::{untracked, EvaluationContext};
pub use runtime::Runtime;
pub use subject::{Subject, SubjectId};
pub use subscriber::{ComputationId, Reactive};
pub use traverse::traverse;
