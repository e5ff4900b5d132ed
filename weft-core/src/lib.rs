//! Weft Core
//!
//! This crate provides the core runtime for the Weft fine-grained
//! reactivity engine. It implements:
//!
//! - Observable state: plain objects and arrays made reactive in place
//! - Automatic dependency tracking with per-run pruning
//! - Derived values that recompute only on demand
//! - A batching scheduler that re-runs invalidated work once per tick, in
//!   creation order
//!
//! The engine is single-threaded: all runtime state is thread-local, and
//! values are shared with `Rc`.
//!
//! # Architecture
//!
//! - `data`: dynamically typed values, objects, and the observed array
//! - `observer`: making values reactive, and adding/removing keys later
//! - `reactive`: subjects, computations, and the evaluation context
//! - `scheduler`: the flush queue and the deferred-callback facility
//! - `snapshot`: untracked conversion of state to JSON or MessagePack
//!
//! # Example
//!
//! ```rust
//! use weft_core::{observe, Computation, Object, Value};
//! use weft_core::scheduler::LocalQueue;
//!
//! let state: Object = [("a", 1), ("b", 2)].into_iter().collect();
//! observe(&Value::from(state.clone()), false);
//!
//! let reader = state.clone();
//! let sum = Computation::watch(
//!     move || {
//!         let a = reader.get("a").as_f64().unwrap_or(0.0);
//!         let b = reader.get("b").as_f64().unwrap_or(0.0);
//!         Ok(Value::from(a + b))
//!     },
//!     |new, old| {
//!         println!("sum: {old} -> {new}");
//!         Ok(())
//!     },
//! )
//! .unwrap();
//!
//! state.set("a", 5);
//! state.set("b", 10);
//! // One flush, one callback: "sum: 3 -> 15".
//! LocalQueue::run_pending();
//! assert_eq!(sum.value(), Value::from(15));
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod observer;
pub mod reactive;
pub mod scheduler;
pub mod snapshot;

pub use config::Config;
pub use data::{Array, Key, Object, ObjectKind, PropertyFlags, Value};
pub use error::{Error, ErrorContext, Result};
pub use observer::{del, observe, set, toggle_observing, Observer};
pub use reactive::{untracked, Computation, ComputationOptions, Subject};
pub use scheduler::{next_tick, tick};
