//! Computation Implementation
//!
//! A Computation wraps an evaluation function and re-discovers what it
//! depends on every time it runs.
//!
//! # How Computations Work
//!
//! 1. [`Computation::evaluate`] makes the computation the current evaluation
//!    target, runs the function, and records every subject read along the way
//!    in a scratch set.
//!
//! 2. After the run, subjects read last time but not this time are
//!    unsubscribed from. Dependencies are never sticky, which is what makes
//!    conditional reads behave.
//!
//! 3. When a subject it reads changes, [`Computation::invalidate`] picks one
//!    of three disciplines:
//!    - lazy (derived values): mark dirty and tell our own subscribers;
//!    - sync: re-run right now;
//!    - otherwise: hand ourselves to the batching scheduler.
//!
//! # Derived Values
//!
//! A lazy computation owns a [`Subject`] of its own. Readers subscribe to that
//! subject instead of to the upstream dependencies, so a chain of derived
//! values invalidates transitively without recomputing any link. With no
//! readers, invalidation only marks it dirty; the next [`Computation::get`]
//! recomputes.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;
use tracing::debug;

use super::context::EvaluationContext;
use super::path;
use super::runtime::Runtime;
use super::subscriber::{ComputationId, Reactive};
use super::traverse::traverse;
use super::{Subject, SubjectId};
use crate::error::{report_error, ErrorContext, Result};
use crate::scheduler;
use crate::Value;

/// An evaluation function.
pub type EvalFn = dyn Fn() -> Result<Value>;

/// A reaction callback, invoked with `(new, old)`.
pub type Callback = dyn Fn(&Value, &Value) -> Result<()>;

/// Hook run by the scheduler right before a queued computation re-runs.
pub type BeforeHook = dyn Fn();

/// Options recognised by [`ComputationBuilder`].
#[derive(Clone, Default)]
pub struct ComputationOptions {
    /// Walk the result so every nested reactive slot becomes a dependency.
    pub deep: bool,
    /// The function and callback are caller code; their failures are
    /// reported instead of propagated.
    pub user: bool,
    /// Derived value: evaluate on demand only.
    pub lazy: bool,
    /// Re-run synchronously on invalidation, bypassing the scheduler.
    pub sync: bool,
    /// Invoke the callback once at creation with `(value, Undefined)`.
    pub immediate: bool,
    pub before: Option<Rc<BeforeHook>>,
}

impl fmt::Debug for ComputationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputationOptions")
            .field("deep", &self.deep)
            .field("user", &self.user)
            .field("lazy", &self.lazy)
            .field("sync", &self.sync)
            .field("immediate", &self.immediate)
            .field("before", &self.before.is_some())
            .finish()
    }
}

enum Getter {
    Function(Rc<EvalFn>),
    Path { root: Value, segments: Vec<String> },
}

impl Getter {
    fn call(&self) -> Result<Value> {
        match self {
            Getter::Function(f) => f(),
            Getter::Path { root, segments } => Ok(path::resolve(root, segments)),
        }
    }
}

/// Dependency bookkeeping. `deps`/`dep_ids` hold the previous run's set,
/// `new_deps`/`new_dep_ids` the set being discovered by the current run.
#[derive(Default)]
struct Tracking {
    value: Value,
    deps: SmallVec<[SubjectId; 8]>,
    dep_ids: HashSet<SubjectId>,
    new_deps: SmallVec<[SubjectId; 8]>,
    new_dep_ids: HashSet<SubjectId>,
    active: bool,
    dirty: bool,
}

struct ComputationInner {
    id: ComputationId,
    expression: String,
    getter: Getter,
    callback: Option<Rc<Callback>>,
    options: ComputationOptions,
    /// Present only on lazy computations.
    subject: Option<Subject>,
    evaluating: Cell<bool>,
    tracking: RefCell<Tracking>,
}

impl Reactive for ComputationInner {
    fn computation_id(&self) -> ComputationId {
        self.id
    }

    fn add_dependency(&self, subject: SubjectId) {
        let subscribe = {
            let mut tracking = self.tracking.borrow_mut();
            if !tracking.active || !tracking.new_dep_ids.insert(subject) {
                false
            } else {
                tracking.new_deps.push(subject);
                !tracking.dep_ids.contains(&subject)
            }
        };

        if subscribe {
            Runtime::subscribe(subject, self.id);
        }
    }

    fn invalidate(self: Rc<Self>) {
        Computation { inner: self }.invalidate();
    }
}

impl Drop for ComputationInner {
    fn drop(&mut self) {
        let tracking = self.tracking.get_mut();
        for subject in tracking.deps.iter().chain(tracking.new_deps.iter()) {
            Runtime::unsubscribe(*subject, self.id);
        }
        Runtime::unregister(self.id);
    }
}

/// A tracked, re-runnable unit of work.
///
/// Cloning yields another handle to the same computation. When the last
/// handle is dropped the computation is torn down.
#[derive(Clone)]
pub struct Computation {
    inner: Rc<ComputationInner>,
}

/// Builder for [`Computation`].
pub struct ComputationBuilder {
    getter: Result<Getter>,
    expression: Option<String>,
    callback: Option<Rc<Callback>>,
    options: ComputationOptions,
}

impl ComputationBuilder {
    fn new(getter: Result<Getter>, expression: Option<String>) -> Self {
        Self {
            getter,
            expression,
            callback: None,
            options: ComputationOptions::default(),
        }
    }

    /// Set the reaction callback.
    pub fn callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Value, &Value) -> Result<()> + 'static,
    {
        self.callback = Some(Rc::new(callback));
        self
    }

    /// Replace all options at once.
    pub fn options(mut self, options: ComputationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn deep(mut self, deep: bool) -> Self {
        self.options.deep = deep;
        self
    }

    pub fn user(mut self, user: bool) -> Self {
        self.options.user = user;
        self
    }

    pub fn lazy(mut self, lazy: bool) -> Self {
        self.options.lazy = lazy;
        self
    }

    pub fn sync(mut self, sync: bool) -> Self {
        self.options.sync = sync;
        self
    }

    pub fn immediate(mut self, immediate: bool) -> Self {
        self.options.immediate = immediate;
        self
    }

    pub fn before<F>(mut self, hook: F) -> Self
    where
        F: Fn() + 'static,
    {
        self.options.before = Some(Rc::new(hook));
        self
    }

    /// Label used in diagnostics.
    pub fn expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = Some(expression.into());
        self
    }

    /// Create the computation. Unless lazy, it evaluates once right away;
    /// an internal evaluation failure is returned here.
    pub fn build(self) -> Result<Computation> {
        let getter = self.getter?;
        let id = ComputationId::next();
        let lazy = self.options.lazy;

        let inner = Rc::new(ComputationInner {
            id,
            expression: self
                .expression
                .unwrap_or_else(|| format!("computation#{}", id.raw())),
            getter,
            callback: self.callback,
            options: self.options,
            subject: lazy.then(Subject::new),
            evaluating: Cell::new(false),
            tracking: RefCell::new(Tracking {
                active: true,
                dirty: lazy,
                ..Tracking::default()
            }),
        });

        let weak: Weak<dyn Reactive> = Rc::downgrade(&inner) as Weak<dyn Reactive>;
        Runtime::register(id, weak);

        let computation = Computation { inner };
        if !lazy {
            let value = computation.evaluate()?;
            computation.inner.tracking.borrow_mut().value = value;
        }

        debug!(
            computation = id.raw(),
            expression = %computation.inner.expression,
            lazy,
            "computation created"
        );

        if computation.inner.options.immediate {
            let value = computation.value();
            computation.invoke_callback(&value, &Value::Undefined, "immediate callback")?;
        }

        Ok(computation)
    }
}

impl Computation {
    /// Start building a computation over an evaluation function.
    pub fn builder<F>(getter: F) -> ComputationBuilder
    where
        F: Fn() -> Result<Value> + 'static,
    {
        ComputationBuilder::new(Ok(Getter::Function(Rc::new(getter))), None)
    }

    /// Start building a computation that watches a dotted path under `root`.
    pub fn path_builder(root: Value, path: &str) -> ComputationBuilder {
        let getter = path::parse(path).map(|segments| Getter::Path { root, segments });
        ComputationBuilder::new(getter, Some(path.to_string()))
    }

    /// An eager computation with no callback, like a render loop.
    pub fn new<F>(getter: F) -> Result<Self>
    where
        F: Fn() -> Result<Value> + 'static,
    {
        Self::builder(getter).build()
    }

    /// A derived value, computed on demand.
    pub fn lazy<F>(getter: F) -> Result<Self>
    where
        F: Fn() -> Result<Value> + 'static,
    {
        Self::builder(getter).lazy(true).build()
    }

    /// An explicit watch: user-flagged, with a reaction callback.
    pub fn watch<F, C>(getter: F, callback: C) -> Result<Self>
    where
        F: Fn() -> Result<Value> + 'static,
        C: Fn(&Value, &Value) -> Result<()> + 'static,
    {
        Self::builder(getter).user(true).callback(callback).build()
    }

    /// Get the computation's unique id.
    pub fn id(&self) -> ComputationId {
        self.inner.id
    }

    pub fn expression(&self) -> &str {
        &self.inner.expression
    }

    pub fn options(&self) -> &ComputationOptions {
        &self.inner.options
    }

    /// The last computed value, without recomputing or tracking.
    pub fn value(&self) -> Value {
        self.inner.tracking.borrow().value.clone()
    }

    pub fn is_active(&self) -> bool {
        self.inner.tracking.borrow().active
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.tracking.borrow().dirty
    }

    /// Subjects read by the last completed evaluation.
    pub fn dependencies(&self) -> Vec<SubjectId> {
        self.inner.tracking.borrow().deps.to_vec()
    }

    /// Get the number of dependencies.
    pub fn dependency_count(&self) -> usize {
        self.inner.tracking.borrow().deps.len()
    }

    /// The subject readers of a derived value subscribe to.
    pub fn subject(&self) -> Option<&Subject> {
        self.inner.subject.as_ref()
    }

    /// Run the evaluation function as the current target and reconcile the
    /// dependency set.
    pub fn evaluate(&self) -> Result<Value> {
        let inner = &self.inner;

        let result = if inner.evaluating.replace(true) {
            Err(crate::Error::CyclicEvaluation(inner.expression.clone()))
        } else {
            let result = {
                let _ctx = EvaluationContext::enter(Some(inner.id));
                inner.getter.call().map(|value| {
                    if inner.options.deep {
                        traverse(&value);
                    }
                    value
                })
            };
            inner.evaluating.set(false);
            self.cleanup_deps();
            result
        };

        match result {
            Ok(value) => Ok(value),
            Err(err) if inner.options.user => {
                report_error(&err, &self.error_context("getter"));
                Ok(Value::Undefined)
            }
            Err(err) => Err(err),
        }
    }

    /// Drop subscriptions the last run no longer read, then promote the
    /// freshly discovered set.
    fn cleanup_deps(&self) {
        let stale: SmallVec<[SubjectId; 8]> = {
            let mut tracking = self.inner.tracking.borrow_mut();
            let tracking = &mut *tracking;

            let stale = tracking
                .deps
                .iter()
                .copied()
                .filter(|id| !tracking.new_dep_ids.contains(id))
                .collect();

            std::mem::swap(&mut tracking.dep_ids, &mut tracking.new_dep_ids);
            tracking.new_dep_ids.clear();
            std::mem::swap(&mut tracking.deps, &mut tracking.new_deps);
            tracking.new_deps.clear();
            stale
        };

        for subject in stale {
            Runtime::unsubscribe(subject, self.inner.id);
        }
    }

    /// Record a dependency on `subject` for the current run.
    pub fn add_dependency(&self, subject: SubjectId) {
        self.inner.add_dependency(subject);
    }

    /// Entry point used by subjects when something this computation read
    /// has changed.
    pub fn invalidate(&self) {
        if !self.is_active() {
            return;
        }

        let options = &self.inner.options;
        if options.lazy {
            self.inner.tracking.borrow_mut().dirty = true;
            if let Some(subject) = &self.inner.subject {
                // With nobody reading us, stay dirty and lazy.
                if subject.subscriber_count() > 0 {
                    subject.notify();
                }
            }
        } else if options.sync {
            if let Err(err) = self.run() {
                report_error(&err, &self.error_context("sync computation"));
            }
        } else {
            scheduler::enqueue(self.clone());
        }
    }

    /// Re-evaluate and, if the value changed, invoke the callback with
    /// `(new, old)`.
    ///
    /// Container values and deep computations always count as changed,
    /// since their contents may have mutated in place.
    pub fn run(&self) -> Result<()> {
        if !self.is_active() {
            return Ok(());
        }

        let value = self.evaluate()?;
        let old = {
            let mut tracking = self.inner.tracking.borrow_mut();
            let changed = !value.same_value(&tracking.value)
                || value.is_container()
                || self.inner.options.deep;
            if !changed {
                return Ok(());
            }
            std::mem::replace(&mut tracking.value, value.clone())
        };

        self.invoke_callback(&value, &old, "callback")
    }

    fn invoke_callback(&self, value: &Value, old: &Value, info: &'static str) -> Result<()> {
        let Some(callback) = self.inner.callback.clone() else {
            return Ok(());
        };

        match callback(value, old) {
            Ok(()) => Ok(()),
            Err(err) if self.inner.options.user => {
                report_error(&err, &self.error_context(info));
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Recompute a dirty derived value.
    pub fn evaluate_if_dirty(&self) -> Result<()> {
        if !self.is_dirty() {
            return Ok(());
        }

        self.inner.tracking.borrow_mut().dirty = false;
        if let Err(err) = self.run() {
            self.inner.tracking.borrow_mut().dirty = true;
            return Err(err);
        }
        Ok(())
    }

    /// Subscribe the current evaluation to this derived value's subject.
    pub fn depend(&self) {
        if let Some(subject) = &self.inner.subject {
            subject.depend();
        }
    }

    /// Read the value. Derived values are refreshed if dirty and the
    /// current evaluation subscribes to them.
    pub fn get(&self) -> Result<Value> {
        if self.inner.evaluating.get() {
            return Err(crate::Error::CyclicEvaluation(self.inner.expression.clone()));
        }
        if self.inner.options.lazy {
            self.evaluate_if_dirty()?;
            self.depend();
        }
        Ok(self.value())
    }

    /// Unsubscribe from everything and stop reacting. Idempotent.
    pub fn teardown(&self) {
        let held: SmallVec<[SubjectId; 8]> = {
            let mut tracking = self.inner.tracking.borrow_mut();
            if !tracking.active {
                return;
            }
            tracking.active = false;
            tracking.dep_ids.clear();
            tracking.new_dep_ids.clear();
            let mut held = std::mem::take(&mut tracking.deps);
            held.extend(tracking.new_deps.drain(..));
            held
        };

        for subject in held {
            Runtime::unsubscribe(subject, self.inner.id);
        }
        debug!(computation = self.inner.id.raw(), "computation torn down");
    }

    pub(crate) fn before_hook(&self) -> Option<Rc<BeforeHook>> {
        self.inner.options.before.clone()
    }

    pub(crate) fn error_context(&self, info: &'static str) -> ErrorContext {
        ErrorContext {
            computation: Some(self.inner.id),
            expression: self.inner.expression.clone(),
            info,
        }
    }
}

impl fmt::Debug for Computation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computation")
            .field("id", &self.inner.id)
            .field("expression", &self.inner.expression)
            .field("active", &self.is_active())
            .field("dirty", &self.is_dirty())
            .field("dependency_count", &self.dependency_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
