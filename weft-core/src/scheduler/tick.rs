//! Deferred callbacks.
//!
//! [`next_tick`] collects callbacks and asks the installed [`Deferrer`] to
//! run them once, after the current synchronous work. The scheduler's flush
//! is itself a `next_tick` callback, so a callback registered after a state
//! change runs after the resulting re-runs.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::Future;
use std::rc::Rc;

use tokio::sync::oneshot;
use tracing::trace;

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce()>;

/// The platform primitive behind [`next_tick`]: run a task soon, after the
/// caller's synchronous work has finished.
pub trait Deferrer {
    fn defer(&self, task: Task);
}

thread_local! {
    static DEFERRER: RefCell<Rc<dyn Deferrer>> = RefCell::new(Rc::new(LocalQueue) as Rc<dyn Deferrer>);
    static CALLBACKS: RefCell<Vec<Task>> = const { RefCell::new(Vec::new()) };
    static PENDING: Cell<bool> = const { Cell::new(false) };
    static MACROTASKS: RefCell<VecDeque<Task>> = const { RefCell::new(VecDeque::new()) };
}

/// Default deferrer: a thread-local task queue the host pumps with
/// [`LocalQueue::run_pending`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalQueue;

impl LocalQueue {
    /// Run queued tasks until the queue is empty, including tasks queued
    /// by the tasks themselves. Returns how many ran.
    pub fn run_pending() -> usize {
        let mut ran = 0;
        while let Some(task) = MACROTASKS.with(|q| q.borrow_mut().pop_front()) {
            task();
            ran += 1;
        }
        ran
    }
}

impl Deferrer for LocalQueue {
    fn defer(&self, task: Task) {
        MACROTASKS.with(|q| q.borrow_mut().push_back(task));
    }
}

/// Deferrer that spawns onto the current `tokio::task::LocalSet`.
///
/// Deferring outside a `LocalSet` panics, as `spawn_local` does.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioLocal;

impl Deferrer for TokioLocal {
    fn defer(&self, task: Task) {
        tokio::task::spawn_local(async move { task() });
    }
}

/// Install the deferrer used by [`next_tick`] on this thread.
pub fn set_deferrer(deferrer: impl Deferrer + 'static) {
    DEFERRER.with(|d| *d.borrow_mut() = Rc::new(deferrer));
}

/// Run `callback` after the current synchronous work. Callbacks registered
/// before the deferral fires share it and run in registration order.
pub fn next_tick<F>(callback: F)
where
    F: FnOnce() + 'static,
{
    CALLBACKS.with(|c| c.borrow_mut().push(Box::new(callback)));
    if PENDING.with(|p| p.replace(true)) {
        return;
    }

    trace!("deferral requested");
    let deferrer = DEFERRER.with(|d| d.borrow().clone());
    deferrer.defer(Box::new(flush_callbacks));
}

/// Run every callback collected so far. Callbacks registered while these
/// run wait for the next deferral.
pub fn flush_callbacks() {
    PENDING.with(|p| p.set(false));
    let callbacks = CALLBACKS.with(|c| std::mem::take(&mut *c.borrow_mut()));
    for callback in callbacks {
        callback();
    }
}

/// Resolves after the next tick.
pub fn tick() -> impl Future<Output = ()> {
    let (tx, rx) = oneshot::channel();
    next_tick(move || {
        let _ = tx.send(());
    });
    async move {
        let _ = rx.await;
    }
}
