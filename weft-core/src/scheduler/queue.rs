use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};

use super::tick::next_tick;
use crate::config;
use crate::error::{report_error, warn};
use crate::reactive::{Computation, ComputationId};

thread_local! {
    static QUEUE: RefCell<QueueState> = RefCell::new(QueueState::default());
}

#[derive(Default)]
struct QueueState {
    queue: Vec<Computation>,
    /// Ids queued and not yet run in this batch.
    has: HashSet<ComputationId>,
    /// Re-runs per computation within the current flush.
    circular: HashMap<ComputationId, u32>,
    /// A flush has been requested for this batch.
    waiting: bool,
    flushing: bool,
    /// Flush cursor.
    index: usize,
}

fn with_queue<R>(f: impl FnOnce(&mut QueueState) -> R) -> R {
    QUEUE.with(|q| f(&mut q.borrow_mut()))
}

/// Queue `computation` for the next flush. At most once per batch.
pub(crate) fn enqueue(computation: Computation) {
    let id = computation.id();
    let request_flush = with_queue(|q| {
        if !q.has.insert(id) {
            return None;
        }

        if q.flushing {
            // Keep the unvisited part sorted by id.
            let mut pos = q.queue.len();
            while pos > q.index + 1 && q.queue[pos - 1].id() > id {
                pos -= 1;
            }
            q.queue.insert(pos, computation);
        } else {
            q.queue.push(computation);
        }

        Some(!std::mem::replace(&mut q.waiting, true))
    });

    let Some(request_flush) = request_flush else {
        return;
    };
    trace!(computation = id.raw(), "enqueued");

    if request_flush {
        if config::with(|c| c.async_flush) {
            next_tick(flush);
        } else {
            flush();
        }
    }
}

/// Drain the queue, running every pending computation in ascending id order.
///
/// Called by the deferred-callback facility; calling it while a flush is in
/// progress does nothing.
pub fn flush() {
    let pending = with_queue(|q| {
        if q.flushing {
            return None;
        }
        q.flushing = true;
        q.index = 0;
        q.queue.sort_by_key(Computation::id);
        Some(q.queue.len())
    });
    let Some(pending) = pending else {
        return;
    };
    debug!(pending, "flush started");

    let max_updates = config::with(|c| c.max_update_count);
    let mut ran = 0usize;

    loop {
        let next = with_queue(|q| {
            let next = q.queue.get(q.index).cloned()?;
            q.has.remove(&next.id());
            Some(next)
        });
        let Some(computation) = next else {
            break;
        };

        if let Some(before) = computation.before_hook() {
            before();
        }
        if let Err(err) = computation.run() {
            report_error(&err, &computation.error_context("scheduler flush"));
        }
        ran += 1;

        let id = computation.id();
        let runaway = with_queue(|q| {
            if !q.has.contains(&id) {
                return false;
            }
            let count = q.circular.entry(id).or_insert(0);
            *count += 1;
            *count > max_updates
        });
        if runaway {
            warn(&format!(
                "you may have an infinite update loop in computation with expression \"{}\"",
                computation.expression()
            ));
            break;
        }

        with_queue(|q| q.index += 1);
    }

    let drained = with_queue(|q| {
        q.has.clear();
        q.circular.clear();
        q.waiting = false;
        q.flushing = false;
        q.index = 0;
        std::mem::take(&mut q.queue)
    });
    // Last handles may be in here; drop them outside the borrow.
    drop(drained);

    debug!(ran, "flush finished");
}

/// Number of computations queued and not yet run.
pub fn pending_count() -> usize {
    with_queue(|q| q.has.len())
}

pub fn is_flushing() -> bool {
    with_queue(|q| q.flushing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use crate::data::Object;
    use crate::observer::observe;
    use crate::scheduler::LocalQueue;
    use crate::Value;
    use tracing_test::traced_test;

    fn state(pairs: &[(&str, i32)]) -> Object {
        let object: Object = pairs.iter().copied().collect();
        observe(&Value::from(object.clone()), false);
        object
    }

    #[test]
    fn batches_synchronous_writes() {
        let object = state(&[("a", 1), ("b", 2), ("c", 3)]);
        let reader = object.clone();
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let _computation = Computation::builder(move || {
            let sum: f64 = ["a", "b", "c"]
                .iter()
                .filter_map(|k| reader.get(k).as_f64())
                .sum();
            Ok(Value::from(sum))
        })
        .callback(move |_, _| {
            counter.set(counter.get() + 1);
            Ok(())
        })
        .build()
        .unwrap();

        object.set("a", 10);
        object.set("b", 20);
        object.set("c", 30);
        assert_eq!(pending_count(), 1);

        assert_eq!(LocalQueue::run_pending(), 1);
        assert_eq!(calls.get(), 1);
        assert_eq!(pending_count(), 0);
        assert!(!is_flushing());
    }

    #[test]
    fn runs_in_creation_order() {
        let object = state(&[("n", 1)]);
        let order = Rc::new(RefCell::new(Vec::new()));

        let mut computations = Vec::new();
        for label in ["first", "second", "third"] {
            let reader = object.clone();
            let log = order.clone();
            computations.push(
                Computation::builder(move || Ok(reader.get("n")))
                    .callback(move |_, _| {
                        log.borrow_mut().push(label);
                        Ok(())
                    })
                    .build()
                    .unwrap(),
            );
        }

        // Enqueue in reverse by invalidating directly.
        for computation in computations.iter().rev() {
            computation.invalidate();
        }
        object.set("n", 2);
        LocalQueue::run_pending();

        assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn before_hook_runs_ahead_of_each_rerun() {
        let object = state(&[("n", 1)]);
        let reader = object.clone();
        let events = Rc::new(RefCell::new(Vec::new()));
        let (before_log, callback_log) = (events.clone(), events.clone());

        let _computation = Computation::builder(move || Ok(reader.get("n")))
            .before(move || before_log.borrow_mut().push("before"))
            .callback(move |_, _| {
                callback_log.borrow_mut().push("callback");
                Ok(())
            })
            .build()
            .unwrap();

        object.set("n", 2);
        LocalQueue::run_pending();
        assert_eq!(*events.borrow(), vec!["before", "callback"]);
    }

    #[test]
    fn errors_do_not_abort_the_flush() {
        let reported = Rc::new(Cell::new(0));
        let sink = reported.clone();
        config::configure(|c| c.error_handler = Some(Rc::new(move |_, _| sink.set(sink.get() + 1))));

        let object = state(&[("n", 1)]);
        let failing_reader = object.clone();
        let _failing = Computation::builder(move || match failing_reader.get("n").as_f64() {
            Some(n) if n > 1.0 => Err(crate::Error::msg("too big")),
            _ => Ok(Value::Null),
        })
        .build()
        .unwrap();

        let reader = object.clone();
        let reached = Rc::new(Cell::new(false));
        let flag = reached.clone();
        let _healthy = Computation::builder(move || Ok(reader.get("n")))
            .callback(move |_, _| {
                flag.set(true);
                Ok(())
            })
            .build()
            .unwrap();

        object.set("n", 2);
        LocalQueue::run_pending();

        assert_eq!(reported.get(), 1);
        assert!(reached.get());
        config::reset();
    }

    #[test]
    fn reenqueue_during_flush_lands_in_same_pass() {
        let object = state(&[("n", 0), ("echo", 0)]);
        let echo_reader = object.clone();
        let echoes = Rc::new(Cell::new(0));
        let echo_count = echoes.clone();

        // Created first, so it sorts ahead; re-enqueued by the writer below.
        let _echo = Computation::builder(move || Ok(echo_reader.get("echo")))
            .callback(move |_, _| {
                echo_count.set(echo_count.get() + 1);
                Ok(())
            })
            .build()
            .unwrap();

        let reader = object.clone();
        let writer = object.clone();
        let _copier = Computation::builder(move || Ok(reader.get("n")))
            .callback(move |new, _| {
                writer.set("echo", new.clone());
                Ok(())
            })
            .build()
            .unwrap();

        object.set("n", 1);
        assert_eq!(LocalQueue::run_pending(), 1);
        assert_eq!(echoes.get(), 1);
        assert_eq!(object.get("echo"), Value::from(1));
    }

    #[test]
    fn mid_flush_enqueue_runs_before_later_ids() {
        let object = state(&[("n", 0), ("m", 0)]);
        let order = Rc::new(RefCell::new(Vec::new()));

        let log = order.clone();
        let (reader, writer) = (object.clone(), object.clone());
        let _a = Computation::builder(move || Ok(reader.get("n")))
            .callback(move |new, _| {
                log.borrow_mut().push("A");
                writer.set("m", new.clone());
                Ok(())
            })
            .build()
            .unwrap();

        let log = order.clone();
        let reader = object.clone();
        let _b = Computation::builder(move || Ok(reader.get("m")))
            .callback(move |_, _| {
                log.borrow_mut().push("B");
                Ok(())
            })
            .build()
            .unwrap();

        let log = order.clone();
        let reader = object.clone();
        let _c = Computation::builder(move || Ok(reader.get("n")))
            .callback(move |_, _| {
                log.borrow_mut().push("C");
                Ok(())
            })
            .build()
            .unwrap();

        object.set("n", 1);
        assert_eq!(LocalQueue::run_pending(), 1);
        assert_eq!(*order.borrow(), vec!["A", "B", "C"]);
    }

    #[test]
    fn synchronous_mode_flushes_on_enqueue() {
        config::configure(|c| c.async_flush = false);
        let object = state(&[("n", 1)]);
        let reader = object.clone();
        let computation = Computation::new(move || Ok(reader.get("n"))).unwrap();

        object.set("n", 4);
        assert_eq!(computation.value(), Value::from(4));
        assert_eq!(LocalQueue::run_pending(), 0);
        config::reset();
    }

    #[traced_test]
    #[test]
    fn runaway_updates_are_cut_off() {
        config::configure(|c| c.max_update_count = 5);
        let object = state(&[("n", 0)]);
        let reader = object.clone();
        let writer = object.clone();
        let runs = Rc::new(Cell::new(0));
        let counter = runs.clone();

        let _looping = Computation::builder(move || Ok(reader.get("n")))
            .expression("n")
            .callback(move |new, _| {
                counter.set(counter.get() + 1);
                writer.set("n", new.as_f64().unwrap_or(0.0) + 1.0);
                Ok(())
            })
            .build()
            .unwrap();

        object.set("n", 1);
        LocalQueue::run_pending();

        assert_eq!(runs.get(), 6);
        assert!(logs_contain("infinite update loop"));
        assert!(!is_flushing());
        assert_eq!(pending_count(), 0);
        config::reset();
    }
}
