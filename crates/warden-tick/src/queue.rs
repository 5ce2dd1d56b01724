//! Delayed task queue for the main thread.
//!
//! Any thread can schedule a task "N ticks from now"; only the main thread
//! runs them, once per tick, via [`TaskQueue::take_due`]. Every scheduled
//! task comes with a [`TaskHandle`] that can cancel it.
//!
//! # Ordering
//!
//! Tasks due on the same tick run in the order they were scheduled. The
//! pending set is a `BTreeMap` keyed by `(due_tick, sequence)`, so
//! iterating it front-to-back gives exactly that order.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// A unit of work for the main thread.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

struct Scheduled {
    task: Task,
    cancelled: Arc<AtomicBool>,
}

#[derive(Default)]
struct QueueInner {
    /// The last tick handed to `take_due`. New delays are relative to it.
    current_tick: u64,
    next_seq: u64,
    pending: BTreeMap<(u64, u64), Scheduled>,
}

/// Shared, cloneable handle to the main thread's task queue.
#[derive(Clone, Default)]
pub struct TaskQueue {
    inner: Arc<Mutex<QueueInner>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `task` to run `delay_ticks` ticks after the current one.
    ///
    /// A delay of 0 means "on the next tick". Never runs the task inline,
    /// so it is safe to call while holding other locks.
    pub fn schedule_in(&self, delay_ticks: u64, task: Task) -> TaskHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut inner = self.lock();
        let due = inner.current_tick.saturating_add(delay_ticks);
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.pending.insert(
            (due, seq),
            Scheduled {
                task,
                cancelled: Arc::clone(&cancelled),
            },
        );
        tracing::trace!(due, seq, "task scheduled");

        TaskHandle {
            key: (due, seq),
            cancelled,
            queue: Arc::downgrade(&self.inner),
        }
    }

    /// Removes and returns every task due at or before `tick`, in run order.
    ///
    /// Cancelled tasks are dropped here instead of being returned. The
    /// returned tasks must be run by the caller *after* this returns, so
    /// tasks are free to schedule or cancel other tasks.
    pub fn take_due(&self, tick: u64) -> Vec<Task> {
        let mut inner = self.lock();
        if tick > inner.current_tick {
            inner.current_tick = tick;
        }

        // `split_off` keeps everything >= the key in the returned map;
        // what's left in `pending` is exactly the due set.
        let later = match tick.checked_add(1) {
            Some(next) => inner.pending.split_off(&(next, 0)),
            None => BTreeMap::new(),
        };
        let due = std::mem::replace(&mut inner.pending, later);

        due.into_values()
            .filter(|s| !s.cancelled.load(Ordering::SeqCst))
            .map(|s| s.task)
            .collect()
    }

    /// Removes and returns every pending task regardless of due tick, in
    /// run order. For draining the queue when the main thread stops.
    pub fn take_all(&self) -> Vec<Task> {
        let pending = std::mem::take(&mut self.lock().pending);
        pending
            .into_values()
            .filter(|s| !s.cancelled.load(Ordering::SeqCst))
            .map(|s| s.task)
            .collect()
    }

    /// Number of tasks still waiting (cancelled ones are removed eagerly).
    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().pending.is_empty()
    }

    pub fn current_tick(&self) -> u64 {
        self.lock().current_tick
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("TaskQueue")
            .field("current_tick", &inner.current_tick)
            .field("pending", &inner.pending.len())
            .finish()
    }
}

/// Cancels a scheduled task.
///
/// Holds only a weak reference to the queue: a handle outliving the queue
/// is harmless, cancelling it just flips the flag.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    key: (u64, u64),
    cancelled: Arc<AtomicBool>,
    queue: Weak<Mutex<QueueInner>>,
}

impl TaskHandle {
    /// Cancels the task. A no-op if it already ran or was already cancelled.
    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(queue) = self.queue.upgrade() {
            queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pending
                .remove(&self.key);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// The tick this task is (or was) due on.
    pub fn due_tick(&self) -> u64 {
        self.key.0
    }
}
