//! Deferred, cancellable release of a player's data.
//!
//! When Warden has to guess that a player left (their login was denied
//! after their data was loaded, so no quit will ever arrive), it doesn't
//! release the data on the spot. It schedules the release on the host's
//! main thread and remembers the handle. A reconnect inside the delay
//! cancels it.
//!
//! # Who wins
//!
//! The scheduled task and a cancelling reconnect race for the same entry
//! in the pending table. Whoever removes it first wins:
//!
//! - the task removes it → the release runs; a later `cancel` finds
//!   nothing and returns `false`
//! - `cancel` removes it → the handle is cancelled; if the task runs
//!   anyway it finds nothing and does nothing
//!
//! So a scheduled release runs at most once, and never after a successful
//! cancel.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::trace;
use warden_protocol::PlayerId;

use crate::host::{Scheduler, TaskHandle};

type PendingTable<H> = Arc<Mutex<HashMap<PlayerId, H>>>;

fn lock<H>(table: &Mutex<HashMap<PlayerId, H>>) -> MutexGuard<'_, HashMap<PlayerId, H>> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

/// At most one pending release per player.
pub struct CleanupScheduler<H: TaskHandle> {
    pending: PendingTable<H>,
}

impl<H: TaskHandle> CleanupScheduler<H> {
    pub fn new() -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Schedules `release(id)` to run `delay_ticks` from now.
    ///
    /// Returns `false` (and schedules nothing) if a release is already
    /// pending for `id`.
    pub fn schedule<S, F>(&self, scheduler: &S, id: PlayerId, delay_ticks: u64, release: F) -> bool
    where
        S: Scheduler<Handle = H>,
        F: FnOnce(PlayerId) + Send + 'static,
    {
        let mut pending = lock(&self.pending);
        let Entry::Vacant(slot) = pending.entry(id) else {
            return false;
        };

        let table = Arc::clone(&self.pending);
        // The scheduler never runs inline, so holding the table lock here
        // can't deadlock with the task below.
        let handle = scheduler.run_later(
            delay_ticks,
            Box::new(move || {
                let claimed = lock(&table).remove(&id).is_some();
                if claimed {
                    release(id);
                } else {
                    trace!(player_id = %id, "scheduled release was cancelled, skipping");
                }
            }),
        );
        slot.insert(handle);
        true
    }

    /// Cancels the pending release for `id`. Returns `true` if one was
    /// pending.
    pub fn cancel(&self, id: &PlayerId) -> bool {
        let removed = lock(&self.pending).remove(id);
        match removed {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self, id: &PlayerId) -> bool {
        lock(&self.pending).contains_key(id)
    }

    pub fn len(&self) -> usize {
        lock(&self.pending).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<H: TaskHandle> Default for CleanupScheduler<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Task;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Collects tasks instead of running them; the test decides when.
    #[derive(Default)]
    struct Manual {
        tasks: Mutex<Vec<(u64, Task, Arc<AtomicBool>)>>,
    }

    struct ManualHandle(Arc<AtomicBool>);

    impl TaskHandle for ManualHandle {
        fn cancel(&self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    impl Scheduler for Manual {
        type Handle = ManualHandle;

        fn run_later(&self, delay_ticks: u64, task: Task) -> ManualHandle {
            let cancelled = Arc::new(AtomicBool::new(false));
            self.tasks
                .lock()
                .unwrap()
                .push((delay_ticks, task, Arc::clone(&cancelled)));
            ManualHandle(cancelled)
        }

        fn run_async(&self, task: Task) {
            task();
        }
    }

    impl Manual {
        /// Runs every task, ignoring cancellation, to model a cancel that
        /// arrives after the task was already taken off the queue.
        fn run_all_ignoring_cancel(&self) {
            let tasks: Vec<_> = self.tasks.lock().unwrap().drain(..).collect();
            for (_, task, _) in tasks {
                task();
            }
        }

        fn run_uncancelled(&self) {
            let tasks: Vec<_> = self.tasks.lock().unwrap().drain(..).collect();
            for (_, task, cancelled) in tasks {
                if !cancelled.load(Ordering::SeqCst) {
                    task();
                }
            }
        }
    }

    fn counting_release(counter: &Arc<AtomicUsize>) -> impl FnOnce(PlayerId) + Send + 'static {
        let counter = Arc::clone(counter);
        move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_schedule_then_fire_releases_once() {
        let sched = Manual::default();
        let cleanup = CleanupScheduler::new();
        let released = Arc::new(AtomicUsize::new(0));
        let id = PlayerId::random();

        assert!(cleanup.schedule(&sched, id, 60, counting_release(&released)));
        assert!(cleanup.is_pending(&id));

        sched.run_uncancelled();
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert!(!cleanup.is_pending(&id));
        assert!(!cleanup.cancel(&id), "nothing left to cancel");
    }

    #[test]
    fn test_schedule_twice_keeps_first() {
        let sched = Manual::default();
        let cleanup = CleanupScheduler::new();
        let released = Arc::new(AtomicUsize::new(0));
        let id = PlayerId::random();

        assert!(cleanup.schedule(&sched, id, 60, counting_release(&released)));
        assert!(!cleanup.schedule(&sched, id, 0, counting_release(&released)));
        assert_eq!(cleanup.len(), 1);
        assert_eq!(sched.tasks.lock().unwrap().len(), 1, "second was never scheduled");
        assert_eq!(sched.tasks.lock().unwrap()[0].0, 60);
    }

    #[test]
    fn test_cancel_before_fire_prevents_release() {
        let sched = Manual::default();
        let cleanup = CleanupScheduler::new();
        let released = Arc::new(AtomicUsize::new(0));
        let id = PlayerId::random();

        cleanup.schedule(&sched, id, 60, counting_release(&released));
        assert!(cleanup.cancel(&id));

        sched.run_uncancelled();
        assert_eq!(released.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_task_running_after_cancel_does_nothing() {
        let sched = Manual::default();
        let cleanup = CleanupScheduler::new();
        let released = Arc::new(AtomicUsize::new(0));
        let id = PlayerId::random();

        cleanup.schedule(&sched, id, 60, counting_release(&released));
        assert!(cleanup.cancel(&id));

        // The task slipped past the cancel flag; it must still find its
        // entry gone.
        sched.run_all_ignoring_cancel();
        assert_eq!(released.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_reschedule_after_fire_is_allowed() {
        let sched = Manual::default();
        let cleanup = CleanupScheduler::new();
        let released = Arc::new(AtomicUsize::new(0));
        let id = PlayerId::random();

        cleanup.schedule(&sched, id, 0, counting_release(&released));
        sched.run_uncancelled();
        assert!(cleanup.schedule(&sched, id, 0, counting_release(&released)));
        sched.run_uncancelled();

        assert_eq!(released.load(Ordering::SeqCst), 2);
    }
}
