//! The main thread's [`Scheduler`] implementation.

use warden_session::{Scheduler, Task, TaskHandle};
use warden_tick::TaskQueue;

/// Schedules delayed work onto the main thread's [`TaskQueue`] and
/// background work onto Tokio's blocking pool.
#[derive(Debug, Clone)]
pub struct MainScheduler {
    queue: TaskQueue,
    runtime: tokio::runtime::Handle,
}

impl MainScheduler {
    /// Must be called from inside a Tokio runtime.
    pub fn new(queue: TaskQueue) -> Self {
        Self {
            queue,
            runtime: tokio::runtime::Handle::current(),
        }
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }
}

/// Cancels a task scheduled through [`MainScheduler`].
#[derive(Debug, Clone)]
pub struct MainTaskHandle(warden_tick::TaskHandle);

impl MainTaskHandle {
    pub fn due_tick(&self) -> u64 {
        self.0.due_tick()
    }
}

impl TaskHandle for MainTaskHandle {
    fn cancel(&self) {
        self.0.cancel();
    }
}

impl Scheduler for MainScheduler {
    type Handle = MainTaskHandle;

    fn run_later(&self, delay_ticks: u64, task: Task) -> MainTaskHandle {
        MainTaskHandle(self.queue.schedule_in(delay_ticks, task))
    }

    fn run_async(&self, task: Task) {
        self.runtime.spawn_blocking(task);
    }
}
