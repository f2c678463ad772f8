//! Cancelable batches of timer tasks.
//!
//! Character reveals are scheduled as many small timers at once and must all be
//! dropped together when the line changes or playback pauses. `TaskSet` owns the
//! handles; `cancel_all` is the only way they leave the set.

use gloo_timers::callback::Timeout;

/// A scheduled task that can be called off before it fires.
pub trait TaskHandle {
    fn cancel(self);
}

impl TaskHandle for Timeout {
    fn cancel(self) {
        // Dropping the returned callback releases the JS closure.
        let _ = Timeout::cancel(self);
    }
}

/// Something that can run a task after a delay.
pub trait Scheduler {
    type Handle: TaskHandle;

    fn schedule(&self, delay_ms: u32, task: Box<dyn FnOnce()>) -> Self::Handle;
}

/// `setTimeout`-backed scheduler.
#[derive(Debug, Default, Clone, Copy)]
pub struct TimeoutScheduler;

impl Scheduler for TimeoutScheduler {
    type Handle = Timeout;

    fn schedule(&self, delay_ms: u32, task: Box<dyn FnOnce()>) -> Timeout {
        Timeout::new(delay_ms, task)
    }
}

#[derive(Debug)]
pub struct TaskSet<H: TaskHandle> {
    handles: Vec<H>,
}

impl<H: TaskHandle> Default for TaskSet<H> {
    fn default() -> Self {
        Self { handles: Vec::new() }
    }
}

impl<H: TaskHandle> TaskSet<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, handle: H) {
        self.handles.push(handle);
    }

    /// Number of tasks scheduled since the last `cancel_all` (fired ones included).
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Cancel every handle and empty the set. Returns how many were held.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.handles.len();
        for handle in self.handles.drain(..) {
            handle.cancel();
        }
        count
    }
}

impl<H: TaskHandle> Drop for TaskSet<H> {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
