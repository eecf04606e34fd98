//! Cooperative scheduling capability.
//!
//! The observer never loops or sleeps; it asks a [`Scheduler`] to call it
//! back, either on the next tick or after a delay, and cancels delayed
//! callbacks by handle. [`TaskQueue`] is a fixed-capacity implementation with
//! a caller-supplied millisecond clock that both firmwares and the tests drive.

use heapless::{Deque, Vec};

/// Work the observer can ask to be called back for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Periodic rotation of the buffer pool.
    Rotate,
    /// Emit the next chunk of the print buffer.
    Drain,
}

/// Identifies a delayed task for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerHandle(u32);

pub trait Scheduler {
    /// Run `task` on the next tick.
    fn post(&mut self, task: Task);

    /// Run `task` once `delay_ms` have elapsed.
    fn post_after(&mut self, delay_ms: u32, task: Task) -> TimerHandle;

    /// Cancel a delayed task, including one that is already due but has not
    /// run yet. Returns false if it already ran or was cancelled.
    fn cancel(&mut self, handle: TimerHandle) -> bool;
}

const READY_DEPTH: usize = 8;
const DELAYED_DEPTH: usize = 4;

#[derive(Debug, Clone, Copy)]
struct Delayed {
    handle: TimerHandle,
    due_ms: u64,
    task: Task,
}

/// A runnable task; `timer` is set when it was released by a due timer.
#[derive(Debug, Clone, Copy)]
struct Ready {
    task: Task,
    timer: Option<TimerHandle>,
}

/// Single-threaded task queue with a manually advanced clock.
pub struct TaskQueue {
    now_ms: u64,
    next_handle: u32,
    ready: Deque<Ready, READY_DEPTH>,
    delayed: Vec<Delayed, DELAYED_DEPTH>,
}

impl TaskQueue {
    pub const fn new() -> Self {
        Self {
            now_ms: 0,
            next_handle: 0,
            ready: Deque::new(),
            delayed: Vec::new(),
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Advance the clock and move every delayed task that is now due onto
    /// the ready queue, earliest first. The clock never goes backwards.
    pub fn advance_to(&mut self, now_ms: u64) {
        self.now_ms = self.now_ms.max(now_ms);
        while let Some(idx) = self.earliest_due() {
            let delayed = self.delayed.swap_remove(idx);
            self.push_ready(Ready {
                task: delayed.task,
                timer: Some(delayed.handle),
            });
        }
    }

    /// Next task to run, if any is ready.
    pub fn pop(&mut self) -> Option<Task> {
        self.ready.pop_front().map(|r| r.task)
    }

    /// Whether a task can run without waiting.
    pub fn has_ready(&self) -> bool {
        !self.ready.is_empty()
    }

    /// Earliest pending deadline, for the caller's timer.
    pub fn next_deadline(&self) -> Option<u64> {
        self.delayed.iter().map(|d| d.due_ms).min()
    }

    /// Number of delayed tasks still pending.
    pub fn pending_timers(&self) -> usize {
        self.delayed.len()
    }

    fn earliest_due(&self) -> Option<usize> {
        self.delayed
            .iter()
            .enumerate()
            .filter(|(_, d)| d.due_ms <= self.now_ms)
            .min_by_key(|(_, d)| d.due_ms)
            .map(|(i, _)| i)
    }

    fn push_ready(&mut self, ready: Ready) {
        if self.ready.push_back(ready).is_err() {
            log::error!("Task queue full, dropping {:?}", ready.task);
        }
    }

    /// Drop a released-but-unrun timer task from the ready queue, keeping
    /// the order of everything else.
    fn unready(&mut self, handle: TimerHandle) -> bool {
        let mut found = false;
        for _ in 0..self.ready.len() {
            if let Some(r) = self.ready.pop_front() {
                if !found && r.timer == Some(handle) {
                    found = true;
                } else {
                    let _ = self.ready.push_back(r);
                }
            }
        }
        found
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for TaskQueue {
    fn post(&mut self, task: Task) {
        self.push_ready(Ready { task, timer: None });
    }

    fn post_after(&mut self, delay_ms: u32, task: Task) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle = self.next_handle.wrapping_add(1);
        let delayed = Delayed {
            handle,
            due_ms: self.now_ms + u64::from(delay_ms),
            task,
        };
        if self.delayed.push(delayed).is_err() {
            log::error!("Timer table full, dropping {:?}", task);
        }
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) -> bool {
        match self.delayed.iter().position(|d| d.handle == handle) {
            Some(idx) => {
                self.delayed.swap_remove(idx);
                true
            }
            None => self.unready(handle),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn posted_tasks_run_in_order() {
        let mut q = TaskQueue::new();
        q.post(Task::Drain);
        q.post(Task::Rotate);
        assert_eq!(q.pop(), Some(Task::Drain));
        assert_eq!(q.pop(), Some(Task::Rotate));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn delayed_task_waits_for_clock() {
        let mut q = TaskQueue::new();
        q.post_after(5000, Task::Rotate);
        assert_eq!(q.next_deadline(), Some(5000));

        q.advance_to(4999);
        assert!(!q.has_ready());

        q.advance_to(5000);
        assert_eq!(q.pop(), Some(Task::Rotate));
        assert_eq!(q.next_deadline(), None);
    }

    #[test]
    fn cancelled_task_never_runs() {
        let mut q = TaskQueue::new();
        let handle = q.post_after(10, Task::Rotate);
        assert!(q.cancel(handle));
        assert!(!q.cancel(handle));
        q.advance_to(100);
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn due_timer_can_still_be_cancelled() {
        let mut q = TaskQueue::new();
        q.post(Task::Drain);
        let handle = q.post_after(10, Task::Rotate);
        q.post_after(20, Task::Rotate);
        q.advance_to(100);
        assert_eq!(q.pending_timers(), 0);

        assert!(q.cancel(handle));
        assert!(!q.cancel(handle));
        assert_eq!(q.pop(), Some(Task::Drain));
        assert_eq!(q.pop(), Some(Task::Rotate));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn posted_task_is_not_cancellable() {
        let mut q = TaskQueue::new();
        let handle = q.post_after(10, Task::Rotate);
        q.cancel(handle);
        q.post(Task::Rotate);
        assert!(!q.cancel(handle));
        assert_eq!(q.pop(), Some(Task::Rotate));
    }

    #[test]
    fn handles_are_distinct() {
        let mut q = TaskQueue::new();
        let a = q.post_after(10, Task::Rotate);
        let b = q.post_after(20, Task::Rotate);
        assert_ne!(a, b);
        assert!(q.cancel(a));
        assert_eq!(q.pending_timers(), 1);
        assert_eq!(q.next_deadline(), Some(20));
    }

    #[test]
    fn due_timers_release_earliest_first() {
        let mut q = TaskQueue::new();
        q.post_after(30, Task::Rotate);
        q.post_after(10, Task::Drain);
        q.advance_to(50);
        assert_eq!(q.pop(), Some(Task::Drain));
        assert_eq!(q.pop(), Some(Task::Rotate));
    }

    #[test]
    fn clock_is_monotonic() {
        let mut q = TaskQueue::new();
        q.advance_to(100);
        q.advance_to(50);
        assert_eq!(q.now_ms(), 100);
        q.post_after(10, Task::Rotate);
        assert_eq!(q.next_deadline(), Some(110));
    }
}
