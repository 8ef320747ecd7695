//! The suspending task queue.
//!
//! An ordered list of deferred actions run strictly one at a time. An action
//! may be marked suspending: after it runs, the queue pauses until an
//! external party (a timer firing, a client's completion dispatch) calls
//! [`TaskQueue::resume`]. Suspension is cooperative — the queue never
//! preempts a running action, and a suspending action must itself arrange
//! for the resume signal once its async work completes. There is no
//! queue-level timeout: a resume signal that never arrives stalls the queue
//! forever, by design.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// One queued unit of work plus its suspension marker.
pub struct Action {
    run: Box<dyn FnOnce() + Send>,
    suspending: bool,
}

impl Action {
    /// An action that lets the queue keep draining after it runs.
    pub fn new<F: FnOnce() + Send + 'static>(f: F) -> Self {
        Self {
            run: Box::new(f),
            suspending: false,
        }
    }

    /// An action that pauses the queue after it runs, until a resume signal.
    pub fn suspending<F: FnOnce() + Send + 'static>(f: F) -> Self {
        Self {
            run: Box::new(f),
            suspending: true,
        }
    }
}

struct QueueInner {
    actions: VecDeque<Action>,
    paused: bool,
    /// True while a flush loop is running actions; appends during that
    /// window queue up instead of starting a nested drain.
    draining: bool,
}

/// FIFO of deferred actions with cooperative suspension. Cheap to clone;
/// clones share the same queue.
#[derive(Clone)]
pub struct TaskQueue {
    inner: Arc<Mutex<QueueInner>>,
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(QueueInner {
                actions: VecDeque::new(),
                paused: false,
                draining: false,
            })),
        }
    }

    /// Append an action to the tail; if the queue is not paused, attempt to
    /// flush immediately.
    pub fn append(&self, action: Action) {
        let paused = {
            let mut inner = self.inner.lock().unwrap();
            inner.actions.push_back(action);
            inner.paused
        };
        if !paused {
            self.flush();
        }
    }

    /// Run queued actions in order until the queue is empty or a suspending
    /// action paused it. No-op while paused or while another flush is
    /// already draining.
    pub fn flush(&self) {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.paused || inner.draining {
                return;
            }
            inner.draining = true;
        }

        loop {
            // The paused check and the hand-back of the draining marker are
            // one critical section, so a resume signal either lands while we
            // still loop (we observe the cleared pause) or after we let go
            // (its own flush drains).
            let action = {
                let mut inner = self.inner.lock().unwrap();
                if inner.paused {
                    inner.draining = false;
                    return;
                }
                match inner.actions.pop_front() {
                    Some(action) => action,
                    None => {
                        inner.draining = false;
                        return;
                    }
                }
            };

            // A suspending action pauses the queue up front; its resume
            // signal may legitimately arrive while it is still running.
            if action.suspending {
                self.inner.lock().unwrap().paused = true;
            }
            // The lock is released while the action runs, so the action may
            // append to (or resume) this same queue.
            (action.run)();
        }
    }

    /// Clear the suspension and continue with the next queued action.
    pub fn resume(&self) {
        self.inner.lock().unwrap().paused = false;
        self.flush();
    }

    pub fn is_paused(&self) -> bool {
        self.inner.lock().unwrap().paused
    }

    pub fn pending(&self) -> usize {
        self.inner.lock().unwrap().actions.len()
    }
}
