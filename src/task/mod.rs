//! Cancellable task primitive
//!
//! Every asynchronous entry point in the SDK hands the caller a
//! [`CancellableTask`]. The task is the single gate through which a
//! completion callback may reach the application: completion and
//! cancellation race freely across threads, and exactly one of them wins.

use std::sync::{Arc, Mutex};
use tracing::debug;

mod join;

pub use join::{BatchJoin, ChildSet};

/// A handle to an in-flight operation that can be cancelled.
///
/// Implemented by request handles returned from the core search engine,
/// by [`CancellableTask`] itself (so tasks can nest), and by
/// [`ChildSet`] for fan-out aggregates.
pub trait Cancellable: Send + Sync {
    /// Request cancellation. Fire-and-forget, idempotent.
    fn cancel(&self);
}

type Hook = Box<dyn FnOnce() + Send>;

/// Lifecycle state of a task. `Done` and `Cancelled` are terminal and
/// mutually exclusive; once entered they never change again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Pending,
    Done,
    Cancelled,
}

struct Inner {
    state: State,
    hooks: Vec<Hook>,
    wrapped: Option<Arc<dyn Cancellable>>,
}

/// A unit of pending asynchronous work.
///
/// All state transitions happen under one mutex, so the exactly-once
/// guarantee holds by construction rather than by convention. Hooks and
/// completion actions always run outside the lock.
pub struct CancellableTask {
    inner: Mutex<Inner>,
}

impl CancellableTask {
    /// Create a new pending task.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                state: State::Pending,
                hooks: Vec::new(),
                wrapped: None,
            }),
        })
    }

    /// Whether the task completed (successfully or with an error value).
    pub fn is_done(&self) -> bool {
        self.inner.lock().unwrap().state == State::Done
    }

    /// Whether the task was cancelled before completing.
    pub fn is_cancelled(&self) -> bool {
        self.inner.lock().unwrap().state == State::Cancelled
    }

    /// Whether the task reached either terminal state.
    pub fn is_terminal(&self) -> bool {
        self.inner.lock().unwrap().state != State::Pending
    }

    /// Cancel the task.
    ///
    /// Idempotent: a no-op if the task is already done or cancelled.
    /// Otherwise this cancels the wrapped handle (if any), runs every
    /// registered cancellation hook exactly once, and drops any pending
    /// completion so it can never fire.
    pub fn cancel(&self) {
        let (hooks, wrapped) = {
            let mut inner = self.inner.lock().unwrap();
            if inner.state != State::Pending {
                return;
            }
            inner.state = State::Cancelled;
            (std::mem::take(&mut inner.hooks), inner.wrapped.take())
        };

        debug!("task cancelled, notifying {} hook(s)", hooks.len());
        if let Some(wrapped) = wrapped {
            wrapped.cancel();
        }
        for hook in hooks {
            hook();
        }
    }

    /// Register a hook to run if/when the task is cancelled.
    ///
    /// If the task is already cancelled the hook runs immediately on the
    /// calling thread; if the task is already done the hook is dropped.
    pub fn add_on_cancelled(&self, hook: impl FnOnce() + Send + 'static) {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            State::Pending => inner.hooks.push(Box::new(hook)),
            State::Cancelled => {
                drop(inner);
                hook();
            }
            State::Done => {}
        }
    }

    /// Transition to done and run `action` exactly once.
    ///
    /// This is the single path by which a completion (success or tagged
    /// error value alike) reaches the caller. A no-op if the task is
    /// already terminal: `action` is dropped without running.
    pub fn mark_done(&self, action: impl FnOnce()) {
        let won = {
            let mut inner = self.inner.lock().unwrap();
            if inner.state != State::Pending {
                false
            } else {
                inner.state = State::Done;
                inner.hooks.clear();
                inner.wrapped = None;
                true
            }
        };
        if won {
            action();
        }
    }

    /// Transition to cancelled and run `action` exactly once.
    ///
    /// Used when a cancellation path must itself report something (e.g.
    /// partial aggregate results). Behaves like [`cancel`](Self::cancel)
    /// with respect to the wrapped handle and registered hooks, then runs
    /// `action`. A no-op if the task is already terminal.
    pub fn mark_cancelled_and_complete(&self, action: impl FnOnce()) {
        let (hooks, wrapped) = {
            let mut inner = self.inner.lock().unwrap();
            if inner.state != State::Pending {
                return;
            }
            inner.state = State::Cancelled;
            (std::mem::take(&mut inner.hooks), inner.wrapped.take())
        };
        if let Some(wrapped) = wrapped {
            wrapped.cancel();
        }
        for hook in hooks {
            hook();
        }
        action();
    }

    /// Associate a lower-level cancellable handle with this task so that
    /// future `cancel()` calls propagate to it.
    ///
    /// If the task is already cancelled the handle is cancelled right
    /// away instead of stored; if the task is already done the handle is
    /// ignored.
    pub fn attach_wrapped(&self, handle: Arc<dyn Cancellable>) {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            State::Pending => inner.wrapped = Some(handle),
            State::Cancelled => {
                drop(inner);
                handle.cancel();
            }
            State::Done => {}
        }
    }
}

impl Cancellable for CancellableTask {
    fn cancel(&self) {
        CancellableTask::cancel(self);
    }
}
