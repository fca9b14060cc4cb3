//! Fan-out/join support for batched operations
//!
//! [`BatchJoin`] is a count-down latch over N child outcomes: the
//! aggregate action fires exactly when the number of outstanding
//! children reaches zero. [`ChildSet`] broadcasts cancellation to every
//! still-pending child when the parent task is cancelled.

use super::{Cancellable, CancellableTask};
use std::sync::{Arc, Mutex};
use tracing::debug;

enum Slot<T> {
    Outstanding,
    Filled(T),
    Abandoned,
}

struct JoinInner<T> {
    remaining: usize,
    slots: Vec<Slot<T>>,
    on_complete: Option<Box<dyn FnOnce(Vec<Option<T>>) + Send>>,
}

/// Count-down latch joining N child outcomes into one aggregate action.
///
/// Each child reports through [`complete`](Self::complete) or
/// [`abandon`](Self::abandon) (for cancelled children). The aggregate
/// action runs exactly once, on the thread that retires the last child,
/// and receives one `Option<T>` per slot in submission order, with
/// `None` for abandoned children.
pub struct BatchJoin<T> {
    inner: Mutex<JoinInner<T>>,
}

impl<T: Send + 'static> BatchJoin<T> {
    /// Create a latch over `count` children. With `count == 0` the
    /// aggregate action fires before this returns.
    pub fn new(
        count: usize,
        on_complete: impl FnOnce(Vec<Option<T>>) + Send + 'static,
    ) -> Arc<Self> {
        let join = Arc::new(Self {
            inner: Mutex::new(JoinInner {
                remaining: count,
                slots: (0..count).map(|_| Slot::Outstanding).collect(),
                on_complete: Some(Box::new(on_complete)),
            }),
        });
        if count == 0 {
            join.fire_if_drained();
        }
        join
    }

    /// Record the outcome of child `index`. Repeat reports for the same
    /// slot are ignored.
    pub fn complete(&self, index: usize, outcome: T) {
        self.retire(index, Slot::Filled(outcome));
    }

    /// Retire child `index` without an outcome (it was cancelled).
    pub fn abandon(&self, index: usize) {
        self.retire(index, Slot::Abandoned);
    }

    fn retire(&self, index: usize, slot: Slot<T>) {
        {
            let mut inner = self.inner.lock().unwrap();
            if !matches!(inner.slots[index], Slot::Outstanding) {
                return;
            }
            inner.slots[index] = slot;
            inner.remaining -= 1;
            if inner.remaining > 0 {
                return;
            }
        }
        self.fire_if_drained();
    }

    fn fire_if_drained(&self) {
        let fired = {
            let mut inner = self.inner.lock().unwrap();
            if inner.remaining != 0 {
                None
            } else {
                inner.on_complete.take().map(|action| {
                    let slots = std::mem::take(&mut inner.slots);
                    (action, slots)
                })
            }
        };
        if let Some((action, slots)) = fired {
            debug!("batch join drained, firing aggregate");
            let outcomes = slots
                .into_iter()
                .map(|slot| match slot {
                    Slot::Filled(outcome) => Some(outcome),
                    _ => None,
                })
                .collect();
            action(outcomes);
        }
    }
}

/// The wrapped handle a batch parent task holds: cancelling it cancels
/// every still-pending child task. Children that already reached a
/// terminal state ignore the broadcast.
pub struct ChildSet {
    children: Mutex<Vec<Arc<CancellableTask>>>,
}

impl ChildSet {
    pub fn new(children: Vec<Arc<CancellableTask>>) -> Arc<Self> {
        Arc::new(Self {
            children: Mutex::new(children),
        })
    }
}

impl Cancellable for ChildSet {
    fn cancel(&self) {
        let children = std::mem::take(&mut *self.children.lock().unwrap());
        debug!("cancelling {} batch child task(s)", children.len());
        for child in children {
            child.cancel();
        }
    }
}
