//! Callback delivery on caller-chosen execution contexts
//!
//! Results are produced on whatever thread the core search engine or the
//! network layer happens to run; the application usually wants callbacks
//! somewhere specific (a UI thread, a worker pool). The dispatcher
//! decouples the two. Jobs dispatched to the same context are executed in
//! dispatch order; nothing is guaranteed across unrelated contexts.

use std::sync::Arc;
use tracing::{debug, warn};

/// A unit of callback work handed to an execution context.
pub type Job = Box<dyn FnOnce() + Send>;

/// An execution context callbacks can be delivered on.
///
/// Implementations must execute jobs from the same producer in the order
/// they were submitted.
pub trait ExecutionContext: Send + Sync {
    fn execute(&self, job: Job);
}

/// Runs jobs immediately on the producer thread. Useful in tests and in
/// applications that do their own marshalling.
pub struct InlineContext;

impl ExecutionContext for InlineContext {
    fn execute(&self, job: Job) {
        job();
    }
}

/// A dedicated consumer thread fed by a FIFO queue.
///
/// Dropping the context closes the queue; the thread drains what was
/// already submitted and exits.
pub struct QueueContext {
    sender: tokio::sync::mpsc::UnboundedSender<Job>,
}

impl QueueContext {
    /// Spawn a named consumer thread and return the context feeding it.
    pub fn spawn(name: &str) -> std::io::Result<Self> {
        let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel::<Job>();
        std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                while let Some(job) = receiver.blocking_recv() {
                    job();
                }
                debug!("callback queue drained, consumer exiting");
            })?;
        Ok(Self { sender })
    }
}

impl ExecutionContext for QueueContext {
    fn execute(&self, job: Job) {
        if self.sender.send(job).is_err() {
            warn!("callback dropped: queue consumer already shut down");
        }
    }
}

/// Delivers completion callbacks on the context the caller asked for,
/// falling back to the SDK's default context.
///
/// Constructed once at SDK initialization and threaded through every
/// orchestration call; there is no process-wide instance.
#[derive(Clone)]
pub struct CallbackDispatcher {
    default_context: Arc<dyn ExecutionContext>,
}

impl CallbackDispatcher {
    pub fn new(default_context: Arc<dyn ExecutionContext>) -> Self {
        Self { default_context }
    }

    /// A dispatcher whose default context runs callbacks inline.
    pub fn inline() -> Self {
        Self::new(Arc::new(InlineContext))
    }

    /// Queue `job` on `context`, or on the default context when the
    /// caller did not pick one.
    pub fn dispatch(&self, context: Option<&Arc<dyn ExecutionContext>>, job: Job) {
        match context {
            Some(context) => context.execute(job),
            None => self.default_context.execute(job),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::sync::Mutex;

    #[test]
    fn inline_context_runs_on_calling_thread() {
        let dispatcher = CallbackDispatcher::inline();
        let caller = std::thread::current().id();
        let (tx, rx) = mpsc::channel();

        dispatcher.dispatch(
            None,
            Box::new(move || {
                tx.send(std::thread::current().id()).unwrap();
            }),
        );

        assert_eq!(rx.recv().unwrap(), caller);
    }

    #[test]
    fn queue_context_preserves_dispatch_order() {
        let context = QueueContext::spawn("test-callbacks").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = mpsc::channel();

        for i in 0..100 {
            let seen = Arc::clone(&seen);
            let tx = tx.clone();
            context.execute(Box::new(move || {
                seen.lock().unwrap().push(i);
                if i == 99 {
                    tx.send(()).unwrap();
                }
            }));
        }

        rx.recv().unwrap();
        let seen = seen.lock().unwrap();
        assert_eq!(*seen, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn explicit_context_wins_over_default() {
        let dispatcher = CallbackDispatcher::inline();
        let explicit: Arc<dyn ExecutionContext> =
            Arc::new(QueueContext::spawn("explicit").unwrap());
        let (tx, rx) = mpsc::channel();
        let caller = std::thread::current().id();

        dispatcher.dispatch(
            Some(&explicit),
            Box::new(move || {
                tx.send(std::thread::current().id()).unwrap();
            }),
        );

        assert_ne!(rx.recv().unwrap(), caller);
    }
}
