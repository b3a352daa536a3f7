//! Effect descriptors produced by transitions

use crate::error::{StreamClosed, WorkerError};
use futures::future::BoxFuture;
use futures::{FutureExt, Stream, StreamExt};
use std::fmt;
use std::future::Future;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Identity a worker runs under
///
/// `Unique` ids are fresh per worker, so unrelated effects never collide.
/// `Keyed` ids are chosen by the reducer: starting a worker under a key that
/// is already running cancels the old one first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WorkerId {
    Unique(Uuid),
    Keyed(String),
}

impl WorkerId {
    #[must_use]
    pub fn unique() -> Self {
        Self::Unique(Uuid::new_v4())
    }

    #[must_use]
    pub fn keyed(key: impl Into<String>) -> Self {
        Self::Keyed(key.into())
    }

    #[must_use]
    pub fn is_keyed(&self) -> bool {
        matches!(self, Self::Keyed(_))
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unique(id) => write!(f, "{id}"),
            Self::Keyed(key) => f.write_str(key),
        }
    }
}

impl From<&str> for WorkerId {
    fn from(key: &str) -> Self {
        Self::keyed(key)
    }
}

impl From<String> for WorkerId {
    fn from(key: String) -> Self {
        Self::Keyed(key)
    }
}

/// Scheduling hint passed through to the executor
///
/// Never affects the order in which results are applied to state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

pub(crate) type TaskFuture<A> = BoxFuture<'static, Result<A, WorkerError>>;
pub(crate) type ErrorHandler<A> = Box<dyn FnOnce(WorkerError) -> A + Send>;
pub(crate) type StreamProducer<A> = Box<dyn FnOnce(Emitter<A>) -> BoxFuture<'static, ()> + Send>;

pub(crate) enum Operation<A> {
    None,
    Task {
        run: TaskFuture<A>,
        on_error: Option<ErrorHandler<A>>,
    },
    Stream {
        run: StreamProducer<A>,
    },
    /// Stop whatever runs under the worker's id
    Cancel,
}

impl<A> Operation<A> {
    fn kind(&self) -> &'static str {
        match self {
            Operation::None => "none",
            Operation::Task { .. } => "task",
            Operation::Stream { .. } => "stream",
            Operation::Cancel => "cancel",
        }
    }
}

/// Inert description of zero or one unit of async work
///
/// Built inside `Reducer::reduce` and handed to the scheduler; nothing runs
/// until the store receives it.
#[must_use = "a worker does nothing unless it is returned from a transition"]
pub struct Worker<A> {
    id: WorkerId,
    priority: Priority,
    operation: Operation<A>,
}

impl<A> Worker<A> {
    pub fn none() -> Self {
        Self::from_operation(Operation::None)
    }

    /// Cancel the worker running under `id`, if any
    pub fn cancel(id: impl Into<WorkerId>) -> Self {
        Self {
            id: id.into(),
            priority: Priority::default(),
            operation: Operation::Cancel,
        }
    }

    fn from_operation(operation: Operation<A>) -> Self {
        Self {
            id: WorkerId::unique(),
            priority: Priority::default(),
            operation,
        }
    }

    /// Run under a caller-chosen identity, superseding any worker with the same id
    pub fn with_id(mut self, id: impl Into<WorkerId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Map a task failure into an action
    ///
    /// Without a handler failures are dropped. Has no effect on other kinds.
    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: FnOnce(WorkerError) -> A + Send + 'static,
    {
        if let Operation::Task { on_error, .. } = &mut self.operation {
            *on_error = Some(Box::new(handler));
        }
        self
    }

    #[must_use]
    pub fn id(&self) -> &WorkerId {
        &self.id
    }

    #[must_use]
    pub fn priority(&self) -> Priority {
        self.priority
    }

    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self.operation, Operation::None)
    }

    pub(crate) fn into_parts(self) -> (WorkerId, Priority, Operation<A>) {
        (self.id, self.priority, self.operation)
    }
}

impl<A: Send + 'static> Worker<A> {
    /// One-shot computation whose output is the follow-up action
    pub fn task<F>(run: F) -> Self
    where
        F: Future<Output = A> + Send + 'static,
    {
        Self::from_operation(Operation::Task {
            run: run.map(Ok).boxed(),
            on_error: None,
        })
    }

    /// One-shot computation that may fail; pair with [`Worker::on_error`]
    pub fn try_task<F, E>(run: F) -> Self
    where
        F: Future<Output = Result<A, E>> + Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::from_operation(Operation::Task {
            run: run
                .map(|result| result.map_err(WorkerError::from_source))
                .boxed(),
            on_error: None,
        })
    }

    /// Computation that emits any number of actions before returning
    pub fn stream<F, Fut>(run: F) -> Self
    where
        F: FnOnce(Emitter<A>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::from_operation(Operation::Stream {
            run: Box::new(move |emitter| run(emitter).boxed()),
        })
    }

    /// Forward every item of `stream` as an action
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = A> + Send + 'static,
    {
        Self::stream(move |emitter| async move {
            let mut stream = Box::pin(stream);
            while let Some(action) = stream.next().await {
                if emitter.emit(action).is_err() {
                    break;
                }
            }
        })
    }
}

impl<A> Default for Worker<A> {
    fn default() -> Self {
        Self::none()
    }
}

impl<A> fmt::Debug for Worker<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("kind", &self.operation.kind())
            .finish()
    }
}

/// Write-only handle given to a stream worker
///
/// Dropping it (or calling [`Emitter::finish`]) ends the stream once every
/// emitted value has been delivered.
pub struct Emitter<A> {
    tx: mpsc::UnboundedSender<A>,
    cancel: CancellationToken,
}

impl<A> Emitter<A> {
    pub(crate) fn channel(cancel: CancellationToken) -> (Self, mpsc::UnboundedReceiver<A>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, cancel }, rx)
    }

    /// Queue `action` for dispatch
    ///
    /// # Errors
    ///
    /// Returns [`StreamClosed`] once the worker was superseded, cancelled or
    /// its store torn down; producers should stop.
    pub fn emit(&self, action: A) -> Result<(), StreamClosed> {
        if self.cancel.is_cancelled() {
            return Err(StreamClosed);
        }
        self.tx.send(action).map_err(|_| StreamClosed)
    }

    /// Close the stream explicitly
    pub fn finish(self) {}

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }

    /// Resolves when the stream is cancelled
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }
}

impl<A> fmt::Debug for Emitter<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
