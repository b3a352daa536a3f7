//! In-flight worker registry
//!
//! Every running worker has exactly one entry keyed by its `WorkerId`. An
//! entry carries a generation number; reports coming back from a task are
//! only honoured while the entry of that generation is still registered. That
//! is what keeps a superseded or cancelled worker from delivering a stale
//! value, even when its result was already queued at the time it was replaced.

use super::dispatch::Command;
use crate::error::WorkerError;
use crate::reducer::{
    Emitter, ErrorHandler, Operation, Priority, Reducer, StreamProducer, TaskFuture, Worker,
    WorkerId,
};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Outcome sent back from a worker task
pub(crate) enum Report<A> {
    /// One value from a stream worker
    Emit {
        id: WorkerId,
        generation: u64,
        action: A,
    },
    /// The worker is done; `action` is the task result, if any
    Settled {
        id: WorkerId,
        generation: u64,
        action: Option<A>,
    },
}

struct InFlight {
    generation: u64,
    cancel: CancellationToken,
    abort: AbortHandle,
}

impl InFlight {
    fn stop(&self) {
        self.cancel.cancel();
        self.abort.abort();
    }
}

pub(crate) struct Scheduler<R: Reducer> {
    registry: HashMap<WorkerId, InFlight>,
    tasks: JoinSet<()>,
    next_generation: u64,
    /// Parent of every worker token; cancelled on store teardown
    root: CancellationToken,
    commands: mpsc::UnboundedSender<Command<R>>,
    label: String,
}

impl<R: Reducer> Scheduler<R> {
    pub fn new(
        root: CancellationToken,
        commands: mpsc::UnboundedSender<Command<R>>,
        label: String,
    ) -> Self {
        Self {
            registry: HashMap::new(),
            tasks: JoinSet::new(),
            next_generation: 0,
            root,
            commands,
            label,
        }
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn has_tasks(&self) -> bool {
        !self.tasks.is_empty()
    }

    pub async fn join_next(&mut self) -> Option<Result<(), JoinError>> {
        self.tasks.join_next().await
    }

    /// Whether `generation` is the live entry for `id`
    pub fn is_current(&self, id: &WorkerId, generation: u64) -> bool {
        self.registry
            .get(id)
            .is_some_and(|entry| entry.generation == generation)
    }

    /// Remove the entry for a finished worker
    ///
    /// Returns false when the entry was already superseded or cancelled.
    pub fn reap(&mut self, id: &WorkerId, generation: u64) -> bool {
        if self.is_current(id, generation) {
            self.registry.remove(id);
            tracing::debug!(store = %self.label, worker_id = %id, generation, "Worker finished");
            true
        } else {
            false
        }
    }

    pub fn cancel(&mut self, id: &WorkerId) -> bool {
        match self.registry.remove(id) {
            Some(entry) => {
                entry.stop();
                tracing::debug!(store = %self.label, worker_id = %id, "Worker cancelled");
                true
            }
            None => false,
        }
    }

    /// Start `worker`, superseding any worker registered under the same id
    pub fn run(&mut self, worker: Worker<R::Action>) {
        let (id, priority, operation) = worker.into_parts();

        match operation {
            Operation::None => {}
            Operation::Cancel => {
                self.cancel(&id);
            }
            Operation::Task { run, on_error } => {
                let (generation, cancel) = self.prepare(&id);
                let completion = Completion::new(self.commands.clone(), id.clone(), generation);
                let task = run_task(run, on_error, priority, cancel.clone(), completion);
                self.spawn(id, generation, priority, cancel, task);
            }
            Operation::Stream { run } => {
                let (generation, cancel) = self.prepare(&id);
                let completion = Completion::new(self.commands.clone(), id.clone(), generation);
                let task = run_stream(run, priority, cancel.clone(), completion);
                self.spawn(id, generation, priority, cancel, task);
            }
        }
    }

    /// Cancel whatever runs under `id` and hand out a fresh generation
    fn prepare(&mut self, id: &WorkerId) -> (u64, CancellationToken) {
        if let Some(previous) = self.registry.remove(id) {
            previous.stop();
            tracing::debug!(
                store = %self.label,
                worker_id = %id,
                generation = previous.generation,
                "Superseding running worker"
            );
        }
        self.next_generation += 1;
        (self.next_generation, self.root.child_token())
    }

    fn spawn<F>(
        &mut self,
        id: WorkerId,
        generation: u64,
        priority: Priority,
        cancel: CancellationToken,
        task: F,
    ) where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let span = tracing::debug_span!(
            "worker",
            store = %self.label,
            worker_id = %id,
            ?priority,
            generation
        );
        tracing::debug!(
            store = %self.label,
            worker_id = %id,
            ?priority,
            generation,
            "Starting worker"
        );

        let abort = self.tasks.spawn(task.instrument(span));
        self.registry.insert(
            id,
            InFlight {
                generation,
                cancel,
                abort,
            },
        );
    }

    /// Cancel every worker and wait for the tasks to unwind
    pub async fn shutdown(&mut self) {
        for entry in self.registry.values() {
            entry.stop();
        }
        self.registry.clear();
        self.tasks.shutdown().await;
    }
}

/// Reports a worker's outcome exactly once
///
/// Dropping it unreported, even on abort or panic, still tells the
/// dispatcher the worker is gone so its registry entry gets reaped.
struct Completion<R: Reducer> {
    commands: mpsc::UnboundedSender<Command<R>>,
    id: WorkerId,
    generation: u64,
    reported: bool,
}

impl<R: Reducer> Completion<R> {
    fn new(commands: mpsc::UnboundedSender<Command<R>>, id: WorkerId, generation: u64) -> Self {
        Self {
            commands,
            id,
            generation,
            reported: false,
        }
    }

    fn emit(&self, action: R::Action) {
        let _ = self.commands.send(Command::Report(Report::Emit {
            id: self.id.clone(),
            generation: self.generation,
            action,
        }));
    }

    fn settle(mut self, action: Option<R::Action>) {
        self.send_settled(action);
    }

    fn send_settled(&mut self, action: Option<R::Action>) {
        self.reported = true;
        let _ = self.commands.send(Command::Report(Report::Settled {
            id: self.id.clone(),
            generation: self.generation,
            action,
        }));
    }
}

impl<R: Reducer> Drop for Completion<R> {
    fn drop(&mut self) {
        if !self.reported {
            self.send_settled(None);
        }
    }
}

async fn pace(priority: Priority) {
    if priority == Priority::Low {
        tokio::task::yield_now().await;
    }
}

async fn run_task<R: Reducer>(
    run: TaskFuture<R::Action>,
    on_error: Option<ErrorHandler<R::Action>>,
    priority: Priority,
    cancel: CancellationToken,
    completion: Completion<R>,
) {
    pace(priority).await;

    let outcome = tokio::select! {
        biased;
        () = cancel.cancelled() => None,
        result = run => Some(result),
    };

    match outcome {
        None => tracing::debug!("Task cancelled before completion"),
        Some(_) if cancel.is_cancelled() => {
            tracing::debug!("Task finished after cancellation, discarding result");
        }
        Some(Ok(action)) => completion.settle(Some(action)),
        Some(Err(error)) => completion.settle(handle_failure(error, on_error)),
    }
}

fn handle_failure<A>(error: WorkerError, on_error: Option<ErrorHandler<A>>) -> Option<A> {
    match on_error {
        Some(handler) => {
            tracing::debug!(error = %error, "Task failed, mapping error to action");
            Some(handler(error))
        }
        None => {
            tracing::warn!(error = %error, "Task failed with no error handler, dropping");
            None
        }
    }
}

async fn run_stream<R: Reducer>(
    run: StreamProducer<R::Action>,
    priority: Priority,
    cancel: CancellationToken,
    completion: Completion<R>,
) {
    pace(priority).await;

    let (emitter, mut values) = Emitter::channel(cancel.clone());

    let produce = run(emitter);
    let drain = async {
        while let Some(action) = values.recv().await {
            if cancel.is_cancelled() {
                break;
            }
            completion.emit(action);
        }
    };

    let finished = tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        ((), ()) = async { tokio::join!(produce, drain) } => true,
    };

    if finished {
        tracing::debug!("Stream finished");
        completion.settle(None);
    } else {
        tracing::debug!("Stream cancelled");
    }
}
