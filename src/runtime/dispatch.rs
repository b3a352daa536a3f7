//! Serialized dispatch loop

use super::scheduler::{Report, Scheduler};
use crate::config::StoreConfig;
use crate::reducer::{Reducer, WorkerId};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

/// Everything that reaches the dispatch task
pub(crate) enum Command<R: Reducer> {
    Action(R::Action),
    Report(Report<R::Action>),
    Cancel(WorkerId),
    Subscribe(Subscriber<R::State>),
    /// Acknowledged once every command queued before it has been handled
    Barrier(oneshot::Sender<()>),
}

/// State-change callback registered through `Store::subscribe`
pub(crate) struct Subscriber<S> {
    pub callback: Box<dyn FnMut(&S) + Send>,
    pub token: CancellationToken,
}

/// Owns the current state and applies commands one at a time
pub(crate) struct Dispatcher<R: Reducer> {
    reducer: R,
    state: R::State,
    config: StoreConfig,
    commands: mpsc::UnboundedReceiver<Command<R>>,
    state_tx: watch::Sender<R::State>,
    in_flight_tx: watch::Sender<usize>,
    subscribers: Vec<Subscriber<R::State>>,
    scheduler: Scheduler<R>,
    shutdown: CancellationToken,
}

impl<R: Reducer> Dispatcher<R> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        reducer: R,
        state: R::State,
        config: StoreConfig,
        commands: mpsc::UnboundedReceiver<Command<R>>,
        commands_tx: mpsc::UnboundedSender<Command<R>>,
        state_tx: watch::Sender<R::State>,
        in_flight_tx: watch::Sender<usize>,
        shutdown: CancellationToken,
    ) -> Self {
        let scheduler = Scheduler::new(shutdown.clone(), commands_tx, config.label.clone());
        Self {
            reducer,
            state,
            config,
            commands,
            state_tx,
            in_flight_tx,
            subscribers: Vec::new(),
            scheduler,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(store = %self.config.label, "Starting store");

        loop {
            tokio::select! {
                biased;

                () = self.shutdown.cancelled() => break,

                Some(command) = self.commands.recv() => self.handle(command),

                Some(joined) = self.scheduler.join_next(), if self.scheduler.has_tasks() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            tracing::error!(
                                store = %self.config.label,
                                error = %e,
                                "Worker panicked"
                            );
                        }
                    }
                }

                else => break,
            }
        }

        let abandoned = self.scheduler.len();
        self.scheduler.shutdown().await;
        self.sync_in_flight();
        tracing::info!(store = %self.config.label, abandoned, "Store stopped");
    }

    fn handle(&mut self, command: Command<R>) {
        match command {
            Command::Action(action) => self.apply(action),

            Command::Report(Report::Emit {
                id,
                generation,
                action,
            }) => {
                if self.scheduler.is_current(&id, generation) {
                    self.apply(action);
                } else {
                    tracing::debug!(
                        store = %self.config.label,
                        worker_id = %id,
                        "Dropping stale emission"
                    );
                }
            }

            Command::Report(Report::Settled {
                id,
                generation,
                action,
            }) => {
                if self.scheduler.reap(&id, generation) {
                    if let Some(action) = action {
                        self.apply(action);
                    }
                } else if action.is_some() {
                    tracing::debug!(
                        store = %self.config.label,
                        worker_id = %id,
                        "Dropping stale result"
                    );
                }
            }

            Command::Cancel(id) => {
                self.scheduler.cancel(&id);
            }

            Command::Subscribe(subscriber) => self.subscribers.push(subscriber),

            Command::Barrier(ack) => {
                let _ = ack.send(());
            }
        }

        // Once per command, so a result that starts a follow-up worker never
        // shows a transient zero
        self.sync_in_flight();
    }

    /// Fold one action into the state and schedule its worker
    fn apply(&mut self, action: R::Action) {
        if self.config.log_actions {
            tracing::debug!(store = %self.config.label, ?action, "Dispatching action");
        }

        let mut next = self.state.clone();
        let worker = self.reducer.reduce(&mut next, action);

        if next != self.state {
            self.state = next;
            self.publish();
        }

        if !worker.is_none() {
            self.scheduler.run(worker);
        }
    }

    /// Snapshot first, so callbacks reading the store see the state they
    /// were called with
    fn publish(&mut self) {
        self.state_tx.send_replace(self.state.clone());

        let state = &self.state;
        self.subscribers.retain_mut(|subscriber| {
            if subscriber.token.is_cancelled() {
                return false;
            }
            (subscriber.callback)(state);
            true
        });
    }

    fn sync_in_flight(&self) {
        let count = self.scheduler.len();
        self.in_flight_tx.send_if_modified(|current| {
            if *current == count {
                false
            } else {
                *current = count;
                true
            }
        });
    }
}
