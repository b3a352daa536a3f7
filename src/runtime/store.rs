//! Store: state container composing dispatcher, scheduler and sink

use super::dispatch::{Command, Dispatcher, Subscriber};
use super::sink::Sink;
use crate::config::StoreConfig;
use crate::reducer::{Reducer, WorkerId};
use std::fmt;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;

/// Single-writer state container for one reducer
///
/// Must be created inside a tokio runtime. Dropping the store cancels every
/// in-flight worker before `drop` returns; [`Store::shutdown`] additionally
/// waits for the background tasks to unwind.
pub struct Store<R: Reducer> {
    sink: Sink<R>,
    in_flight: watch::Receiver<usize>,
    shutdown: CancellationToken,
    dispatcher: Option<JoinHandle<()>>,
    label: String,
}

impl<R: Reducer> Store<R> {
    #[must_use]
    pub fn new(reducer: R) -> Self {
        Self::with_config(reducer, StoreConfig::default())
    }

    /// Build the store; the initial state is computed here, exactly once
    #[must_use]
    pub fn with_config(reducer: R, config: StoreConfig) -> Self {
        let state = reducer.initial_state();
        let label = config.label.clone();

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(state.clone());
        let (in_flight_tx, in_flight_rx) = watch::channel(0);
        let shutdown = CancellationToken::new();

        let dispatcher = Dispatcher::new(
            reducer,
            state,
            config,
            commands_rx,
            commands_tx.clone(),
            state_tx,
            in_flight_tx,
            shutdown.clone(),
        );
        let handle = tokio::spawn(dispatcher.run());

        Self {
            sink: Sink::new(commands_tx, state_rx),
            in_flight: in_flight_rx,
            shutdown,
            dispatcher: Some(handle),
            label,
        }
    }

    pub fn send(&self, action: R::Action) {
        self.sink.send(action);
    }

    /// Consistent snapshot of the current state
    #[must_use]
    pub fn state(&self) -> R::State {
        self.sink.state()
    }

    /// Read the current state without cloning it
    pub fn with_state<T>(&self, f: impl FnOnce(&R::State) -> T) -> T {
        let state = self.sink.watch();
        let current = state.borrow();
        f(&*current)
    }

    #[must_use]
    pub fn sink(&self) -> Sink<R> {
        self.sink.clone()
    }

    /// Receiver that always holds the latest published state
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<R::State> {
        self.sink.watch()
    }

    /// Stream of published states, starting with the next change
    ///
    /// Backed by a `watch` channel: a slow consumer only sees the newest
    /// state. Use [`Store::subscribe`] to observe every change.
    #[must_use]
    pub fn changes(&self) -> WatchStream<R::State> {
        WatchStream::from_changes(self.sink.watch())
    }

    /// Call `callback` with every new state, in order, from the dispatch task
    ///
    /// Not called for the state current at registration time, nor for
    /// actions that leave the state unchanged. Must not block.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: FnMut(&R::State) + Send + 'static,
    {
        let token = CancellationToken::new();
        self.sink.submit(Command::Subscribe(Subscriber {
            callback: Box::new(callback),
            token: token.clone(),
        }));
        Subscription { token: Some(token) }
    }

    /// Cancel the worker running under `id`, if any
    pub fn cancel(&self, id: impl Into<WorkerId>) {
        self.sink.submit(Command::Cancel(id.into()));
    }

    /// Number of workers currently registered
    #[must_use]
    pub fn in_flight(&self) -> usize {
        *self.in_flight.borrow()
    }

    /// Resolves once everything sent so far has been applied and no worker
    /// is registered
    ///
    /// Follow-up workers started by results keep the store busy, so a chain
    /// of effects is waited out as a whole.
    pub async fn idle(&self) {
        let (ack, acked) = oneshot::channel();
        self.sink.submit(Command::Barrier(ack));
        if acked.await.is_err() {
            return;
        }
        let mut in_flight = self.in_flight.clone();
        let _ = in_flight.wait_for(|count| *count == 0).await;
    }

    /// Cancel all workers and wait for the dispatch task to finish
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.dispatcher.take() {
            if let Err(e) = handle.await {
                tracing::error!(store = %self.label, error = %e, "Dispatch task failed");
            }
        }
    }
}

impl<R: Reducer> Drop for Store<R> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl<R: Reducer> fmt::Debug for Store<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("label", &self.label)
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}

/// Keeps a [`Store::subscribe`] callback registered
///
/// Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
#[derive(Debug)]
pub struct Subscription {
    token: Option<CancellationToken>,
}

impl Subscription {
    pub fn unsubscribe(self) {}

    /// Keep the callback registered for the lifetime of the store
    pub fn detach(mut self) {
        self.token = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
    }
}
