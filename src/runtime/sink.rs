//! Capability-limited handle for sending actions

use super::dispatch::Command;
use crate::reducer::Reducer;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Forwarding handle given to consumers of a store
///
/// Can enqueue actions and read the latest published state, nothing else.
/// Outlives the store safely: sends after teardown are dropped.
pub struct Sink<R: Reducer> {
    commands: mpsc::UnboundedSender<Command<R>>,
    state: watch::Receiver<R::State>,
}

impl<R: Reducer> Sink<R> {
    pub(crate) fn new(
        commands: mpsc::UnboundedSender<Command<R>>,
        state: watch::Receiver<R::State>,
    ) -> Self {
        Self { commands, state }
    }

    /// Enqueue `action`; never blocks and never fails
    pub fn send(&self, action: R::Action) {
        self.submit(Command::Action(action));
    }

    pub(crate) fn submit(&self, command: Command<R>) {
        if self.commands.send(command).is_err() {
            tracing::debug!("Store is gone, dropping command");
        }
    }

    /// Latest published state
    #[must_use]
    pub fn state(&self) -> R::State {
        self.state.borrow().clone()
    }

    /// Derive a two-way accessor over one state field
    ///
    /// Reads go to the latest published state; writes send `set(value)`.
    pub fn bind<V, G, S>(&self, get: G, set: S) -> Binding<R, V>
    where
        G: Fn(&R::State) -> V + Send + Sync + 'static,
        S: Fn(V) -> R::Action + Send + Sync + 'static,
    {
        Binding {
            sink: self.clone(),
            get: Arc::new(get),
            set: Arc::new(set),
        }
    }

    pub(crate) fn watch(&self) -> watch::Receiver<R::State> {
        self.state.clone()
    }
}

impl<R: Reducer> Clone for Sink<R> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            state: self.state.clone(),
        }
    }
}

impl<R: Reducer> fmt::Debug for Sink<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sink")
            .field("closed", &self.commands.is_closed())
            .finish_non_exhaustive()
    }
}

type Getter<S, V> = Arc<dyn Fn(&S) -> V + Send + Sync>;
type Setter<A, V> = Arc<dyn Fn(V) -> A + Send + Sync>;

/// Two-way value accessor produced by [`Sink::bind`]
pub struct Binding<R: Reducer, V> {
    sink: Sink<R>,
    get: Getter<R::State, V>,
    set: Setter<R::Action, V>,
}

impl<R: Reducer, V> Binding<R, V> {
    #[must_use]
    pub fn get(&self) -> V {
        let state = self.sink.state.borrow();
        (self.get)(&*state)
    }

    pub fn set(&self, value: V) {
        self.sink.send((self.set)(value));
    }
}

impl<R: Reducer, V> Clone for Binding<R, V> {
    fn clone(&self) -> Self {
        Self {
            sink: self.sink.clone(),
            get: Arc::clone(&self.get),
            set: Arc::clone(&self.set),
        }
    }
}

impl<R: Reducer, V> fmt::Debug for Binding<R, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding").field("sink", &self.sink).finish_non_exhaustive()
    }
}
