//! Pure transition core
//!
//! A [`Reducer`] describes one store: its state shape, the closed set of
//! actions that mutate it, and the transition function that folds an action
//! into the state. Transitions never perform I/O; the only thing they hand
//! back is a [`Worker`] describing async work for the scheduler to run.

mod worker;

pub use worker::{Emitter, Priority, Worker, WorkerId};
pub(crate) use worker::{ErrorHandler, Operation, StreamProducer, TaskFuture};

use std::fmt::Debug;

/// State/action contract plus transition function for one store
///
/// `reduce` must be total and deterministic: every action has defined
/// behaviour (a `_ => Worker::none()` arm is fine) and the same
/// `(state, action)` always yields the same new state and worker shape.
/// Failures belong inside the returned worker, not here.
pub trait Reducer: Send + 'static {
    type Action: Debug + Send + 'static;
    type State: Clone + PartialEq + Send + Sync + 'static;

    /// Computed exactly once, when the store is created
    fn initial_state(&self) -> Self::State;

    /// Apply `action` to `state`, returning the effect to schedule
    fn reduce(&self, state: &mut Self::State, action: Self::Action) -> Worker<Self::Action>;
}
