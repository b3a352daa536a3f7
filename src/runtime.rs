//! Store runtime
//!
//! One tokio task per store owns the current state and the in-flight worker
//! registry. Everything else talks to it through an unbounded command channel
//! (actions, worker reports, cancellations, subscriptions) or reads `watch`
//! snapshots, so state mutation is serialized without any external locking.

mod dispatch;
mod scheduler;
mod sink;
mod store;

#[cfg(test)]
mod proptests;
#[cfg(test)]
pub(crate) mod testing;

pub use sink::{Binding, Sink};
pub use store::{Store, Subscription};
