//! Ensemble - reactive state containers driven by pure reducers
//!
//! A [`Store`] holds the state for one [`Reducer`]. Actions sent to the store
//! are folded into the state one at a time; each fold may hand back a
//! [`Worker`] describing async work (a one-shot task or a stream of actions)
//! whose results flow back into the store as further actions.
//!
//! ```no_run
//! use ensemble::{Reducer, Store, Worker};
//! use std::time::Duration;
//!
//! #[derive(Debug)]
//! enum Action {
//!     Refresh,
//!     Loaded(u32),
//! }
//!
//! struct Feed;
//!
//! impl Reducer for Feed {
//!     type Action = Action;
//!     type State = Option<u32>;
//!
//!     fn initial_state(&self) -> Option<u32> {
//!         None
//!     }
//!
//!     fn reduce(&self, state: &mut Option<u32>, action: Action) -> Worker<Action> {
//!         match action {
//!             Action::Refresh => Worker::task(async {
//!                 tokio::time::sleep(Duration::from_millis(10)).await;
//!                 Action::Loaded(42)
//!             })
//!             .with_id("refresh"),
//!             Action::Loaded(value) => {
//!                 *state = Some(value);
//!                 Worker::none()
//!             }
//!         }
//!     }
//! }
//!
//! # async fn run() {
//! let store = Store::new(Feed);
//! store.send(Action::Refresh);
//! let mut state = store.watch();
//! let _ = state.wait_for(Option::is_some).await;
//! # }
//! ```

pub mod config;
pub mod error;
pub mod reducer;
pub mod runtime;

pub use config::StoreConfig;
pub use error::{ConfigError, StreamClosed, WorkerError};
pub use reducer::{Emitter, Priority, Reducer, Worker, WorkerId};
pub use runtime::{Binding, Sink, Store, Subscription};
