//! Counter store: synchronous updates, a text binding and a superseding fetch

use ensemble::{Reducer, Worker};
use serde::Serialize;
use std::time::Duration;

/// Both fetch buttons share this identity, so the latest press wins
const FETCH_ID: &str = "counter-fetch";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CounterAction {
    Increment,
    Decrement,
    Fetch,
    FetchTwo,
    Fetched(String),
    Name(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CounterState {
    pub count: i64,
    pub fetched: String,
    pub is_fetching: bool,
    pub name: String,
}

pub struct CounterStore {
    fetch_delay: Duration,
}

impl CounterStore {
    pub fn new(fetch_delay: Duration) -> Self {
        Self { fetch_delay }
    }

    fn fetch(delay: Duration, greeting: &'static str) -> Worker<CounterAction> {
        Worker::task(async move {
            tokio::time::sleep(delay).await;
            CounterAction::Fetched(greeting.to_string())
        })
        .with_id(FETCH_ID)
    }
}

impl Reducer for CounterStore {
    type Action = CounterAction;
    type State = CounterState;

    fn initial_state(&self) -> CounterState {
        CounterState::default()
    }

    fn reduce(&self, state: &mut CounterState, action: CounterAction) -> Worker<CounterAction> {
        match action {
            CounterAction::Increment => state.count += 1,
            CounterAction::Decrement => state.count -= 1,
            CounterAction::Fetch => {
                state.is_fetching = true;
                return Self::fetch(self.fetch_delay, "Hello, world!");
            }
            CounterAction::FetchTwo => {
                state.is_fetching = true;
                return Self::fetch(self.fetch_delay * 3, "Hello, world again!");
            }
            CounterAction::Fetched(text) => {
                state.is_fetching = false;
                state.fetched = text;
            }
            CounterAction::Name(name) => state.name = name,
        }
        Worker::none()
    }
}
