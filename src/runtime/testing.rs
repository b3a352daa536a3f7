//! Test reducers and helpers
//!
//! `Probe` can produce every worker kind on demand and records each action it
//! reduces, so tests can tell what reached the pipeline even after the store
//! is gone. `Counter` is the fetch/increment scenario store.

use crate::reducer::{Priority, Reducer, Worker};
use crate::runtime::Store;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Probe
// ============================================================================

/// A one-shot job the probe turns into a task worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub value: &'static str,
    pub delay: Duration,
    pub key: Option<&'static str>,
    pub priority: Priority,
}

impl Job {
    pub fn new(value: &'static str, delay_ms: u64) -> Self {
        Self {
            value,
            delay: Duration::from_millis(delay_ms),
            key: None,
            priority: Priority::default(),
        }
    }

    pub fn keyed(mut self, key: &'static str) -> Self {
        self.key = Some(key);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeAction {
    Set(u32),
    Noop,
    Start(Job),
    /// Task that fails; `handled` attaches an error handler
    Fail { handled: bool },
    /// Stream emitting `Delivered` for each value, `gap_ms` apart
    Stream {
        key: Option<&'static str>,
        values: Vec<&'static str>,
        gap_ms: u64,
    },
    /// Stream emitting `Tick` until cancelled
    Ticker { key: &'static str },
    /// Adapt a `futures::Stream` of values
    Iterate(Vec<&'static str>),
    Cancel(&'static str),
    Panic { key: &'static str },
    Delivered(String),
    Failed(String),
    Tick,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeState {
    pub value: u32,
    pub delivered: Vec<String>,
    pub failures: Vec<String>,
    pub ticks: u32,
}

#[derive(Clone, Default)]
pub struct Probe {
    initial_state_calls: Arc<AtomicUsize>,
    reduced: Arc<Mutex<Vec<ProbeAction>>>,
}

impl Probe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initial_state_calls(&self) -> usize {
        self.initial_state_calls.load(Ordering::SeqCst)
    }

    /// Every action the store has folded so far
    pub fn reduced(&self) -> Vec<ProbeAction> {
        self.reduced.lock().unwrap().clone()
    }

    pub fn delivered_count(&self) -> usize {
        self.reduced()
            .iter()
            .filter(|action| matches!(action, ProbeAction::Delivered(_)))
            .count()
    }
}

impl Reducer for Probe {
    type Action = ProbeAction;
    type State = ProbeState;

    fn initial_state(&self) -> ProbeState {
        self.initial_state_calls.fetch_add(1, Ordering::SeqCst);
        ProbeState::default()
    }

    fn reduce(&self, state: &mut ProbeState, action: ProbeAction) -> Worker<ProbeAction> {
        self.reduced.lock().unwrap().push(action.clone());

        match action {
            ProbeAction::Set(value) => {
                state.value = value;
                Worker::none()
            }
            ProbeAction::Noop => Worker::none(),
            ProbeAction::Start(job) => {
                let worker = Worker::task(async move {
                    tokio::time::sleep(job.delay).await;
                    ProbeAction::Delivered(job.value.to_string())
                })
                .with_priority(job.priority);
                match job.key {
                    Some(key) => worker.with_id(key),
                    None => worker,
                }
            }
            ProbeAction::Fail { handled } => {
                let worker = Worker::try_task(async {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    Err::<ProbeAction, _>(io::Error::other("boom"))
                });
                if handled {
                    worker.on_error(|e| ProbeAction::Failed(e.to_string()))
                } else {
                    worker
                }
            }
            ProbeAction::Stream {
                key,
                values,
                gap_ms,
            } => {
                let worker = Worker::stream(move |emitter| async move {
                    for value in values {
                        tokio::time::sleep(Duration::from_millis(gap_ms)).await;
                        if emitter.emit(ProbeAction::Delivered(value.to_string())).is_err() {
                            return;
                        }
                    }
                    emitter.finish();
                });
                match key {
                    Some(key) => worker.with_id(key),
                    None => worker,
                }
            }
            ProbeAction::Ticker { key } => Worker::stream(|emitter| async move {
                loop {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    if emitter.emit(ProbeAction::Tick).is_err() {
                        return;
                    }
                }
            })
            .with_id(key),
            ProbeAction::Iterate(values) => Worker::from_stream(futures::stream::iter(
                values
                    .into_iter()
                    .map(|value| ProbeAction::Delivered(value.to_string())),
            )),
            ProbeAction::Cancel(key) => Worker::cancel(key),
            ProbeAction::Panic { key } => Worker::task(explode()).with_id(key),
            ProbeAction::Delivered(value) => {
                state.delivered.push(value);
                Worker::none()
            }
            ProbeAction::Failed(message) => {
                state.failures.push(message);
                Worker::none()
            }
            ProbeAction::Tick => {
                state.ticks += 1;
                Worker::none()
            }
        }
    }
}

async fn explode() -> ProbeAction {
    tokio::time::sleep(Duration::from_millis(5)).await;
    panic!("worker exploded")
}

// ============================================================================
// Counter
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CounterAction {
    Increment,
    Decrement,
    Fetch,
    Fetched(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CounterState {
    pub count: i64,
    pub is_fetching: bool,
    pub value: String,
    pub fetches_completed: u32,
}

/// Counter whose `Fetch` resolves to `Fetched(value)` after `delay`
pub struct Counter {
    pub delay: Duration,
    pub value: &'static str,
}

impl Reducer for Counter {
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
                let (delay, value) = (self.delay, self.value);
                return Worker::task(async move {
                    tokio::time::sleep(delay).await;
                    CounterAction::Fetched(value.to_string())
                })
                .with_id("fetch");
            }
            CounterAction::Fetched(value) => {
                state.is_fetching = false;
                state.value = value;
                state.fetches_completed += 1;
            }
        }
        Worker::none()
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Wait until the published state satisfies `predicate`
pub async fn wait_until<R, F>(store: &Store<R>, predicate: F, timeout: Duration) -> bool
where
    R: Reducer,
    F: FnMut(&R::State) -> bool,
{
    let mut state = store.watch();
    let outcome = tokio::time::timeout(timeout, state.wait_for(predicate)).await;
    outcome.is_ok_and(|result| result.is_ok())
}

/// Wait until the store has exactly `count` workers registered
pub async fn wait_for_in_flight<R: Reducer>(
    store: &Store<R>,
    count: usize,
    timeout: Duration,
) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if store.in_flight() == count {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    store.in_flight() == count
}
