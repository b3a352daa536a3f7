//! Ensemble demo - drives the counter and news-section stores headlessly
//!
//! Every published state is logged as JSON, so the run reads as a trace of
//! what a UI bound to these stores would have rendered.

mod counter;
mod sections;

use counter::{CounterAction, CounterState, CounterStore};
use ensemble::config::parse_millis;
use ensemble::{ConfigError, Reducer, Store, StoreConfig};
use sections::{CannedProvider, Section, SectionsAction, SectionsState, SectionsStore};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const FETCH_DELAY_VAR: &str = "ENSEMBLE_DEMO_FETCH_DELAY_MS";
const HEADLINE_INTERVAL_VAR: &str = "ENSEMBLE_DEMO_HEADLINE_MS";
const SETTLE_TIMEOUT: Duration = Duration::from_secs(30);

struct DemoConfig {
    fetch_delay: Duration,
    headline_interval: Duration,
}

impl DemoConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let millis = |name: &str, default: u64| match std::env::var(name) {
            Ok(raw) => parse_millis(name, &raw),
            Err(_) => Ok(Duration::from_millis(default)),
        };

        Ok(Self {
            fetch_delay: millis(FETCH_DELAY_VAR, 200)?,
            headline_interval: millis(HEADLINE_INTERVAL_VAR, 100)?,
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ensemble=debug,ensemble_demo=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let demo = DemoConfig::from_env()?;
    let base = StoreConfig::from_env()?;

    tracing::info!(
        fetch_delay_ms = demo.fetch_delay.as_millis(),
        headline_interval_ms = demo.headline_interval.as_millis(),
        log_actions = base.log_actions,
        "Starting demo"
    );

    run_counter(&demo, base.clone().with_label("counter")).await?;
    run_sections(&demo, base.with_label("sections")).await?;

    tracing::info!("Demo finished");
    Ok(())
}

async fn run_counter(
    demo: &DemoConfig,
    config: StoreConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::with_config(CounterStore::new(demo.fetch_delay), config);
    let _log = store.subscribe(log_state("counter"));
    let sink = store.sink();

    sink.send(CounterAction::Increment);
    sink.send(CounterAction::Increment);
    sink.send(CounterAction::Decrement);

    let name = sink.bind(|state: &CounterState| state.name.clone(), CounterAction::Name);
    name.set("Ensemble".to_string());

    // The slow fetch is superseded by the quick one
    sink.send(CounterAction::FetchTwo);
    sink.send(CounterAction::Fetch);

    let state = settle(&store, |s| !s.is_fetching && !s.fetched.is_empty()).await?;
    store.idle().await;
    tracing::info!(
        count = state.count,
        fetched = %state.fetched,
        name = %name.get(),
        "Counter settled"
    );

    store.shutdown().await;
    Ok(())
}

async fn run_sections(
    demo: &DemoConfig,
    config: StoreConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let provider = Arc::new(CannedProvider::new(demo.fetch_delay));
    let store = Store::with_config(
        SectionsStore::new(provider, demo.headline_interval),
        config,
    );
    let _log = store.subscribe(log_state("sections"));

    tracing::info!(
        sections = ?Section::ALL.iter().map(|s| s.title()).collect::<Vec<_>>(),
        "Sections available"
    );

    store.send(SectionsAction::SelectSection(Section::Home));
    store.send(SectionsAction::SelectSection(Section::Technology));
    let state = settle(&store, |s| {
        s.selected_section == Section::Technology && !s.is_fetching
    })
    .await?;
    tracing::info!(articles = state.articles.len(), "Technology loaded");

    store.send(SectionsAction::SelectSection(Section::Science));
    let state = settle(&store, |s| s.error.is_some()).await?;
    tracing::warn!(error = ?state.error, "Science unavailable");

    store.send(SectionsAction::SelectSection(Section::World));
    let state = settle(&store, |s| {
        s.selected_section == Section::World && !s.is_fetching
    })
    .await?;

    store.send(SectionsAction::StartLive);
    settle(&store, |s| s.headlines.len() >= 3).await?;
    store.send(SectionsAction::StopLive);

    if let Some(article) = state.articles.first().cloned() {
        let reader = store
            .sink()
            .bind(|s: &SectionsState| s.is_reading, SectionsAction::Reader);
        tracing::info!(
            title = %article.title,
            cover = ?article.cover_image_url(),
            "Opening article"
        );
        store.send(SectionsAction::SelectArticle(article));
        settle(&store, |s| s.is_reading).await?;
        reader.set(false);
        settle(&store, |s| !s.is_reading).await?;
    }

    store.idle().await;
    store.shutdown().await;
    Ok(())
}

/// Wait for the first published state matching `predicate`
async fn settle<R, F>(
    store: &Store<R>,
    predicate: F,
) -> Result<R::State, Box<dyn std::error::Error>>
where
    R: Reducer,
    F: FnMut(&R::State) -> bool,
{
    let mut state = store.watch();
    let current = tokio::time::timeout(SETTLE_TIMEOUT, state.wait_for(predicate)).await??;
    Ok(current.clone())
}

fn log_state<S: Serialize + 'static>(store: &'static str) -> impl FnMut(&S) + Send + 'static {
    move |state: &S| match serde_json::to_string(state) {
        Ok(json) => tracing::info!(store, state = %json, "State changed"),
        Err(e) => tracing::warn!(store, error = %e, "Failed to serialize state"),
    }
}
