//! Sections store: per-section article fetch plus a live headline ticker

mod provider;

pub use provider::{Article, CannedProvider, Section, SectionProvider};

use ensemble::{Priority, Reducer, Worker};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

const FETCH_ID: &str = "section-fetch";
const LIVE_ID: &str = "live-headlines";
const HEADLINE_HISTORY: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionsAction {
    SelectSection(Section),
    Articles(Vec<Article>),
    FetchFailed(String),
    SelectArticle(Article),
    Reader(bool),
    StartLive,
    StopLive,
    Headline(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionsState {
    pub articles: Vec<Article>,
    pub is_fetching: bool,
    pub is_reading: bool,
    pub selected_article: Option<Article>,
    pub selected_section: Section,
    pub error: Option<String>,
    pub is_live: bool,
    pub headlines: Vec<String>,
}

pub struct SectionsStore {
    provider: Arc<dyn SectionProvider>,
    headline_interval: Duration,
}

impl SectionsStore {
    pub fn new(provider: Arc<dyn SectionProvider>, headline_interval: Duration) -> Self {
        Self {
            provider,
            headline_interval,
        }
    }

    fn fetch(&self, section: Section) -> Worker<SectionsAction> {
        let provider = Arc::clone(&self.provider);
        Worker::try_task(async move {
            provider
                .fetch(section)
                .await
                .map(SectionsAction::Articles)
        })
        .with_id(FETCH_ID)
        .with_priority(Priority::High)
        .on_error(|e| SectionsAction::FetchFailed(e.message))
    }

    /// Cycle through `titles` forever, one every `interval`
    fn ticker(titles: Vec<String>, interval: Duration) -> Worker<SectionsAction> {
        Worker::stream(move |emitter| async move {
            for title in titles.into_iter().cycle() {
                tokio::select! {
                    () = emitter.cancelled() => return,
                    () = tokio::time::sleep(interval) => {}
                }
                if emitter.emit(SectionsAction::Headline(title)).is_err() {
                    return;
                }
            }
        })
        .with_id(LIVE_ID)
        .with_priority(Priority::Low)
    }
}

impl Reducer for SectionsStore {
    type Action = SectionsAction;
    type State = SectionsState;

    fn initial_state(&self) -> SectionsState {
        SectionsState {
            articles: Vec::new(),
            is_fetching: false,
            is_reading: false,
            selected_article: None,
            selected_section: Section::Home,
            error: None,
            is_live: false,
            headlines: Vec::new(),
        }
    }

    fn reduce(&self, state: &mut SectionsState, action: SectionsAction) -> Worker<SectionsAction> {
        match action {
            SectionsAction::SelectSection(section) => {
                state.selected_section = section;
                state.is_fetching = true;
                state.error = None;
                return self.fetch(section);
            }
            SectionsAction::Articles(articles) => {
                state.is_fetching = false;
                state.articles = articles
                    .into_iter()
                    .filter(Article::is_presentable)
                    .collect();
            }
            SectionsAction::FetchFailed(message) => {
                state.is_fetching = false;
                state.articles.clear();
                state.error = Some(message);
            }
            SectionsAction::SelectArticle(article) => {
                state.selected_article = Some(article);
                state.is_reading = true;
            }
            SectionsAction::Reader(open) => state.is_reading = open,
            SectionsAction::StartLive => {
                state.is_live = true;
                let titles = state.articles.iter().map(|a| a.title.clone()).collect();
                return Self::ticker(titles, self.headline_interval);
            }
            SectionsAction::StopLive => {
                state.is_live = false;
                return Worker::cancel(LIVE_ID);
            }
            SectionsAction::Headline(title) => {
                state.headlines.push(title);
                if state.headlines.len() > HEADLINE_HISTORY {
                    state.headlines.remove(0);
                }
            }
        }
        Worker::none()
    }
}
