//! News sections and the provider that fetches their stories

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Home,
    Arts,
    Science,
    UnitedStates,
    World,
    Technology,
    Business,
}

impl Section {
    pub const ALL: [Section; 7] = [
        Section::Home,
        Section::Arts,
        Section::Science,
        Section::UnitedStates,
        Section::World,
        Section::Technology,
        Section::Business,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Section::Home => "Home",
            Section::Arts => "Arts",
            Section::Science => "Science",
            Section::UnitedStates => "United States",
            Section::World => "World",
            Section::Technology => "Technology",
            Section::Business => "Business",
        }
    }

    /// Feed name used by the upstream API
    pub fn slug(self) -> &'static str {
        match self {
            Section::Home => "home",
            Section::Arts => "arts",
            Section::Science => "science",
            Section::UnitedStates => "us",
            Section::World => "world",
            Section::Technology => "technology",
            Section::Business => "business",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Multimedia {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub section: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub summary: String,
    pub url: String,
    #[serde(default)]
    pub multimedia: Option<Vec<Multimedia>>,
}

impl Article {
    /// Placeholder entries in the feed have no link or no title
    pub fn is_presentable(&self) -> bool {
        self.url != "null" && !self.title.is_empty()
    }

    /// The feed lists a thumbnail first; the cover is the second rendition
    pub fn cover_image_url(&self) -> Option<&str> {
        self.multimedia
            .as_ref()
            .and_then(|media| media.get(1))
            .map(|media| media.url.as_str())
    }
}

// Two entries are the same story when they link to the same page
impl PartialEq for Article {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
    }
}

impl Eq for Article {}

/// Envelope of every feed response
#[derive(Debug, Deserialize)]
pub struct Feed<T> {
    pub results: T,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("no stories published in {0}")]
    Empty(&'static str),
    #[error("malformed feed: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Source of articles for a section
#[async_trait]
pub trait SectionProvider: Send + Sync {
    async fn fetch(&self, section: Section) -> Result<Vec<Article>, ProviderError>;
}

/// Serves a bundled feed after a fixed delay
pub struct CannedProvider {
    delay: Duration,
    feed: &'static str,
}

impl CannedProvider {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            feed: FEED,
        }
    }

    #[cfg(test)]
    pub fn with_feed(delay: Duration, feed: &'static str) -> Self {
        Self { delay, feed }
    }
}

#[async_trait]
impl SectionProvider for CannedProvider {
    async fn fetch(&self, section: Section) -> Result<Vec<Article>, ProviderError> {
        tokio::time::sleep(self.delay).await;

        let feed: Feed<Vec<Article>> = serde_json::from_str(self.feed)?;
        let articles: Vec<Article> = feed
            .results
            .into_iter()
            .filter(|article| article.section == section.slug())
            .collect();

        tracing::debug!(section = section.slug(), count = articles.len(), "Fetched section");

        if articles.is_empty() {
            return Err(ProviderError::Empty(section.title()));
        }
        Ok(articles)
    }
}

const FEED: &str = r#"{
  "results": [
    {
      "section": "home",
      "title": "City Council Approves Riverside Park Expansion",
      "abstract": "The plan adds twelve acres of green space along the waterfront.",
      "url": "https://news.example.com/home/riverside-park",
      "multimedia": [
        {"url": "https://static.example.com/riverside-thumb.jpg"},
        {"url": "https://static.example.com/riverside-cover.jpg"}
      ]
    },
    {
      "section": "home",
      "title": "",
      "abstract": "Untitled placeholder.",
      "url": "https://news.example.com/home/placeholder"
    },
    {
      "section": "home",
      "title": "Morning Briefing",
      "abstract": "What you need to know today.",
      "url": "https://news.example.com/home/briefing"
    },
    {
      "section": "arts",
      "title": "A Retrospective Returns to the Modern Wing",
      "abstract": "Forty years of work, hung in the order it was made.",
      "url": "https://news.example.com/arts/retrospective"
    },
    {
      "section": "arts",
      "title": "Sponsored",
      "abstract": "",
      "url": "null"
    },
    {
      "section": "us",
      "title": "Rail Line Reopens After Two-Year Rebuild",
      "abstract": "Commuters get back a direct route between the two cities.",
      "url": "https://news.example.com/us/rail-line"
    },
    {
      "section": "world",
      "title": "Coastal Nations Sign Fisheries Pact",
      "abstract": "The agreement sets shared quotas for the next decade.",
      "url": "https://news.example.com/world/fisheries"
    },
    {
      "section": "world",
      "title": "Harvest Festival Draws Record Crowds",
      "abstract": "Organisers counted more visitors than in any prior year.",
      "url": "https://news.example.com/world/harvest"
    },
    {
      "section": "technology",
      "title": "Chipmakers Bet on Smaller, Cooler Designs",
      "abstract": "Power budgets, not clock speed, now drive the roadmap.",
      "url": "https://news.example.com/technology/chips"
    },
    {
      "section": "business",
      "title": "Regional Banks Report Steady Quarter",
      "abstract": "Deposits held flat while lending edged up.",
      "url": "https://news.example.com/business/banks"
    }
  ]
}"#;
