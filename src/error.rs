//! Error types
//!
//! None of these reach the dispatch pipeline: worker failures are mapped to
//! actions (or dropped) inside the scheduler, and configuration errors only
//! surface while building a [`crate::StoreConfig`].

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure of a task worker
#[derive(Debug, Error)]
#[error("{message}")]
pub struct WorkerError {
    pub message: String,
    #[source]
    source: Option<BoxError>,
}

impl WorkerError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an arbitrary error, keeping it reachable through `source()`
    #[must_use]
    pub fn from_source<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            message: error.to_string(),
            source: Some(Box::new(error)),
        }
    }
}

/// Returned by [`crate::Emitter::emit`] once the stream was finished or cancelled
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("stream worker is closed")]
pub struct StreamClosed;

/// Invalid environment configuration
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a boolean (true/false/1/0/yes/no/on/off), got {value:?}")]
    InvalidFlag { name: String, value: String },
    #[error("{name} must be a whole number of milliseconds, got {value:?}")]
    InvalidMillis { name: String, value: String },
}
