//! Store configuration
//!
//! Defaults are usable as-is; `from_env` lets binaries override them the same
//! way the rest of the process is configured.

use crate::error::ConfigError;
use std::time::Duration;

pub const LABEL_VAR: &str = "ENSEMBLE_STORE_LABEL";
pub const LOG_ACTIONS_VAR: &str = "ENSEMBLE_LOG_ACTIONS";

/// Per-store settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Recorded on every log line the store emits
    pub label: String,
    /// Log each dispatched action at debug level
    pub log_actions: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            label: "store".to_string(),
            log_actions: true,
        }
    }
}

impl StoreConfig {
    /// Read overrides from `ENSEMBLE_STORE_LABEL` and `ENSEMBLE_LOG_ACTIONS`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidFlag`] if `ENSEMBLE_LOG_ACTIONS` is set to
    /// something that is not a boolean.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Ok(label) = std::env::var(LABEL_VAR) {
            config.label = label;
        }
        if let Ok(raw) = std::env::var(LOG_ACTIONS_VAR) {
            config.log_actions = parse_flag(LOG_ACTIONS_VAR, &raw)?;
        }
        Ok(config)
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub fn with_log_actions(mut self, enabled: bool) -> Self {
        self.log_actions = enabled;
        self
    }
}

/// Parse a boolean environment value
///
/// # Errors
///
/// Returns [`ConfigError::InvalidFlag`] for anything but
/// `true/false/1/0/yes/no/on/off`, case-insensitive.
pub fn parse_flag(name: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag {
            name: name.to_string(),
            value: raw.to_string(),
        }),
    }
}

/// Parse a millisecond count into a `Duration`
///
/// # Errors
///
/// Returns [`ConfigError::InvalidMillis`] if `raw` is not a non-negative integer.
pub fn parse_millis(name: &str, raw: &str) -> Result<Duration, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| ConfigError::InvalidMillis {
            name: name.to_string(),
            value: raw.to_string(),
        })
}
