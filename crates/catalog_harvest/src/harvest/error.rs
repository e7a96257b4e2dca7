//! Error types for the catalogue harvest.

use thiserror::Error;

/// Errors that can occur while harvesting the catalogue.
#[derive(Debug, Error, Clone)]
pub enum HarvestError {
    /// Network/HTTP request failed before a response arrived
    #[error("Network error fetching {url}: {message}")]
    Network { url: String, message: String },

    /// Server answered with a non-success status
    #[error("{url} returned status {status}")]
    HttpStatus { url: String, status: u16 },

    /// An expected page region is missing (e.g. no content container)
    #[error("Unexpected page structure at {url}: {message}")]
    Structure { url: String, message: String },

    /// A list label did not have the `<CODE> - <Name>` shape
    #[error("Malformed label {label:?}")]
    MalformedLabel { label: String },

    /// URL parsing/construction failed
    #[error("URL error: {message}")]
    UrlError { message: String },

    /// Reading or writing a snapshot failed
    #[error("Snapshot {name} failed: {message}")]
    Snapshot { name: String, message: String },

    /// The configuration is unusable
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    /// A stage skipped more items than the configured ceiling allows
    #[error("Stage {stage} skipped {skipped} items (limit {limit})")]
    SkipLimitExceeded {
        stage: String,
        skipped: usize,
        limit: usize,
    },
}

impl HarvestError {
    /// Returns true if this error is potentially transient and retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            HarvestError::Network { .. } => true,
            HarvestError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Builds a snapshot error for the record set `name`.
    pub(crate) fn snapshot(name: &str, err: impl std::fmt::Display) -> Self {
        HarvestError::Snapshot {
            name: name.to_string(),
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for HarvestError {
    fn from(err: reqwest::Error) -> Self {
        HarvestError::Network {
            url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            message: err.to_string(),
        }
    }
}

impl From<url::ParseError> for HarvestError {
    fn from(err: url::ParseError) -> Self {
        HarvestError::UrlError {
            message: err.to_string(),
        }
    }
}
