//! Error types for browser collaborators and the extraction pipeline.
//!
//! Failures are split in two layers:
//! - [`BrowserError`]: what a [`BrowserControl`](crate::browser::BrowserControl)
//!   implementation reports for a single lookup or interaction.
//! - [`RobotError`]: what the pipeline raises once it has decided a failure
//!   is fatal for a card, a search step or the whole run.
//!
//! A missing optional element ([`BrowserError::NotFound`]) never becomes a
//! [`RobotError`]; the extractor turns it into a declared default instead.

use std::time::Duration;
use thiserror::Error;

/// Failure reported by a browser collaborator.
#[derive(Debug, Clone, Error)]
pub enum BrowserError {
    /// The element is not present right now.
    #[error("element not found: {selector}")]
    NotFound { selector: String },

    /// The element never became present or interactable before the deadline.
    #[error("timed out after {timeout:?} waiting for {selector}")]
    Timeout { selector: String, timeout: Duration },

    /// A previously located element no longer belongs to the page.
    #[error("stale element reference")]
    Stale,

    #[error("browser error: {0}")]
    Other(String),
}

impl BrowserError {
    pub fn not_found(selector: &str) -> Self {
        BrowserError::NotFound {
            selector: selector.to_string(),
        }
    }

    pub fn timeout(selector: &str, timeout: Duration) -> Self {
        BrowserError::Timeout {
            selector: selector.to_string(),
            timeout,
        }
    }

    /// `true` for the two "element is not there" kinds that the banner step tolerates.
    pub fn is_absent(&self) -> bool {
        matches!(self, BrowserError::NotFound { .. } | BrowserError::Timeout { .. })
    }
}

/// Failure raised by the search pipeline.
#[derive(Debug, Error)]
pub enum RobotError {
    /// A search step (navigation, search box, sort selector, enumeration) failed.
    #[error(transparent)]
    Browser(#[from] BrowserError),

    /// Unexpected failure while reading one field of a result card.
    #[error("failed to parse field `{field}`: {source}")]
    Field {
        field: &'static str,
        #[source]
        source: BrowserError,
    },

    #[error("result cards still stale after {retries} retries: {source}")]
    StaleRetriesExhausted {
        retries: usize,
        #[source]
        source: BrowserError,
    },

    /// A session step was called before the step it depends on.
    #[error("cannot {step} while session is {state}")]
    OutOfOrder { step: &'static str, state: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl RobotError {
    /// Only staleness is retried by the batch loop; every other class is fatal.
    pub fn is_stale(&self) -> bool {
        matches!(self, RobotError::Browser(BrowserError::Stale))
    }
}

pub type Result<T> = std::result::Result<T, RobotError>;
