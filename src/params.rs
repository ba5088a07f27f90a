//! Search criteria resolved from a work-item payload.
//!
//! The payload is a loose key/value mapping:
//!
//! ```json
//! { "phrase": "Olympic Games", "months": 2, "sort_by": "Newest" }
//! ```
//!
//! Every key is optional and may carry garbage. [`SearchParams`] keeps the
//! raw values and resolves each accessor against its default, so callers
//! always see a usable value.

use serde::Serialize;
use serde_json::{Value, json};
use std::fmt;

pub const DEFAULT_PHRASE: &str = "Olympic Games";
pub const DEFAULT_MONTHS: u32 = 1;

/// Result ordering offered by the site's sort selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SortOrder {
    #[default]
    Relevance,
    Newest,
    Oldest,
}

impl SortOrder {
    /// The option label shown in the sort selector.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Relevance => "Relevance",
            SortOrder::Newest => "Newest",
            SortOrder::Oldest => "Oldest",
        }
    }

    /// Exact, case-sensitive match on the option label.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Relevance" => Some(SortOrder::Relevance),
            "Newest" => Some(SortOrder::Newest),
            "Oldest" => Some(SortOrder::Oldest),
            _ => None,
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Search criteria with defaults applied on read.
#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    phrase: Option<String>,
    months: Option<i64>,
    sort_by: Option<String>,
}

/// Integer month counts only; integers beyond `i64` saturate.
fn months_value(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_u64().map(|m| i64::try_from(m).unwrap_or(i64::MAX)))
}

impl SearchParams {
    /// Build from a raw payload. Never fails: a missing payload, a non-object
    /// payload, or keys of the wrong type all fall back to defaults.
    pub fn from_payload(payload: Option<&Value>) -> Self {
        let Some(map) = payload.and_then(Value::as_object) else {
            return Self::default();
        };
        Self {
            phrase: map.get("phrase").and_then(Value::as_str).map(str::to_string),
            months: map.get("months").and_then(months_value),
            sort_by: map.get("sort_by").and_then(Value::as_str).map(str::to_string),
        }
    }

    /// The phrase to search for. Blank input yields [`DEFAULT_PHRASE`];
    /// anything else is returned untrimmed.
    pub fn phrase(&self) -> &str {
        match self.phrase.as_deref() {
            Some(p) if !p.trim().is_empty() => p,
            _ => DEFAULT_PHRASE,
        }
    }

    /// Lookback window in calendar months, always `>= 1`.
    ///
    /// Values above `u32::MAX` saturate.
    pub fn months(&self) -> u32 {
        match self.months {
            Some(m) if m >= 1 => u32::try_from(m).unwrap_or(u32::MAX),
            _ => DEFAULT_MONTHS,
        }
    }

    pub fn sort_by(&self) -> SortOrder {
        self.sort_by
            .as_deref()
            .and_then(SortOrder::from_label)
            .unwrap_or_default()
    }

    /// The resolved criteria as a mapping, for logging.
    pub fn summary(&self) -> Value {
        json!({
            "phrase": self.phrase(),
            "months": self.months(),
            "sort_by": self.sort_by().as_str(),
        })
    }
}
