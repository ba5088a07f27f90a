//! Parse one AP News result card into a [`NewsRecord`].
//!
//! Each field is looked up independently. A missing element is an expected
//! outcome with a declared default:
//!
//! | Field | Missing element gives |
//! |-------|-----------------------|
//! | title | `"Post without Title"` |
//! | description | `"Post without description"` |
//! | post_datetime | `None` (also when the stamp is not epoch millis) |
//! | image_url | `None` (also on any non-stale lookup failure) |
//!
//! Staleness is passed through untouched so the session can re-enumerate.
//! Any other lookup failure is logged with the field name and returned as an
//! error, except for the image, which is left empty instead.

use chrono::{DateTime, Local, NaiveDateTime};
use tracing::{debug, error, instrument, warn};

use super::selectors;
use crate::browser::BrowserControl;
use crate::error::{BrowserError, Result, RobotError};
use crate::models::{DESCRIPTION_NOT_FOUND, NewsRecord, TITLE_NOT_FOUND};

/// Turns result cards into records for one search phrase.
#[derive(Debug, Clone)]
pub struct ResultExtractor {
    phrase: String,
}

/// `Ok(None)` when the element is absent; other failures keep their class.
fn optional<T>(field: &'static str, res: std::result::Result<T, BrowserError>) -> Result<Option<T>> {
    match res {
        Ok(value) => Ok(Some(value)),
        Err(BrowserError::NotFound { selector }) => {
            debug!(field, %selector, "Field element missing");
            Ok(None)
        }
        Err(BrowserError::Stale) => Err(BrowserError::Stale.into()),
        Err(source) => {
            error!(field, error = %source, "Unexpected failure parsing field");
            Err(RobotError::Field { field, source })
        }
    }
}

/// Like [`optional`], but only staleness escapes; every other failure is
/// logged and read as "no value".
fn lenient<T>(field: &'static str, res: std::result::Result<T, BrowserError>) -> Result<Option<T>> {
    match res {
        Ok(value) => Ok(Some(value)),
        Err(BrowserError::Stale) => Err(BrowserError::Stale.into()),
        Err(BrowserError::NotFound { selector }) => {
            debug!(field, %selector, "Field element missing");
            Ok(None)
        }
        Err(e) => {
            warn!(field, error = %e, "Field lookup failed; leaving it empty");
            Ok(None)
        }
    }
}

/// Epoch milliseconds to local wall-clock time. `None` (logged) when `raw`
/// is not an integer or is out of range.
fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let parsed = raw
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .map(|utc| utc.with_timezone(&Local).naive_local());
    if parsed.is_none() {
        warn!(field = "post_datetime", value = %raw, "Unparseable timestamp; treating as unknown");
    }
    parsed
}

impl ResultExtractor {
    pub fn new(phrase: &str) -> Self {
        Self {
            phrase: phrase.to_string(),
        }
    }

    /// Parse one result card.
    ///
    /// # Arguments
    ///
    /// * `browser` - The browser the card was enumerated from
    /// * `card` - Handle to a `div.PageList-items-item` element
    ///
    /// # Returns
    ///
    /// A record with defaults filled in for missing fields. Fails only when
    /// the card went stale ([`RobotError::is_stale`]) or a title,
    /// description or timestamp lookup hit an unexpected browser error.
    #[instrument(level = "debug", skip_all)]
    pub async fn parse<B: BrowserControl>(&self, browser: &B, card: &B::Handle) -> Result<NewsRecord> {
        let title = optional("title", child_text(browser, card, selectors::TITLE).await)?
            .unwrap_or_else(|| TITLE_NOT_FOUND.to_string());
        debug!(%title, "Parsing card");

        let description = optional(
            "description",
            child_text(browser, card, selectors::DESCRIPTION).await,
        )?
        .unwrap_or_else(|| DESCRIPTION_NOT_FOUND.to_string());

        let post_datetime = optional(
            "post_datetime",
            child_attribute(browser, card, &[selectors::TIMESTAMP], selectors::TIMESTAMP_ATTR).await,
        )?
        .flatten()
        .and_then(|raw| parse_timestamp(&raw));

        let image_url = lenient(
            "image_url",
            child_attribute(
                browser,
                card,
                &[selectors::MEDIA, selectors::IMAGE],
                selectors::IMAGE_ATTR,
            )
            .await,
        )?
        .flatten();

        Ok(NewsRecord::new(
            title,
            description,
            post_datetime,
            image_url,
            &self.phrase,
        ))
    }
}

async fn child_text<B: BrowserControl>(
    browser: &B,
    card: &B::Handle,
    selector: &str,
) -> std::result::Result<String, BrowserError> {
    let node = browser.find_child(card, selector).await?;
    browser.text(&node).await
}

/// Follow `path` down from `card`, then read `attr` on the last element.
async fn child_attribute<B: BrowserControl>(
    browser: &B,
    card: &B::Handle,
    path: &[&str],
    attr: &str,
) -> std::result::Result<Option<String>, BrowserError> {
    let Some((first, rest)) = path.split_first() else {
        return browser.get_attribute(card, attr).await;
    };
    let mut node = browser.find_child(card, first).await?;
    for selector in rest {
        node = browser.find_child(&node, selector).await?;
    }
    browser.get_attribute(&node, attr).await
}
