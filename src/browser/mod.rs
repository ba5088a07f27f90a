//! Browser capability used by the search pipeline.
//!
//! The pipeline never talks to a browser library directly. It drives a
//! [`BrowserControl`] implementation, which keeps it testable without a
//! running Chrome.
//!
//! # Implementations
//!
//! | Backend | Module | Notes |
//! |---------|--------|-------|
//! | Live Chrome | [`chrome`] | CDP via `chromiumoxide`; launches or attaches |
//! | Saved page | [`snapshot`] | Static HTML via `scraper`; interactions are recorded |
//!
//! # Waiting
//!
//! Lookups that take a `timeout` poll until the deadline and then fail with
//! [`BrowserError::Timeout`]. Lookups without one answer immediately and fail
//! with [`BrowserError::NotFound`].

use std::path::Path;
use std::time::Duration;

use crate::error::BrowserError;

pub mod chrome;
pub mod snapshot;

/// Interval between polls while waiting on an element.
pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Narrow browser-automation interface.
///
/// `Handle` is an opaque reference to an element on the current page. It can
/// go stale when the page re-renders; operations on a stale handle fail with
/// [`BrowserError::Stale`].
pub trait BrowserControl {
    type Handle;

    /// Navigate the session to `url`.
    async fn goto(&self, url: &str) -> Result<(), BrowserError>;

    /// Wait until an element matching `selector` is visible and enabled.
    async fn find_interactable(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Self::Handle, BrowserError>;

    /// Wait for `selector` to match at least once, then return every match.
    ///
    /// Returns an empty list if nothing matches before the deadline.
    async fn find_all(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Vec<Self::Handle>, BrowserError>;

    /// First descendant of `handle` matching `selector`.
    async fn find_child(
        &self,
        handle: &Self::Handle,
        selector: &str,
    ) -> Result<Self::Handle, BrowserError>;

    async fn click(&self, handle: &Self::Handle) -> Result<(), BrowserError>;

    async fn type_text(&self, handle: &Self::Handle, text: &str) -> Result<(), BrowserError>;

    /// Pick the `<option>` whose visible text equals `visible_text`.
    async fn select_option(
        &self,
        handle: &Self::Handle,
        visible_text: &str,
    ) -> Result<(), BrowserError>;

    async fn get_attribute(
        &self,
        handle: &Self::Handle,
        name: &str,
    ) -> Result<Option<String>, BrowserError>;

    /// Rendered text content of the element.
    async fn text(&self, handle: &Self::Handle) -> Result<String, BrowserError>;

    /// Full HTML of the current page.
    async fn page_source(&self) -> Result<String, BrowserError>;

    async fn save_screenshot(&self, path: &Path) -> Result<(), BrowserError>;
}
