//! Fixtures and fakes shared by the session and extractor tests.

use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::selectors;
use crate::browser::BrowserControl;
use crate::downloads::ImageDownloader;
use crate::error::BrowserError;

/// Markup of one result card; `None` leaves the element out.
pub fn card(
    title: Option<&str>,
    description: Option<&str>,
    timestamp: Option<&str>,
    image: Option<&str>,
) -> String {
    let media = image
        .map(|src| {
            format!(r#"<div class="PagePromo-media"><a><picture><img class="Image" src="{src}"></picture></a></div>"#)
        })
        .unwrap_or_default();
    let title = title
        .map(|t| {
            format!(r#"<div class="PagePromo-title"><a><span class="PagePromoContentIcons-text">{t}</span></a></div>"#)
        })
        .unwrap_or_default();
    let description = description
        .map(|d| {
            format!(r#"<div class="PagePromo-description"><a><span class="PagePromoContentIcons-text">{d}</span></a></div>"#)
        })
        .unwrap_or_default();
    let date = timestamp
        .map(|ts| {
            format!(r#"<div class="PagePromo-date"><bsp-timestamp data-timestamp="{ts}"><span>ago</span></bsp-timestamp></div>"#)
        })
        .unwrap_or_default();

    format!(
        r#"<div class="PageList-items-item"><div class="PagePromo">{media}<div class="PagePromo-content">{title}{description}{date}</div></div></div>"#
    )
}

/// Results module holding `cards`, with no page chrome around it.
pub fn page(cards: &[String]) -> String {
    format!(
        r#"<html><body><div class="SearchResultsModule-results"><div class="PageList-items">{}</div></div></body></html>"#,
        cards.concat()
    )
}

/// Full search results page with search overlay and sort selector.
pub fn search_page(cards: &[String], with_banner: bool) -> String {
    let banner = if with_banner {
        r#"<div id="onetrust-banner-sdk"><button id="onetrust-accept-btn-handler">I Accept</button></div>"#
    } else {
        ""
    };
    format!(
        r#"<html><body>{banner}
        <div class="SearchOverlay">
          <button class="SearchOverlay-search-button">Search</button>
          <form><input class="SearchOverlay-search-input" name="q">
          <button class="SearchOverlay-search-submit" type="submit">Submit</button></form>
        </div>
        <div class="SearchFilter-sortBy"><select>
          <option value="0">Relevance</option>
          <option value="3">Newest</option>
          <option value="2">Oldest</option>
        </select></div>
        <div class="SearchResultsModule-results"><div class="PageList-items">{}</div></div>
        </body></html>"#,
        cards.concat()
    )
}

/// Decorator that makes card lookups fail.
///
/// Each enumeration of the result cards resets a lookup counter. While
/// fewer than `stale_batches` failures have been injected, the lookup
/// numbered `fail_at` within a batch fails with [`BrowserError::Stale`]
/// (or the error given to [`FlakyBrowser::failing_with`]).
pub struct FlakyBrowser<B> {
    inner: B,
    stale_batches: usize,
    fail_at: usize,
    error: BrowserError,
    injected: AtomicUsize,
    lookups: AtomicUsize,
    enumerations: AtomicUsize,
}

impl<B> FlakyBrowser<B> {
    pub fn new(inner: B, stale_batches: usize, fail_at: usize) -> Self {
        Self {
            inner,
            stale_batches,
            fail_at,
            error: BrowserError::Stale,
            injected: AtomicUsize::new(0),
            lookups: AtomicUsize::new(0),
            enumerations: AtomicUsize::new(0),
        }
    }

    /// Inject `error` instead of staleness.
    pub fn failing_with(mut self, error: BrowserError) -> Self {
        self.error = error;
        self
    }

    /// How many times the result cards were enumerated.
    pub fn enumerations(&self) -> usize {
        self.enumerations.load(Ordering::SeqCst)
    }
}

impl<B: BrowserControl> BrowserControl for FlakyBrowser<B> {
    type Handle = B::Handle;

    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        self.inner.goto(url).await
    }

    async fn find_interactable(&self, selector: &str, timeout: Duration) -> Result<Self::Handle, BrowserError> {
        self.inner.find_interactable(selector, timeout).await
    }

    async fn find_all(&self, selector: &str, timeout: Duration) -> Result<Vec<Self::Handle>, BrowserError> {
        if selector == selectors::RESULT_CARDS {
            self.enumerations.fetch_add(1, Ordering::SeqCst);
            self.lookups.store(0, Ordering::SeqCst);
        }
        self.inner.find_all(selector, timeout).await
    }

    async fn find_child(&self, handle: &Self::Handle, selector: &str) -> Result<Self::Handle, BrowserError> {
        let n = self.lookups.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.fail_at && self.injected.load(Ordering::SeqCst) < self.stale_batches {
            self.injected.fetch_add(1, Ordering::SeqCst);
            return Err(self.error.clone());
        }
        self.inner.find_child(handle, selector).await
    }

    async fn click(&self, handle: &Self::Handle) -> Result<(), BrowserError> {
        self.inner.click(handle).await
    }

    async fn type_text(&self, handle: &Self::Handle, text: &str) -> Result<(), BrowserError> {
        self.inner.type_text(handle, text).await
    }

    async fn select_option(&self, handle: &Self::Handle, visible_text: &str) -> Result<(), BrowserError> {
        self.inner.select_option(handle, visible_text).await
    }

    async fn get_attribute(&self, handle: &Self::Handle, name: &str) -> Result<Option<String>, BrowserError> {
        self.inner.get_attribute(handle, name).await
    }

    async fn text(&self, handle: &Self::Handle) -> Result<String, BrowserError> {
        self.inner.text(handle).await
    }

    async fn page_source(&self) -> Result<String, BrowserError> {
        self.inner.page_source().await
    }

    async fn save_screenshot(&self, path: &Path) -> Result<(), BrowserError> {
        self.inner.save_screenshot(path).await
    }
}

/// Decorator whose `find_child` always fails with `error` for one selector.
pub struct FailingChild<B> {
    inner: B,
    selector: &'static str,
    error: BrowserError,
}

impl<B> FailingChild<B> {
    pub fn new(inner: B, selector: &'static str, error: BrowserError) -> Self {
        Self {
            inner,
            selector,
            error,
        }
    }
}

impl<B: BrowserControl> BrowserControl for FailingChild<B> {
    type Handle = B::Handle;

    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        self.inner.goto(url).await
    }

    async fn find_interactable(&self, selector: &str, timeout: Duration) -> Result<Self::Handle, BrowserError> {
        self.inner.find_interactable(selector, timeout).await
    }

    async fn find_all(&self, selector: &str, timeout: Duration) -> Result<Vec<Self::Handle>, BrowserError> {
        self.inner.find_all(selector, timeout).await
    }

    async fn find_child(&self, handle: &Self::Handle, selector: &str) -> Result<Self::Handle, BrowserError> {
        if selector == self.selector {
            return Err(self.error.clone());
        }
        self.inner.find_child(handle, selector).await
    }

    async fn click(&self, handle: &Self::Handle) -> Result<(), BrowserError> {
        self.inner.click(handle).await
    }

    async fn type_text(&self, handle: &Self::Handle, text: &str) -> Result<(), BrowserError> {
        self.inner.type_text(handle, text).await
    }

    async fn select_option(&self, handle: &Self::Handle, visible_text: &str) -> Result<(), BrowserError> {
        self.inner.select_option(handle, visible_text).await
    }

    async fn get_attribute(&self, handle: &Self::Handle, name: &str) -> Result<Option<String>, BrowserError> {
        self.inner.get_attribute(handle, name).await
    }

    async fn text(&self, handle: &Self::Handle) -> Result<String, BrowserError> {
        self.inner.text(handle).await
    }

    async fn page_source(&self) -> Result<String, BrowserError> {
        self.inner.page_source().await
    }

    async fn save_screenshot(&self, path: &Path) -> Result<(), BrowserError> {
        self.inner.save_screenshot(path).await
    }
}

/// Downloader that only remembers what it was asked to fetch.
#[derive(Default)]
pub struct RecordingDownloader {
    calls: Mutex<Vec<(String, String)>>,
}

impl RecordingDownloader {
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

impl ImageDownloader for RecordingDownloader {
    async fn download(&self, url: &str, file_name: &str) {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), file_name.to_string()));
    }
}
