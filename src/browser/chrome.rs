//! Live Chrome backend over the DevTools protocol.
//!
//! Launches a local Chromium (or attaches to one via a remote debugging URL)
//! with `chromiumoxide` and drives a single page.
//!
//! # Error mapping
//!
//! `chromiumoxide` reports protocol failures as strings from Chrome. A node
//! that was removed from the document surfaces as one of a few known
//! messages, which map to [`BrowserError::Stale`]. Missing elements are
//! detected with `querySelectorAll` (an empty result), never from an error.

use chromiumoxide::error::CdpError;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, BrowserConfig, Element, Page};
use futures::StreamExt;
use std::path::Path;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, instrument, warn};

use super::{BrowserControl, POLL_INTERVAL};
use crate::error::BrowserError;

/// Messages Chrome returns when a node id or object id no longer resolves.
const STALE_MARKERS: [&str; 4] = [
    "Could not find node with given id",
    "No node with given id found",
    "Cannot find context with specified id",
    "Could not find object with given id",
];

const INTERACTABLE_JS: &str = "function() { \
    const r = this.getBoundingClientRect(); \
    const s = window.getComputedStyle(this); \
    return !this.disabled && r.width > 0 && r.height > 0 && s.visibility !== 'hidden'; \
}";

/// How to obtain a browser.
#[derive(Debug, Clone)]
pub struct ChromeOptions {
    /// Attach to this DevTools endpoint instead of launching Chrome.
    pub remote_debugging_url: Option<String>,
    /// Show the browser window.
    pub headful: bool,
    /// Per-command CDP timeout.
    pub request_timeout: Duration,
}

impl Default for ChromeOptions {
    fn default() -> Self {
        Self {
            remote_debugging_url: None,
            headful: false,
            request_timeout: Duration::from_secs(30),
        }
    }
}

pub struct ChromeBrowser {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    launched: bool,
}

fn classify(err: CdpError) -> BrowserError {
    if let CdpError::Timeout = err {
        return BrowserError::Other("CDP request timed out".to_string());
    }
    let msg = err.to_string();
    if STALE_MARKERS.iter().any(|m| msg.contains(m)) {
        BrowserError::Stale
    } else {
        BrowserError::Other(msg)
    }
}

fn settle(res: Result<Vec<Element>, BrowserError>, selector: &str) -> Result<Vec<Element>, BrowserError> {
    match res {
        Err(BrowserError::Stale) => {
            debug!(selector, "Document changed during query; polling again");
            Ok(Vec::new())
        }
        other => other,
    }
}

/// One step of the `find_all` wait. `None` means poll again.
///
/// Staleness before the deadline is a document swap; after it, it is
/// reported so callers can re-enumerate.
fn settle_all<T>(
    res: Result<Vec<T>, BrowserError>,
    expired: bool,
) -> Option<Result<Vec<T>, BrowserError>> {
    match res {
        Ok(found) if !found.is_empty() || expired => Some(Ok(found)),
        Ok(_) => None,
        Err(BrowserError::Stale) if !expired => None,
        Err(e) => Some(Err(e)),
    }
}

impl ChromeBrowser {
    /// Start (or attach to) Chrome and open a blank page.
    #[instrument(level = "info", skip_all, fields(remote = opts.remote_debugging_url.is_some()))]
    pub async fn launch(opts: &ChromeOptions) -> Result<Self, BrowserError> {
        let (browser, mut handler, launched) = match &opts.remote_debugging_url {
            Some(url) => {
                info!(%url, "Connecting to remote Chrome instance");
                let (browser, handler) = Browser::connect(url).await.map_err(classify)?;
                (browser, handler, false)
            }
            None => {
                let mut builder = BrowserConfig::builder()
                    .no_sandbox()
                    .request_timeout(opts.request_timeout)
                    .arg("--disable-blink-features=AutomationControlled")
                    .arg("--disable-extensions")
                    .arg("--disable-gpu")
                    .arg("--disable-dev-shm-usage");
                if opts.headful {
                    builder = builder.with_head();
                }
                let config = builder.build().map_err(BrowserError::Other)?;
                let (browser, handler) = Browser::launch(config).await.map_err(classify)?;
                (browser, handler, true)
            }
        };

        // CDP events must be drained for commands to complete
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "CDP handler error (ignored)");
                }
            }
        });

        let page = browser.new_page("about:blank").await.map_err(classify)?;
        info!(launched, "Browser ready");

        Ok(Self {
            browser,
            page,
            handler,
            launched,
        })
    }

    /// Close the browser if this process launched it, and stop the event loop.
    #[instrument(level = "info", skip_all)]
    pub async fn close(mut self) {
        if self.launched {
            if let Err(e) = self.browser.close().await {
                warn!(error = %e, "Browser close failed");
            }
            let _ = self.browser.wait().await;
        }
        self.handler.abort();
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<Element>, BrowserError> {
        self.page.find_elements(selector).await.map_err(classify)
    }

    /// [`Self::query_all`] for the interactable wait: a document swapped out
    /// mid-query (navigation) reads as "no match yet" until the deadline.
    async fn poll_query(&self, selector: &str) -> Result<Vec<Element>, BrowserError> {
        settle(self.query_all(selector).await, selector)
    }

    async fn is_interactable(&self, element: &Element) -> Result<bool, BrowserError> {
        let ret = element
            .call_js_fn(INTERACTABLE_JS, false)
            .await
            .map_err(classify)?;
        Ok(matches!(ret.result.value, Some(serde_json::Value::Bool(true))))
    }
}

impl BrowserControl for ChromeBrowser {
    type Handle = Element;

    #[instrument(level = "info", skip(self))]
    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        self.page.goto(url).await.map_err(classify)?;
        Ok(())
    }

    async fn find_interactable(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Element, BrowserError> {
        let deadline = Instant::now() + timeout;
        loop {
            for element in self.poll_query(selector).await? {
                // the node can be replaced between query and check; keep polling
                match self.is_interactable(&element).await {
                    Ok(true) => return Ok(element),
                    Ok(false) | Err(BrowserError::Stale) => {}
                    Err(e) => return Err(e),
                }
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::timeout(selector, timeout));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn find_all(&self, selector: &str, timeout: Duration) -> Result<Vec<Element>, BrowserError> {
        let deadline = Instant::now() + timeout;
        loop {
            let expired = Instant::now() >= deadline;
            if let Some(res) = settle_all(self.query_all(selector).await, expired) {
                debug!(selector, ok = res.is_ok(), "find_all");
                return res;
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn find_child(&self, handle: &Element, selector: &str) -> Result<Element, BrowserError> {
        handle
            .find_elements(selector)
            .await
            .map_err(classify)?
            .into_iter()
            .next()
            .ok_or_else(|| BrowserError::not_found(selector))
    }

    async fn click(&self, handle: &Element) -> Result<(), BrowserError> {
        handle.click().await.map_err(classify)?;
        Ok(())
    }

    async fn type_text(&self, handle: &Element, text: &str) -> Result<(), BrowserError> {
        handle.click().await.map_err(classify)?;
        handle.type_str(text).await.map_err(classify)?;
        Ok(())
    }

    async fn select_option(&self, handle: &Element, visible_text: &str) -> Result<(), BrowserError> {
        let wanted = serde_json::to_string(visible_text)
            .map_err(|e| BrowserError::Other(e.to_string()))?;
        let js = format!(
            "function() {{ \
                const wanted = {wanted}; \
                for (const o of this.options) {{ \
                    if (o.text.trim() === wanted) {{ \
                        this.value = o.value; \
                        this.dispatchEvent(new Event('change', {{ bubbles: true }})); \
                        return true; \
                    }} \
                }} \
                return false; \
            }}"
        );
        let ret = handle.call_js_fn(js, false).await.map_err(classify)?;
        match ret.result.value {
            Some(serde_json::Value::Bool(true)) => Ok(()),
            _ => Err(BrowserError::not_found(&format!("option {visible_text:?}"))),
        }
    }

    async fn get_attribute(&self, handle: &Element, name: &str) -> Result<Option<String>, BrowserError> {
        handle.attribute(name).await.map_err(classify)
    }

    async fn text(&self, handle: &Element) -> Result<String, BrowserError> {
        let text = handle.inner_text().await.map_err(classify)?;
        Ok(text.unwrap_or_default().trim().to_string())
    }

    async fn page_source(&self) -> Result<String, BrowserError> {
        self.page.content().await.map_err(classify)
    }

    async fn save_screenshot(&self, path: &Path) -> Result<(), BrowserError> {
        let params = ScreenshotParams::builder().full_page(true).build();
        self.page
            .save_screenshot(params, path)
            .await
            .map_err(classify)?;
        Ok(())
    }
}
