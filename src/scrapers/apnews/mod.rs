//! AP News search session.
//!
//! Drives a [`BrowserControl`] through one search and collects the result
//! cards on the first results page.
//!
//! # Steps
//!
//! ```text
//! Idle ──submit_search──▶ SearchSubmitted ──apply_sort──▶ SortApplied
//!      ──load_results──▶ ResultsLoaded ──collect──▶ Completed
//! ```
//!
//! Before searching, [`SearchSession::open_site`] navigates to the home page
//! and [`SearchSession::dismiss_consent_banner`] clears the cookie banner.
//!
//! # Staleness
//!
//! Result cards are re-rendered by the page while it settles, which
//! invalidates handles taken moments earlier. When any card goes stale the
//! whole batch is dropped, the cards are enumerated again and parsing
//! restarts from the first card. See [`RetryPolicy`].

use rand::{Rng, rng};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

pub mod extractor;
pub mod selectors;
#[cfg(test)]
pub(crate) mod testing;

use crate::browser::BrowserControl;
use crate::downloads::ImageDownloader;
use crate::error::{BrowserError, Result, RobotError};
use crate::models::NewsRecord;
use crate::params::SearchParams;
use crate::recency::RecencyWindow;
use extractor::ResultExtractor;

pub const BASE_URL: &str = "https://apnews.com/";
pub const SCREENSHOT_FILE: &str = "privacy_popup_img.png";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    SearchSubmitted,
    SortApplied,
    ResultsLoaded,
    Completed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Pacing for batch re-enumeration after staleness.
///
/// The delay before retry `n` is
/// `min(base_delay * 2^(n-1), max_delay) + random(0..=jitter_ms)`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Re-enumerations allowed after the first attempt.
    pub max_retries: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter_ms: 250,
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let shift = attempt.saturating_sub(1).min(31) as u32;
        let delay = self.base_delay.saturating_mul(1 << shift).min(self.max_delay);
        let jitter_ms: u64 = rng().random_range(0..=self.jitter_ms);
        delay + Duration::from_millis(jitter_ms)
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub base_url: String,
    /// Bounded wait for every widget and for the results container.
    pub wait: Duration,
    pub retry: RetryPolicy,
    /// Where the consent-banner screenshot is written.
    pub output_dir: PathBuf,
    /// Save the results page HTML here once results load.
    pub dump_html: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            wait: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            output_dir: PathBuf::from("output"),
            dump_html: None,
        }
    }
}

/// One search run. Owns the browser for its whole lifetime.
pub struct SearchSession<B: BrowserControl> {
    browser: B,
    params: SearchParams,
    config: SessionConfig,
    state: SessionState,
}

impl<B: BrowserControl> SearchSession<B> {
    pub fn new(browser: B, params: SearchParams, config: SessionConfig) -> Self {
        Self {
            browser,
            params,
            config,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn browser(&self) -> &B {
        &self.browser
    }

    pub fn into_browser(self) -> B {
        self.browser
    }

    fn expect_state(&self, expected: SessionState, step: &'static str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(RobotError::OutOfOrder {
                step,
                state: self.state.to_string(),
            })
        }
    }

    #[instrument(level = "info", skip_all, fields(url = %self.config.base_url))]
    pub async fn open_site(&self) -> Result<()> {
        self.expect_state(SessionState::Idle, "open site")?;
        info!("Starting browser at site");
        self.browser.goto(&self.config.base_url).await?;
        Ok(())
    }

    /// Click the cookie-consent accept button if it shows up.
    ///
    /// A banner that never appears is normal and only logged. Takes a
    /// screenshot afterwards; screenshot failures are logged too.
    #[instrument(level = "info", skip_all)]
    pub async fn dismiss_consent_banner(&self) -> Result<()> {
        let accept = self
            .browser
            .find_interactable(selectors::CONSENT_ACCEPT, self.config.wait)
            .await;
        match accept {
            Ok(button) => {
                self.browser.click(&button).await?;
                info!("Dismissed consent banner");
            }
            Err(e) if e.is_absent() => {
                warn!(error = %e, "Consent banner not shown; continuing");
            }
            Err(e) => return Err(e.into()),
        }

        let shot = self.config.output_dir.join(SCREENSHOT_FILE);
        if let Err(e) = self.browser.save_screenshot(&shot).await {
            warn!(path = %shot.display(), error = %e, "Failed to save screenshot");
        }
        Ok(())
    }

    /// Open the search overlay, type the phrase and submit.
    #[instrument(level = "info", skip_all, fields(phrase = %self.params.phrase()))]
    pub async fn submit_search(&mut self) -> Result<()> {
        self.expect_state(SessionState::Idle, "submit search")?;
        let wait = self.config.wait;

        let open = self.browser.find_interactable(selectors::SEARCH_OPEN, wait).await?;
        self.browser.click(&open).await?;

        let input = self.browser.find_interactable(selectors::SEARCH_INPUT, wait).await?;
        self.browser.type_text(&input, self.params.phrase()).await?;

        let submit = self.browser.find_interactable(selectors::SEARCH_SUBMIT, wait).await?;
        self.browser.click(&submit).await?;

        self.state = SessionState::SearchSubmitted;
        info!("Search submitted");
        Ok(())
    }

    #[instrument(level = "info", skip_all, fields(sort_by = %self.params.sort_by()))]
    pub async fn apply_sort(&mut self) -> Result<()> {
        self.expect_state(SessionState::SearchSubmitted, "apply sort")?;
        let select = self
            .browser
            .find_interactable(selectors::SORT_SELECT, self.config.wait)
            .await?;
        self.browser
            .select_option(&select, self.params.sort_by().as_str())
            .await?;
        self.state = SessionState::SortApplied;
        info!("Sort order applied");
        Ok(())
    }

    /// Wait for the results container. An empty result list is fine.
    ///
    /// Returns the number of cards currently on the page.
    #[instrument(level = "info", skip_all)]
    pub async fn load_results(&mut self) -> Result<usize> {
        self.expect_state(SessionState::SortApplied, "load results")?;
        let wait = self.config.wait;
        let containers = self
            .browser
            .find_all(selectors::RESULTS_CONTAINER, wait)
            .await?;
        if containers.is_empty() {
            error!(?wait, "Results container never appeared");
            return Err(BrowserError::timeout(selectors::RESULTS_CONTAINER, wait).into());
        }
        let cards = self
            .browser
            .find_all(selectors::RESULT_CARDS, Duration::ZERO)
            .await?;
        self.state = SessionState::ResultsLoaded;
        info!(count = cards.len(), "Results loaded");

        if let Some(path) = &self.config.dump_html {
            if let Err(e) = self.dump_page(path).await {
                warn!(path = %path.display(), error = %e, "Failed to save results page");
            }
        }
        Ok(cards.len())
    }

    async fn dump_page(&self, path: &Path) -> Result<()> {
        let html = self.browser.page_source().await?;
        tokio::fs::write(path, html).await?;
        info!(path = %path.display(), "Saved results page");
        Ok(())
    }

    /// Parse every card, keep those inside `window`, and fetch their images.
    #[instrument(level = "info", skip_all, fields(start = %window.start, end = %window.end))]
    pub async fn collect<D: ImageDownloader>(
        &mut self,
        window: &RecencyWindow,
        downloader: &D,
    ) -> Result<Vec<NewsRecord>> {
        self.expect_state(SessionState::ResultsLoaded, "collect results")?;

        let parsed = self.parse_results().await?;
        let total = parsed.len();

        let mut kept = Vec::with_capacity(total);
        for record in parsed {
            if !window.contains(record.post_datetime) {
                debug!(title = %record.title, post_datetime = ?record.post_datetime, "Outside recency window");
                continue;
            }
            if let Some(url) = &record.image_url {
                downloader.download(url, &record.image_filename).await;
            }
            kept.push(record);
        }

        self.state = SessionState::Completed;
        let with_images = kept.iter().filter(|r| r.has_image()).count();
        info!(parsed = total, kept = kept.len(), with_images, "Collected results");
        Ok(kept)
    }

    /// Full run: site, banner, search, sort, results, collection.
    pub async fn run<D: ImageDownloader>(&mut self, downloader: &D) -> Result<Vec<NewsRecord>> {
        self.open_site().await?;
        self.dismiss_consent_banner().await?;
        self.submit_search().await?;
        self.apply_sort().await?;
        self.load_results().await?;
        let window = RecencyWindow::ending_now(self.params.months());
        self.collect(&window, downloader).await
    }

    /// Parse all cards, restarting the batch from scratch on staleness.
    async fn parse_results(&self) -> Result<Vec<NewsRecord>> {
        let extractor = ResultExtractor::new(self.params.phrase());
        let max = self.config.retry.max_retries;
        let mut attempt = 0usize;

        loop {
            match self.parse_batch(&extractor).await {
                Ok(records) => {
                    if attempt > 0 {
                        info!(attempt, count = records.len(), "Batch parsed after re-enumeration");
                    }
                    return Ok(records);
                }
                Err(e) if e.is_stale() => {
                    attempt += 1;
                    if attempt > max {
                        error!(attempt, max, "Result cards stayed stale; giving up");
                        return Err(RobotError::StaleRetriesExhausted {
                            retries: max,
                            source: BrowserError::Stale,
                        });
                    }
                    let delay = self.config.retry.delay_for(attempt);
                    warn!(attempt, max, ?delay, "Result cards went stale; re-enumerating");
                    sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn parse_batch(&self, extractor: &ResultExtractor) -> Result<Vec<NewsRecord>> {
        let cards = self
            .browser
            .find_all(selectors::RESULT_CARDS, Duration::ZERO)
            .await?;
        let mut records = Vec::with_capacity(cards.len());
        for card in &cards {
            records.push(extractor.parse(&self.browser, card).await?);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{FlakyBrowser, RecordingDownloader, card, page, search_page};
    use super::*;
    use crate::browser::snapshot::{HtmlSnapshot, Interaction};
    use chrono::{Local, TimeZone};
    use serde_json::json;

    fn params(payload: serde_json::Value) -> SearchParams {
        SearchParams::from_payload(Some(&payload))
    }

    fn quick_config() -> SessionConfig {
        SessionConfig {
            wait: Duration::from_millis(10),
            retry: RetryPolicy {
                max_retries: 5,
                base_delay: Duration::ZERO,
                max_delay: Duration::ZERO,
                jitter_ms: 0,
            },
            output_dir: std::env::temp_dir(),
            ..SessionConfig::default()
        }
    }

    /// Window covering all of June 2024 up to the 15th.
    fn june_window() -> RecencyWindow {
        let now = Local
            .with_ymd_and_hms(2024, 6, 15, 12, 0, 0)
            .unwrap()
            .naive_local();
        RecencyWindow::compute(1, now)
    }

    fn millis(y: i32, m: u32, d: u32) -> String {
        Local
            .with_ymd_and_hms(y, m, d, 10, 0, 0)
            .unwrap()
            .timestamp_millis()
            .to_string()
    }

    async fn loaded<B: BrowserControl>(browser: B, payload: serde_json::Value) -> SearchSession<B> {
        let mut session = SearchSession::new(browser, params(payload), quick_config());
        session.submit_search().await.unwrap();
        session.apply_sort().await.unwrap();
        session.load_results().await.unwrap();
        session
    }

    #[tokio::test]
    async fn test_search_and_sort_interactions() {
        let html = search_page(&[], true);
        let mut session = SearchSession::new(
            HtmlSnapshot::parse(&html),
            params(json!({ "phrase": "Election", "sort_by": "Newest" })),
            quick_config(),
        );
        session.open_site().await.unwrap();
        session.dismiss_consent_banner().await.unwrap();
        session.submit_search().await.unwrap();
        assert_eq!(session.state(), SessionState::SearchSubmitted);
        session.apply_sort().await.unwrap();
        assert_eq!(session.state(), SessionState::SortApplied);

        assert_eq!(
            session.browser().interactions(),
            vec![
                Interaction::Goto(BASE_URL.into()),
                Interaction::Click("button".into()),
                Interaction::Click("button.SearchOverlay-search-button".into()),
                Interaction::Type {
                    target: "input.SearchOverlay-search-input".into(),
                    text: "Election".into(),
                },
                Interaction::Click("button.SearchOverlay-search-submit".into()),
                Interaction::Select {
                    target: "select".into(),
                    option: "Newest".into(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_banner_is_tolerated() {
        let html = search_page(&[], false);
        let session = SearchSession::new(HtmlSnapshot::parse(&html), params(json!({})), quick_config());
        session.dismiss_consent_banner().await.unwrap();
        assert!(session.browser().interactions().is_empty());
    }

    #[tokio::test]
    async fn test_missing_search_box_is_fatal() {
        let html = page(&[]);
        let mut session = SearchSession::new(HtmlSnapshot::parse(&html), params(json!({})), quick_config());
        let err = session.submit_search().await.unwrap_err();
        assert!(matches!(err, RobotError::Browser(BrowserError::Timeout { .. })));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_steps_out_of_order() {
        let html = search_page(&[], false);
        let mut session = SearchSession::new(HtmlSnapshot::parse(&html), params(json!({})), quick_config());
        let err = session.apply_sort().await.unwrap_err();
        assert!(matches!(err, RobotError::OutOfOrder { step: "apply sort", .. }));
    }

    #[tokio::test]
    async fn test_empty_results_are_valid() {
        let html = search_page(&[], false);
        let mut session = loaded(HtmlSnapshot::parse(&html), json!({})).await;
        let records = session
            .collect(&june_window(), &RecordingDownloader::default())
            .await
            .unwrap();
        assert!(records.is_empty());
        assert_eq!(session.state(), SessionState::Completed);
    }

    #[tokio::test]
    async fn test_dump_html_saves_results_page() {
        let cards = [card(Some("Saved"), Some("a"), None, None)];
        let html = search_page(&cards, false);
        let path = std::env::temp_dir().join(format!("apnews_robot_dump_{}.html", uuid::Uuid::new_v4()));
        let config = SessionConfig {
            dump_html: Some(path.clone()),
            ..quick_config()
        };
        let mut session = SearchSession::new(HtmlSnapshot::parse(&html), params(json!({})), config);
        session.submit_search().await.unwrap();
        session.apply_sort().await.unwrap();
        assert_eq!(session.load_results().await.unwrap(), 1);

        let saved = std::fs::read_to_string(&path).unwrap();
        assert!(saved.contains("PageList-items-item"));
        let replay = HtmlSnapshot::parse(&saved);
        assert_eq!(
            replay.find_all(selectors::RESULT_CARDS, Duration::ZERO).await.unwrap().len(),
            1
        );
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_missing_container_is_fatal() {
        let html = search_page(&[], false).replace("SearchResultsModule-results", "Something-else");
        let mut session = SearchSession::new(HtmlSnapshot::parse(&html), params(json!({})), quick_config());
        session.submit_search().await.unwrap();
        session.apply_sort().await.unwrap();
        let err = session.load_results().await.unwrap_err();
        assert!(matches!(err, RobotError::Browser(BrowserError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_filters_by_window_and_downloads_images() {
        let cards = [
            card(Some("Recent with image"), Some("a"), Some(&millis(2024, 6, 10)), Some("https://img/1.jpg")),
            card(Some("Recent no image"), Some("b"), Some(&millis(2024, 6, 2)), None),
            card(Some("Too old"), Some("c"), Some(&millis(2024, 5, 20)), Some("https://img/2.jpg")),
            card(Some("Undated"), Some("d"), None, Some("https://img/3.jpg")),
        ];
        let html = search_page(&cards, false);
        let mut session = loaded(HtmlSnapshot::parse(&html), json!({ "phrase": "Recent" })).await;
        let downloader = RecordingDownloader::default();
        let records = session.collect(&june_window(), &downloader).await.unwrap();

        let titles: Vec<&str> = records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, ["Recent with image", "Recent no image"]);
        assert_eq!(records[0].search_phrase_occurrences, 1);
        assert_eq!(
            downloader.calls(),
            vec![("https://img/1.jpg".to_string(), records[0].image_filename.clone())]
        );
    }

    #[tokio::test]
    async fn test_stale_first_attempt_restarts_batch() {
        let cards = [
            card(Some("One"), Some("a"), Some(&millis(2024, 6, 3)), Some("https://img/1.jpg")),
            card(Some("Two"), Some("b"), Some(&millis(2024, 6, 4)), Some("https://img/2.jpg")),
            card(Some("Three"), Some("c"), Some(&millis(2024, 6, 5)), Some("https://img/3.jpg")),
        ];
        let html = search_page(&cards, false);
        // card one takes five lookups; the sixth (card two's title) goes stale
        let browser = FlakyBrowser::new(HtmlSnapshot::parse(&html), 1, 6);
        let mut session = loaded(browser, json!({})).await;
        let downloader = RecordingDownloader::default();
        let records = session.collect(&june_window(), &downloader).await.unwrap();

        let titles: Vec<&str> = records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, ["One", "Two", "Three"]);
        // one enumeration in load_results, one failed batch, one clean batch
        assert_eq!(session.browser().enumerations(), 3);
        assert_eq!(downloader.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_stale_beyond_budget_is_fatal() {
        let cards = [card(Some("One"), Some("a"), Some(&millis(2024, 6, 3)), None)];
        let html = search_page(&cards, false);
        let browser = FlakyBrowser::new(HtmlSnapshot::parse(&html), usize::MAX, 1);
        let mut session = loaded(browser, json!({})).await;
        let downloader = RecordingDownloader::default();
        let err = session.collect(&june_window(), &downloader).await.unwrap_err();

        assert!(matches!(err, RobotError::StaleRetriesExhausted { retries: 5, .. }));
        // load_results + first attempt + five retries
        assert_eq!(session.browser().enumerations(), 7);
        assert!(downloader.calls().is_empty());
        assert_eq!(session.state(), SessionState::ResultsLoaded);
    }

    #[tokio::test]
    async fn test_stale_within_budget_recovers() {
        let cards = [card(Some("One"), Some("a"), Some(&millis(2024, 6, 3)), None)];
        let html = search_page(&cards, false);
        let browser = FlakyBrowser::new(HtmlSnapshot::parse(&html), 5, 1);
        let mut session = loaded(browser, json!({})).await;
        let records = session
            .collect(&june_window(), &RecordingDownloader::default())
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn test_unparseable_stamp_drops_only_that_card() {
        let cards = [
            card(Some("Dated"), Some("a"), Some(&millis(2024, 6, 10)), None),
            card(Some("Blank stamp"), Some("b"), Some(""), Some("https://img/2.jpg")),
            card(Some("Garbage stamp"), Some("c"), Some("soon"), None),
        ];
        let html = search_page(&cards, false);
        let mut session = loaded(HtmlSnapshot::parse(&html), json!({})).await;
        let downloader = RecordingDownloader::default();
        let records = session.collect(&june_window(), &downloader).await.unwrap();

        let titles: Vec<&str> = records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, ["Dated"]);
        assert!(downloader.calls().is_empty());
        assert_eq!(session.state(), SessionState::Completed);
    }

    #[tokio::test]
    async fn test_unexpected_card_failure_is_not_retried() {
        let cards = [
            card(Some("One"), Some("a"), Some(&millis(2024, 6, 3)), None),
            card(Some("Two"), Some("b"), Some(&millis(2024, 6, 4)), None),
        ];
        let html = search_page(&cards, false);
        // first lookup of every batch is card one's title
        let browser = FlakyBrowser::new(HtmlSnapshot::parse(&html), 1, 1)
            .failing_with(BrowserError::Other("socket closed".into()));
        let mut session = loaded(browser, json!({})).await;
        let downloader = RecordingDownloader::default();
        let err = session.collect(&june_window(), &downloader).await.unwrap_err();

        assert!(matches!(err, RobotError::Field { field: "title", .. }));
        assert!(!err.is_stale());
        // load_results + the single failed batch
        assert_eq!(session.browser().enumerations(), 2);
        assert!(downloader.calls().is_empty());
        assert_eq!(session.state(), SessionState::ResultsLoaded);
    }

    #[test]
    fn test_retry_delay_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(2),
            jitter_ms: 0,
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2), Duration::from_secs(1));
        assert_eq!(policy.delay_for(3), Duration::from_secs(2));
        assert_eq!(policy.delay_for(10), Duration::from_secs(2));
    }

    #[test]
    fn test_retry_jitter_bounded() {
        let policy = RetryPolicy {
            jitter_ms: 250,
            ..RetryPolicy::default()
        };
        for _ in 0..20 {
            let d = policy.delay_for(1);
            assert!(d >= Duration::from_millis(500) && d <= Duration::from_millis(750));
        }
    }
}
