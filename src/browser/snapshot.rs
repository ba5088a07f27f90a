//! [`BrowserControl`] over a saved HTML page.
//!
//! A snapshot is a results page captured with `--dump-html`. Lookups run
//! against the parsed document with `scraper`; clicks, typing and option
//! selection are recorded instead of executed, since nothing re-renders.
//! Because the document never changes, waits resolve immediately.

use ego_tree::NodeId;
use itertools::Itertools;
use scraper::{ElementRef, Html, Selector};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, instrument};

use super::BrowserControl;
use crate::error::BrowserError;

/// An interaction the pipeline asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interaction {
    Goto(String),
    Click(String),
    Type { target: String, text: String },
    Select { target: String, option: String },
}

pub struct HtmlSnapshot {
    document: Html,
    interactions: Mutex<Vec<Interaction>>,
}

impl HtmlSnapshot {
    pub fn parse(html: &str) -> Self {
        Self {
            document: Html::parse_document(html),
            interactions: Mutex::new(Vec::new()),
        }
    }

    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn load(path: &Path) -> std::io::Result<Self> {
        let html = tokio::fs::read_to_string(path).await?;
        debug!(bytes = html.len(), "Loaded HTML snapshot");
        Ok(Self::parse(&html))
    }

    /// Interactions recorded so far, oldest first.
    pub fn interactions(&self) -> Vec<Interaction> {
        self.log().clone()
    }

    fn log(&self) -> std::sync::MutexGuard<'_, Vec<Interaction>> {
        self.interactions.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn element(&self, id: NodeId) -> Result<ElementRef<'_>, BrowserError> {
        self.document
            .tree
            .get(id)
            .and_then(ElementRef::wrap)
            .ok_or(BrowserError::Stale)
    }
}

fn parse_selector(selector: &str) -> Result<Selector, BrowserError> {
    Selector::parse(selector)
        .map_err(|e| BrowserError::Other(format!("invalid selector {selector:?}: {e:?}")))
}

/// Short label for an element, e.g. `button.SearchOverlay-search-button`.
fn describe(el: &ElementRef<'_>) -> String {
    let classes = el.value().classes().join(".");
    if classes.is_empty() {
        el.value().name().to_string()
    } else {
        format!("{}.{}", el.value().name(), classes)
    }
}

fn is_interactable(el: &ElementRef<'_>) -> bool {
    let value = el.value();
    value.attr("disabled").is_none() && value.attr("hidden").is_none()
}

impl BrowserControl for HtmlSnapshot {
    type Handle = NodeId;

    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        self.log().push(Interaction::Goto(url.to_string()));
        Ok(())
    }

    async fn find_interactable(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<NodeId, BrowserError> {
        let sel = parse_selector(selector)?;
        self.document
            .select(&sel)
            .find(is_interactable)
            .map(|el| el.id())
            .ok_or_else(|| BrowserError::timeout(selector, timeout))
    }

    async fn find_all(&self, selector: &str, _timeout: Duration) -> Result<Vec<NodeId>, BrowserError> {
        let sel = parse_selector(selector)?;
        Ok(self.document.select(&sel).map(|el| el.id()).collect())
    }

    async fn find_child(&self, handle: &NodeId, selector: &str) -> Result<NodeId, BrowserError> {
        let sel = parse_selector(selector)?;
        self.element(*handle)?
            .select(&sel)
            .next()
            .map(|el| el.id())
            .ok_or_else(|| BrowserError::not_found(selector))
    }

    async fn click(&self, handle: &NodeId) -> Result<(), BrowserError> {
        let target = describe(&self.element(*handle)?);
        self.log().push(Interaction::Click(target));
        Ok(())
    }

    async fn type_text(&self, handle: &NodeId, text: &str) -> Result<(), BrowserError> {
        let target = describe(&self.element(*handle)?);
        self.log().push(Interaction::Type {
            target,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn select_option(&self, handle: &NodeId, visible_text: &str) -> Result<(), BrowserError> {
        let el = self.element(*handle)?;
        let option = parse_selector("option")?;
        let known = el
            .select(&option)
            .any(|o| o.text().collect::<String>().trim() == visible_text);
        if !known {
            return Err(BrowserError::not_found(&format!("option {visible_text:?}")));
        }
        self.log().push(Interaction::Select {
            target: describe(&el),
            option: visible_text.to_string(),
        });
        Ok(())
    }

    async fn get_attribute(&self, handle: &NodeId, name: &str) -> Result<Option<String>, BrowserError> {
        Ok(self.element(*handle)?.value().attr(name).map(str::to_string))
    }

    async fn text(&self, handle: &NodeId) -> Result<String, BrowserError> {
        Ok(self.element(*handle)?.text().flat_map(str::split_whitespace).join(" "))
    }

    async fn page_source(&self) -> Result<String, BrowserError> {
        Ok(self.document.html())
    }

    async fn save_screenshot(&self, path: &Path) -> Result<(), BrowserError> {
        debug!(path = %path.display(), "Snapshot has no renderer; skipping screenshot");
        Ok(())
    }
}
