//! Site scrapers.
//!
//! Each scraper drives a [`crate::browser::BrowserControl`] through the
//! site's search flow and turns result cards into
//! [`crate::models::NewsRecord`]s.
//!
//! | Site | Module | Notes |
//! |------|--------|-------|
//! | AP News | [`apnews`] | Search, sort, first results page only |

pub mod apnews;
