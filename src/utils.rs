//! Text analysis helpers and file system checks.
//!
//! - Currency detection and phrase counting used for the derived record fields
//! - Output directory validation

use once_cell::sync::Lazy;
use regex::Regex;
use std::fs as stdfs;
use std::io;
use tokio::fs;
use tracing::{info, instrument};

/// US-style currency amounts: `$11.1`, `$111,111.11`, `11 dollars`, `11 USD`.
///
/// Checked in order; the first match short-circuits.
static MONEY_PATTERNS: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        Regex::new(r"\$\d{1,3}(?:,\d{3})*(?:\.\d{2})?").unwrap(),
        Regex::new(r"\b\d{1,3}(?:,\d{3})*(?:\.\d{2})? dollars\b").unwrap(),
        Regex::new(r"\b\d{1,3}(?:,\d{3})*(?:\.\d{2})? USD\b").unwrap(),
    ]
});

/// Returns `true` if `text` mentions an amount of money.
///
/// # Examples
///
/// ```ignore
/// assert!(contains_money_value("Price: $1,200.50"));
/// assert!(contains_money_value("costs 500 dollars"));
/// assert!(!contains_money_value("no money here"));
/// ```
pub fn contains_money_value(text: &str) -> bool {
    MONEY_PATTERNS.iter().any(|re| re.is_match(text))
}

/// Count non-overlapping, case-sensitive occurrences of `needle` in `haystack`.
///
/// An empty needle counts as zero occurrences.
pub fn count_occurrences(needle: &str, haystack: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    haystack.matches(needle).count()
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then writes and removes a marker file.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> io::Result<()> {
    fs::create_dir_all(path).await?;
    let marker_path = format!("{}/.apnews_robot_write_check", path.trim_end_matches('/'));
    stdfs::File::create(&marker_path)?;
    let _ = stdfs::remove_file(&marker_path);
    info!("Output directory is writable");
    Ok(())
}
