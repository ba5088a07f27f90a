//! Tabular output of collected records.
//!
//! Records are flattened into rows of `(column, value)` pairs and handed to
//! a [`TabularWriter`]. A run that kept nothing still produces a table: a
//! single placeholder row `{"results": "not found"}`.
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── news.csv              # populated run
//! ├── news_not_found.csv    # placeholder run
//! ├── privacy_popup_img.png
//! └── images/
//!     └── <record id>.webp
//! ```

use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

use crate::error::Result;
use crate::models::NewsRecord;

pub mod csv;
pub mod json;

/// One table row: ordered `(column, value)` pairs.
pub type Row = Vec<(String, String)>;

pub const RESULTS_FILE: &str = "news";
pub const NOT_FOUND_FILE: &str = "news_not_found";

/// Writes rows to `<dir>/<name>.<extension>`.
pub trait TabularWriter {
    fn extension(&self) -> &'static str;

    /// Create (or truncate) the file and write a header plus `rows`.
    /// Returns the path written.
    async fn write_rows(&self, name: &str, rows: &[Row]) -> Result<PathBuf>;
}

/// The writers selectable from the command line.
#[derive(Debug, Clone)]
pub enum TableWriter {
    Csv(csv::CsvWriter),
    Json(json::JsonWriter),
}

impl TabularWriter for TableWriter {
    fn extension(&self) -> &'static str {
        match self {
            TableWriter::Csv(w) => w.extension(),
            TableWriter::Json(w) => w.extension(),
        }
    }

    async fn write_rows(&self, name: &str, rows: &[Row]) -> Result<PathBuf> {
        match self {
            TableWriter::Csv(w) => w.write_rows(name, rows).await,
            TableWriter::Json(w) => w.write_rows(name, rows).await,
        }
    }
}

/// The row written when no record survived.
pub fn not_found_row() -> Row {
    vec![("results".to_string(), "not found".to_string())]
}

/// Write `records`, or the placeholder table when there are none.
///
/// # Arguments
///
/// * `writer` - Destination format and directory
/// * `records` - Records that survived the recency filter, in page order
///
/// # Returns
///
/// The path written: `news.<ext>` with one row per record, or
/// `news_not_found.<ext>` holding the single `results: not found` row.
/// Fails if the directory or file cannot be written.
#[instrument(level = "info", skip_all, fields(count = records.len()))]
pub async fn persist<W: TabularWriter>(writer: &W, records: &[NewsRecord]) -> Result<PathBuf> {
    let path = if records.is_empty() {
        warn!("No results kept; writing placeholder table");
        writer.write_rows(NOT_FOUND_FILE, &[not_found_row()]).await?
    } else {
        let rows: Vec<Row> = records.iter().map(NewsRecord::to_row).collect();
        writer.write_rows(RESULTS_FILE, &rows).await?
    };
    info!(path = %path.display(), "Wrote results table");
    Ok(path)
}

pub(crate) fn table_path(dir: &Path, name: &str, extension: &str) -> PathBuf {
    dir.join(format!("{name}.{extension}"))
}
