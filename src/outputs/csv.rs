//! Spreadsheet-compatible CSV output.
//!
//! The header comes from the column names of the first row, like a
//! spreadsheet built from a list of mappings. Cells are quoted only when
//! they contain the separator, a quote or a line break.

use itertools::Itertools;
use std::path::PathBuf;
use tokio::fs;
use tracing::{info, instrument};

use super::{Row, TabularWriter, table_path};
use crate::error::Result;

const SEP: char = ',';

#[derive(Debug, Clone)]
pub struct CsvWriter {
    dir: PathBuf,
}

impl CsvWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

fn needs_quotes(cell: &str) -> bool {
    cell.contains(SEP) || cell.contains('"') || cell.contains('\n') || cell.contains('\r')
}

fn escape(cell: &str) -> String {
    if needs_quotes(cell) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

/// Render header and rows. Values are matched to the header by position.
pub fn to_csv_string(rows: &[Row]) -> String {
    let Some(first) = rows.first() else {
        return String::new();
    };
    let mut out = String::new();
    out.push_str(&first.iter().map(|(k, _)| escape(k)).join(","));
    out.push_str("\r\n");
    for row in rows {
        out.push_str(&row.iter().map(|(_, v)| escape(v)).join(","));
        out.push_str("\r\n");
    }
    out
}

impl TabularWriter for CsvWriter {
    fn extension(&self) -> &'static str {
        "csv"
    }

    #[instrument(level = "info", skip(self, rows), fields(rows = rows.len()))]
    async fn write_rows(&self, name: &str, rows: &[Row]) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).await?;
        let path = table_path(&self.dir, name, self.extension());
        fs::write(&path, to_csv_string(rows)).await?;
        info!(path = %path.display(), "Wrote CSV");
        Ok(path)
    }
}
