//! JSON output of the results table.
//!
//! Writes an array of objects, one per row, keeping column order:
//!
//! ```json
//! [{ "id": "…", "title": "…", "description": "…", … }]
//! ```

use serde::ser::{Serialize, Serializer};
use std::path::PathBuf;
use tokio::fs;
use tracing::{error, info, instrument};

use super::{Row, TabularWriter, table_path};
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct JsonWriter {
    dir: PathBuf,
}

impl JsonWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

/// Serializes a row as a map in column order.
struct OrderedRow<'a>(&'a Row);

impl Serialize for OrderedRow<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(k, v)| (k, v)))
    }
}

pub fn to_json_string(rows: &[Row]) -> serde_json::Result<String> {
    let ordered: Vec<OrderedRow<'_>> = rows.iter().map(OrderedRow).collect();
    serde_json::to_string_pretty(&ordered)
}

impl TabularWriter for JsonWriter {
    fn extension(&self) -> &'static str {
        "json"
    }

    #[instrument(level = "info", skip(self, rows), fields(rows = rows.len()))]
    async fn write_rows(&self, name: &str, rows: &[Row]) -> Result<PathBuf> {
        let json = to_json_string(rows)?;

        if let Err(e) = fs::create_dir_all(&self.dir).await {
            error!(dir = %self.dir.display(), error = %e, "Failed to create JSON dir");
            return Err(e.into());
        }

        let path = table_path(&self.dir, name, self.extension());
        fs::write(&path, json).await?;
        info!(path = %path.display(), "Wrote JSON");
        Ok(path)
    }
}
