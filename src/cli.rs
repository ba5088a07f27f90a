//! Command-line interface definitions for the AP News robot.
//!
//! Search criteria come from a work-item payload file, individual flags, or
//! both (flags win). Every option can also be set through the environment.

use clap::{Parser, ValueEnum};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{debug, instrument};

use crate::error::Result;
use crate::scrapers::apnews::BASE_URL;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Json,
}

/// Command-line arguments for the AP News robot.
///
/// # Examples
///
/// ```sh
/// # Defaults: "Olympic Games", current month, relevance
/// apnews_robot
///
/// # Work-item payload plus an override
/// apnews_robot --payload item.json --months 3
///
/// # Replay a saved results page without a browser
/// apnews_robot --snapshot results.html --phrase Election
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Work-item payload (JSON or YAML) with optional `phrase`, `months`, `sort_by`
    #[arg(short, long, env = "ROBOT_PAYLOAD")]
    pub payload: Option<String>,

    /// Phrase to search for
    #[arg(long, env = "ROBOT_PHRASE")]
    pub phrase: Option<String>,

    /// Number of calendar months to look back (current month = 1)
    #[arg(long, env = "ROBOT_MONTHS", allow_negative_numbers = true)]
    pub months: Option<i64>,

    /// Sort order: Relevance, Newest or Oldest
    #[arg(long, env = "ROBOT_SORT_BY")]
    pub sort_by: Option<String>,

    /// Directory for the results table, images and screenshot
    #[arg(short, long, env = "ROBOT_OUTPUT_DIR", default_value = "output")]
    pub output_dir: String,

    /// Results table format
    #[arg(short, long, value_enum, env = "ROBOT_FORMAT", default_value_t = OutputFormat::Csv)]
    pub format: OutputFormat,

    /// Site home page
    #[arg(long, env = "ROBOT_BASE_URL", default_value = BASE_URL)]
    pub base_url: String,

    /// Attach to a running Chrome instead of launching one
    #[arg(long, env = "CHROMIUM_REMOTE_DEBUGGING_URL")]
    pub remote_debugging_url: Option<String>,

    /// Show the browser window
    #[arg(long)]
    pub headful: bool,

    /// Run against a saved results page instead of a live browser
    #[arg(long, env = "ROBOT_SNAPSHOT")]
    pub snapshot: Option<String>,

    /// Save the live results page HTML to this file
    #[arg(long)]
    pub dump_html: Option<String>,

    /// Seconds to wait for each page element
    #[arg(long, env = "ROBOT_WAIT_SECS", default_value_t = 10)]
    pub wait_secs: u64,
}

impl Cli {
    /// Read the payload file (if any) and apply flag overrides.
    ///
    /// Returns `None` when neither a file nor any override was given.
    #[instrument(level = "info", skip_all)]
    pub async fn load_payload(&self) -> Result<Option<Value>> {
        let mut payload = match &self.payload {
            Some(path) => Some(read_payload(Path::new(path)).await?),
            None => None,
        };

        let overrides = [
            ("phrase", self.phrase.clone().map(Value::from)),
            ("months", self.months.map(Value::from)),
            ("sort_by", self.sort_by.clone().map(Value::from)),
        ];
        for (key, value) in overrides {
            let Some(value) = value else { continue };
            let map = payload.get_or_insert_with(|| Value::Object(Map::new()));
            if !map.is_object() {
                *map = Value::Object(Map::new());
            }
            if let Some(obj) = map.as_object_mut() {
                obj.insert(key.to_string(), value);
            }
        }

        debug!(?payload, "Resolved payload");
        Ok(payload)
    }
}

/// Parse a payload file. YAML is a superset of JSON, so both work.
pub async fn read_payload(path: &Path) -> Result<Value> {
    let text = tokio::fs::read_to_string(path).await?;
    Ok(serde_yaml::from_str::<Value>(&text)?)
}
