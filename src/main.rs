//! # AP News Robot
//!
//! Searches AP News for a phrase, reads the result cards on the first
//! results page, keeps the ones published inside a recency window and
//! writes them to a spreadsheet-friendly table.
//!
//! ## Usage
//!
//! ```sh
//! apnews_robot --payload item.json -o ./output
//! ```
//!
//! ## Architecture
//!
//! 1. **Params**: resolve phrase, lookback months and sort order from the payload
//! 2. **Search**: open the site, clear the consent banner, search and sort
//! 3. **Extraction**: parse each result card, retrying the batch if cards go stale
//! 4. **Filter**: keep records inside the recency window and fetch their images
//! 5. **Output**: write the table (or a "not found" placeholder)

use clap::Parser;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod browser;
mod cli;
mod downloads;
mod error;
mod models;
mod outputs;
mod params;
mod recency;
mod scrapers;
mod utils;

use browser::chrome::{ChromeBrowser, ChromeOptions};
use browser::snapshot::HtmlSnapshot;
use cli::{Cli, OutputFormat};
use downloads::HttpImageDownloader;
use outputs::{TableWriter, csv::CsvWriter, json::JsonWriter, persist};
use params::SearchParams;
use scrapers::apnews::{RetryPolicy, SearchSession, SessionConfig};
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("apnews_robot starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let payload = args.load_payload().await?;
    let params = SearchParams::from_payload(payload.as_ref());
    info!(search_params = %params.summary(), "Search params");

    // Early check: nothing is worth scraping if the table can't be written
    if let Err(e) = ensure_writable_dir(&args.output_dir).await {
        error!(
            path = %args.output_dir,
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e.into());
    }
    let output_dir = PathBuf::from(&args.output_dir);

    let config = SessionConfig {
        base_url: args.base_url.clone(),
        wait: Duration::from_secs(args.wait_secs),
        retry: RetryPolicy::default(),
        output_dir: output_dir.clone(),
        dump_html: args.dump_html.as_ref().map(PathBuf::from),
    };
    let downloader = HttpImageDownloader::new(&args.base_url, &output_dir)?;
    debug!(images_dir = %downloader.dir().display(), "Image downloads enabled");

    let records = match &args.snapshot {
        Some(path) => {
            info!(%path, "Replaying saved results page");
            let browser = HtmlSnapshot::load(Path::new(path)).await?;
            let mut session = SearchSession::new(browser, params, config);
            let result = session.run(&downloader).await;
            debug!(interactions = ?session.browser().interactions(), "Recorded interactions");
            match result {
                Ok(records) => records,
                Err(e) => {
                    error!(error = %e, state = %session.state(), "Search run failed; no table written");
                    return Err(e.into());
                }
            }
        }
        None => {
            let opts = ChromeOptions {
                remote_debugging_url: args.remote_debugging_url.clone(),
                headful: args.headful,
                ..ChromeOptions::default()
            };
            let browser = ChromeBrowser::launch(&opts).await?;
            let mut session = SearchSession::new(browser, params, config);
            let result = session.run(&downloader).await;
            let state = session.state();
            session.into_browser().close().await;
            match result {
                Ok(records) => records,
                Err(e) => {
                    error!(error = %e, %state, "Search run failed; no table written");
                    return Err(e.into());
                }
            }
        }
    };
    info!(count = records.len(), "Records kept");

    let writer = match args.format {
        OutputFormat::Csv => TableWriter::Csv(CsvWriter::new(&output_dir)),
        OutputFormat::Json => TableWriter::Json(JsonWriter::new(&output_dir)),
    };
    let path = persist(&writer, &records).await?;

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        path = %path.display(),
        "Execution complete"
    );

    Ok(())
}
