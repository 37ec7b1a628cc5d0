//! # Weekly Meme Digest
//!
//! A scheduled batch job that scrapes the week's top image posts from a list
//! of subreddits and posts them to a Discord channel through a webhook.
//!
//! ## Usage
//!
//! ```sh
//! DISCORD_WEBHOOK_URL=https://discord.com/api/webhooks/... weekly_meme_digest
//! weekly_meme_digest --config digests.yaml
//! ```
//!
//! ## Architecture
//!
//! One invocation is one cycle. For every configured digest:
//! 1. **Fetching**: download each subreddit's "top of the week" listing, in
//!    priority order, until enough posts are found
//! 2. **Parsing**: extract title, image link, permalink and score per post
//! 3. **Filtering**: keep direct image links only, drop duplicates
//! 4. **Delivery**: post one message with one embed per image
//!
//! The process exits non-zero when configuration is missing or a delivery
//! could not be completed.

use clap::Parser;
use std::process::ExitCode;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod collector;
mod config;
mod cycle;
mod error;
mod filter;
mod http;
mod models;
mod outputs;
mod retry;
mod scrapers;
mod utils;

use cli::Cli;
use config::{CycleConfig, FileConfig};
use cycle::Cycle;
use error::DigestError;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Local runs keep the webhook in .env; a missing file is fine.
    let dotenv = dotenvy::dotenv();

    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "weekly_meme_digest starting up");
    if let Ok(path) = dotenv {
        debug!(path = %path.display(), "Loaded .env");
    }

    let args = Cli::parse();
    debug!(?args.config, collections = ?args.collections, "Parsed CLI arguments");

    // ---- Configuration: validated before any network activity ----
    let file = match args.config.as_deref() {
        Some(path) => match config::load_file(path).await {
            Ok(file) => file,
            Err(e) => {
                error!(error = %e, "Could not load config file");
                return ExitCode::FAILURE;
            }
        },
        None => FileConfig::default(),
    };

    let config = match CycleConfig::resolve(file, args.overrides()) {
        Ok(config) => config,
        Err(e) => {
            match config_hint(&e) {
                Some(hint) => error!(error = %e, hint, "Configuration is incomplete"),
                None => error!(error = %e, "Configuration is not usable"),
            }
            return ExitCode::FAILURE;
        }
    };
    info!(
        digests = config.digests.len(),
        format = ?config.format,
        source_host = %config.source_host,
        "Configuration loaded"
    );

    let cycle = match Cycle::new(config) {
        Ok(cycle) => cycle,
        Err(e) => {
            error!(error = %e, "Could not set up HTTP clients");
            return ExitCode::FAILURE;
        }
    };

    // ---- Run ----
    let report = cycle.run_cycle().await;
    for digest in &report.digests {
        match &digest.delivery {
            Ok(ack) => info!(
                digest = %digest.name,
                collected = digest.collected,
                target = digest.target_count,
                attempts = ack.attempts,
                "Digest delivered"
            ),
            Err(e) => error!(digest = %digest.name, collected = digest.collected, error = %e, "Digest not delivered"),
        }
    }

    info!(
        elapsed_secs = report.elapsed.as_secs(),
        millis = report.elapsed.subsec_millis(),
        success = report.succeeded(),
        "Execution complete"
    );
    report.exit_code()
}

/// Extra guidance for the one setting that has no default.
fn config_hint(e: &DigestError) -> Option<&'static str> {
    match e {
        DigestError::ConfigMissing { field } if field == "webhook_url" => {
            Some("set DISCORD_WEBHOOK_URL or pass --webhook-url")
        }
        _ => None,
    }
}
