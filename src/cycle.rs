//! Cycle driver: wire the pipeline stages together for one run.
//!
//! A cycle runs every configured digest in order. For each one it collects a
//! batch through [`Collector`] and posts it through [`DiscordWebhook`]. There
//! is no concurrency and no state carried between cycles.
//!
//! # Exit Status
//!
//! The cycle succeeds when every digest was delivered, "nothing found"
//! messages included. A single failed delivery makes the whole cycle fail;
//! the remaining digests are still attempted.

use crate::collector::Collector;
use crate::config::{CycleConfig, Digest};
use crate::error::DigestError;
use crate::outputs::discord::{Ack, DiscordWebhook};
use crate::retry::RetryPolicy;
use crate::scrapers::listing::ListingParser;
use crate::scrapers::reddit::RedditClient;
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// Outcome of one digest.
#[derive(Debug)]
pub struct DigestReport {
    pub name: String,
    /// Candidates that made it into the batch.
    pub collected: usize,
    pub target_count: usize,
    pub delivery: Result<Ack, DigestError>,
}

/// Outcome of a whole cycle.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub digests: Vec<DigestReport>,
    pub elapsed: Duration,
}

impl CycleReport {
    pub fn succeeded(&self) -> bool {
        self.digests.iter().all(|d| d.delivery.is_ok())
    }

    pub fn exit_code(&self) -> ExitCode {
        if self.succeeded() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    }
}

/// Owns the validated configuration and the clients built from it.
pub struct Cycle {
    config: CycleConfig,
    source: RedditClient,
    parser: ListingParser,
    sink: DiscordWebhook,
}

impl Cycle {
    pub fn new(config: CycleConfig) -> Result<Self, DigestError> {
        let jitter_ms = (config.retry_base_delay.as_millis() as u64 / 8).min(250);
        let policy = RetryPolicy::new(3, config.retry_base_delay).with_jitter_ms(jitter_ms);

        let source = RedditClient::new(
            config.source_host.clone(),
            &config.user_agent,
            config.format,
            config.request_timeout,
            policy.clone(),
        )?;
        let parser = ListingParser::for_format(config.format, config.source_host.clone());
        let sink = DiscordWebhook::new(config.webhook_url.clone(), config.request_timeout, policy)?;

        Ok(Self {
            config,
            source,
            parser,
            sink,
        })
    }

    /// Run every digest once and report what happened.
    #[instrument(level = "info", skip_all, fields(digests = self.config.digests.len()))]
    pub async fn run_cycle(&self) -> CycleReport {
        let t0 = Instant::now();
        let mut report = CycleReport::default();

        for (i, digest) in self.config.digests.iter().enumerate() {
            if i > 0 && !self.config.message_pause.is_zero() {
                sleep(self.config.message_pause).await;
            }
            report.digests.push(self.run_digest(digest).await);
        }

        report.elapsed = t0.elapsed();
        let delivered = report.digests.iter().filter(|d| d.delivery.is_ok()).count();
        if report.succeeded() {
            info!(delivered, elapsed_ms = report.elapsed.as_millis() as u64, "Cycle complete");
        } else {
            error!(
                delivered,
                failed = report.digests.len() - delivered,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "Cycle finished with failed deliveries"
            );
        }
        report
    }

    #[instrument(level = "info", skip_all, fields(digest = %digest.name))]
    async fn run_digest(&self, digest: &Digest) -> DigestReport {
        info!(collections = ?digest.collections, target_count = digest.target_count, "Collecting digest");
        let collector = Collector::new(
            &self.source,
            &self.parser,
            &self.config.image_extensions,
            self.config.request_pause,
        );
        let batch = collector
            .collect(&digest.collections, digest.target_count, digest.per_collection_limit)
            .await;

        if batch.is_empty() {
            warn!("No image candidates found; sending a no-results notice");
        }

        let delivery = self.sink.deliver(&batch, &digest.header, digest.color).await;
        DigestReport {
            name: digest.name.clone(),
            collected: batch.len(),
            target_count: digest.target_count,
            delivery,
        }
    }
}
