//! Discord webhook delivery.
//!
//! One digest becomes one webhook message: a header line in `content` and one
//! rich embed per candidate. An empty batch still produces a message saying
//! nothing was found, so a quiet week is visible in the channel.
//!
//! # Payload
//!
//! ```json
//! { "content": "🔥 **Top 5 Trending Memes This Week** 🔥",
//!   "embeds": [ { "title": "1. ...", "url": "https://old.reddit.com/r/...",
//!                 "image": {"url": "https://i.redd.it/....jpg"},
//!                 "footer": {"text": "👍 48,213 upvotes"},
//!                 "color": 16734003 } ] }
//! ```
//!
//! # Rate Limits
//!
//! Discord answers `429` with a `Retry-After` header and a JSON
//! `retry_after` field; both are honored (capped by the retry policy).
//! 5xx and network errors back off and retry. The whole delivery is bounded
//! to the policy's attempt budget.

use crate::error::DigestError;
use crate::http::{HttpFailure, build_client};
use crate::models::Candidate;
use crate::retry::{RetryPolicy, with_backoff};
use crate::utils::{format_score, truncate_chars};
use reqwest::Client;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument};
use url::Url;

/// Discord accepts at most this many embeds per message.
pub const MAX_EMBEDS: usize = 10;

/// Discord caps embed titles at 256 characters; leave room for the rank prefix.
const TITLE_MAX_CHARS: usize = 250;

#[derive(Debug, Serialize)]
pub struct WebhookPayload {
    pub content: String,
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Serialize)]
pub struct Embed {
    pub title: String,
    pub url: String,
    pub image: EmbedImage,
    pub footer: EmbedFooter,
    pub color: u32,
}

#[derive(Debug, Serialize)]
pub struct EmbedImage {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

/// Successful delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    /// Attempts used, including the successful one.
    pub attempts: usize,
}

/// Build the message for `batch`. At most [`MAX_EMBEDS`] embeds are emitted.
pub fn build_payload(batch: &[Candidate], header: &str, color: u32) -> WebhookPayload {
    if batch.is_empty() {
        return WebhookPayload {
            content: format!("{header}\nNo image posts were found this cycle."),
            embeds: Vec::new(),
        };
    }

    let embeds = batch
        .iter()
        .take(MAX_EMBEDS)
        .enumerate()
        .map(|(i, c)| Embed {
            title: format!("{}. {}", i + 1, truncate_chars(&c.title, TITLE_MAX_CHARS)),
            url: if c.origin_url.is_empty() {
                c.media_url.clone()
            } else {
                c.origin_url.clone()
            },
            image: EmbedImage {
                url: c.media_url.clone(),
            },
            footer: EmbedFooter {
                text: format!("👍 {} upvotes", format_score(c.score)),
            },
            color,
        })
        .collect();

    WebhookPayload {
        content: header.to_string(),
        embeds,
    }
}

/// Sends digest messages to one webhook URL.
#[derive(Debug, Clone)]
pub struct DiscordWebhook {
    client: Client,
    url: Url,
    policy: RetryPolicy,
}

impl DiscordWebhook {
    pub fn new(url: Url, timeout: Duration, policy: RetryPolicy) -> Result<Self, DigestError> {
        let user_agent = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
        let client = build_client(user_agent, timeout).map_err(|e| DigestError::DeliveryFailed {
            cause: format!("could not build HTTP client: {e}"),
        })?;
        Ok(Self {
            client,
            url,
            policy,
        })
    }

    /// Post `batch` as a single message, retrying transient failures.
    #[instrument(level = "info", skip_all, fields(items = batch.len()))]
    pub async fn deliver(&self, batch: &[Candidate], header: &str, color: u32) -> Result<Ack, DigestError> {
        let payload = build_payload(batch, header, color);
        let t0 = Instant::now();
        info!(embeds = payload.embeds.len(), "Sending digest to webhook");

        match with_backoff(&self.policy, "webhook_deliver", |attempt| self.post_once(&payload, attempt)).await {
            Ok(attempts) => {
                info!(attempts, elapsed_ms = t0.elapsed().as_millis() as u64, "Digest delivered");
                Ok(Ack { attempts })
            }
            Err(failure) => {
                error!(elapsed_ms = t0.elapsed().as_millis() as u64, error = %failure, "Digest delivery failed");
                Err(DigestError::DeliveryFailed {
                    cause: failure.to_string(),
                })
            }
        }
    }

    async fn post_once(&self, payload: &WebhookPayload, attempt: usize) -> Result<usize, HttpFailure> {
        let res = self
            .client
            .post(self.url.clone())
            .json(payload)
            .send()
            .await
            .map_err(HttpFailure::network)?;

        let status = res.status();
        debug!(attempt, %status, "Webhook response");
        if status.is_success() {
            return Ok(attempt);
        }

        let headers = res.headers().clone();
        let body = match res.text().await {
            Ok(body) => body,
            Err(e) => {
                debug!(attempt, %status, error = %e, "Could not read webhook error body");
                String::new()
            }
        };
        Err(HttpFailure::status(status, &headers, &body))
    }
}
