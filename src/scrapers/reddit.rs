//! Reddit listing fetcher.
//!
//! Requests the "top of the week" view of one subreddit from the legacy
//! markup mirror (`https://old.reddit.com` by default), which still renders
//! every post server-side. Reddit refuses requests without a browser-like
//! `User-Agent`, so one is always sent.
//!
//! # Failure Handling
//!
//! | Response | Outcome |
//! |----------|---------|
//! | 2xx | body returned |
//! | 404 / 410 | empty body: the collection simply has no content |
//! | other 4xx | [`DigestError::FetchFailed`] at once |
//! | 429 / 5xx / network error | retried, then [`DigestError::FetchFailed`] |

use crate::error::DigestError;
use crate::http::{HttpFailure, build_client};
use crate::retry::{RetryPolicy, with_backoff};
use crate::scrapers::{ListingSource, SourceFormat};
use reqwest::{Client, StatusCode};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Browser identity sent when none is configured.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Blocking-free, stateless client for subreddit listings.
#[derive(Debug, Clone)]
pub struct RedditClient {
    client: Client,
    host: Url,
    format: SourceFormat,
    policy: RetryPolicy,
}

impl RedditClient {
    pub fn new(
        host: Url,
        user_agent: &str,
        format: SourceFormat,
        timeout: Duration,
        policy: RetryPolicy,
    ) -> Result<Self, DigestError> {
        let client = build_client(user_agent, timeout)
            .map_err(|e| DigestError::config_invalid("user_agent", e.to_string()))?;
        Ok(Self {
            client,
            host,
            format,
            policy,
        })
    }

    /// The listing URL for `collection`, percent-encoding the name.
    pub fn listing_url(&self, collection: &str) -> Result<Url, DigestError> {
        let host = self.host.as_str().trim_end_matches('/');
        let name = urlencoding::encode(collection.trim());
        let raw = match self.format {
            SourceFormat::Html => format!("{host}/r/{name}/top/?t=week"),
            SourceFormat::Atom => format!("{host}/r/{name}/top/.rss?t=week&limit=50"),
        };
        Url::parse(&raw).map_err(|e| DigestError::FetchFailed {
            collection: collection.to_string(),
            cause: format!("bad listing URL {raw}: {e}"),
        })
    }

    async fn fetch_once(&self, url: &Url, attempt: usize) -> Result<String, HttpFailure> {
        let t0 = Instant::now();
        let res = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(HttpFailure::network)?;

        let status = res.status();
        let headers = res.headers().clone();
        let body = res.text().await.map_err(HttpFailure::network)?;
        debug!(%url, attempt, %status, bytes = body.len(), elapsed_ms = t0.elapsed().as_millis() as u64, "Listing response");

        if status.is_success() {
            return Ok(body);
        }
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            info!(%url, %status, "Collection not found; treating as empty");
            return Ok(String::new());
        }
        Err(HttpFailure::status(status, &headers, &body))
    }
}

impl ListingSource for RedditClient {
    #[instrument(level = "info", skip(self), fields(format = ?self.format))]
    async fn fetch(&self, collection: &str) -> Result<String, DigestError> {
        let url = self.listing_url(collection)?;
        match with_backoff(&self.policy, "listing_fetch", |attempt| self.fetch_once(&url, attempt)).await {
            Ok(body) => {
                info!(%url, bytes = body.len(), "Fetched listing");
                Ok(body)
            }
            Err(failure) => {
                warn!(%url, error = %failure, "Giving up on listing");
                Err(DigestError::FetchFailed {
                    collection: collection.to_string(),
                    cause: failure.to_string(),
                })
            }
        }
    }
}
