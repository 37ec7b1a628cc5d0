//! Shared HTTP plumbing for the listing fetcher and the webhook sender.
//!
//! Both sides classify failures the same way: network errors, timeouts, 429
//! and 5xx responses are transient; everything else is permanent. A 429 (or a
//! 5xx that carries one) may name its own cooldown via `Retry-After` or, for
//! Discord, a JSON `retry_after` field.

use crate::retry::{RetryHint, Retryable};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use std::fmt;
use std::time::Duration;

/// Why a single HTTP attempt failed.
#[derive(Debug)]
pub enum HttpFailure {
    /// The request never produced a response (DNS, connect, timeout, body read).
    Network(String),
    /// The server answered with a non-success status.
    Status {
        status: StatusCode,
        retry_after: Option<Duration>,
        body_snippet: String,
    },
}

impl HttpFailure {
    pub fn network(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }

    /// Build a status failure, reading any cooldown from the headers first and
    /// the body second.
    pub fn status(status: StatusCode, headers: &HeaderMap, body: &str) -> Self {
        let retry_after = retry_after_from_headers(headers).or_else(|| retry_after_from_body(body));
        Self::Status {
            status,
            retry_after,
            body_snippet: crate::utils::truncate_for_log(body, 200),
        }
    }
}

impl fmt::Display for HttpFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "network error: {msg}"),
            Self::Status {
                status,
                body_snippet,
                ..
            } if body_snippet.is_empty() => write!(f, "HTTP {status}"),
            Self::Status {
                status,
                body_snippet,
                ..
            } => write!(f, "HTTP {status}: {body_snippet}"),
        }
    }
}

impl Retryable for HttpFailure {
    fn retry_hint(&self) -> RetryHint {
        match self {
            Self::Network(_) => RetryHint::Backoff,
            Self::Status {
                status,
                retry_after,
                ..
            } if *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() => {
                match retry_after {
                    Some(cooldown) => RetryHint::After(*cooldown),
                    None => RetryHint::Backoff,
                }
            }
            Self::Status { .. } => RetryHint::Stop,
        }
    }
}

/// Build the client shared by every request of one network client.
pub fn build_client(user_agent: &str, timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder().user_agent(user_agent).timeout(timeout).build()
}

/// `Retry-After` as delta-seconds; fractional values are accepted.
fn retry_after_from_headers(h: &HeaderMap) -> Option<Duration> {
    let raw = h.get(RETRY_AFTER)?.to_str().ok()?;
    seconds_to_duration(raw.trim().parse::<f64>().ok()?)
}

/// Discord's rate-limit body: `{"message": "...", "retry_after": 0.42, "global": false}`.
fn retry_after_from_body(body: &str) -> Option<Duration> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    seconds_to_duration(value.get("retry_after")?.as_f64()?)
}

fn seconds_to_duration(secs: f64) -> Option<Duration> {
    if secs.is_finite() && secs >= 0.0 {
        Some(Duration::from_secs_f64(secs))
    } else {
        None
    }
}
