//! Error kinds surfaced by the digest pipeline.
//!
//! Only two kinds ever fail a cycle: [`DigestError::DeliveryFailed`] once the
//! webhook retries are exhausted, and the configuration variants, which are
//! raised before any network activity. [`DigestError::FetchFailed`] is absorbed
//! by the collector and only logged.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DigestError {
    /// A listing could not be fetched after every attempt.
    #[error("failed to fetch r/{collection}: {cause}")]
    FetchFailed { collection: String, cause: String },

    /// The webhook rejected the message or never answered successfully.
    #[error("failed to deliver digest: {cause}")]
    DeliveryFailed { cause: String },

    /// A required setting was not supplied.
    #[error("missing required configuration: {field}")]
    ConfigMissing { field: String },

    /// A setting was supplied but cannot be used.
    #[error("invalid configuration for {field}: {reason}")]
    ConfigInvalid { field: String, reason: String },
}

impl DigestError {
    pub fn config_missing(field: impl Into<String>) -> Self {
        Self::ConfigMissing {
            field: field.into(),
        }
    }

    pub fn config_invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let e = DigestError::FetchFailed {
            collection: "memes".into(),
            cause: "HTTP 503".into(),
        };
        assert_eq!(e.to_string(), "failed to fetch r/memes: HTTP 503");

        let e = DigestError::config_missing("webhook_url");
        assert_eq!(e.to_string(), "missing required configuration: webhook_url");

        let e = DigestError::config_invalid("target_count", "must be at least 1");
        assert_eq!(
            e.to_string(),
            "invalid configuration for target_count: must be at least 1"
        );
    }
}
