//! Cycle configuration: one explicit, validated structure handed to the
//! cycle driver.
//!
//! Sources, lowest precedence first:
//!
//! 1. Built-in defaults (one "trending memes" digest over
//!    `memes`, `dankmemes`, `ProgrammerHumor`, five posts)
//! 2. An optional YAML file (`--config`, see `config.example.yaml`)
//! 3. Command-line flags and their environment variables
//!    (`DISCORD_WEBHOOK_URL`, `MEME_COLLECTIONS`, ...)
//!
//! Everything is checked once in [`CycleConfig::resolve`], before any network
//! activity. A missing webhook URL or an empty collection list is
//! [`DigestError::ConfigMissing`]; unusable values are
//! [`DigestError::ConfigInvalid`].

use crate::error::DigestError;
use crate::filter::DEFAULT_IMAGE_EXTENSIONS;
use crate::outputs::discord::MAX_EMBEDS;
use crate::scrapers::SourceFormat;
use crate::scrapers::reddit::DEFAULT_USER_AGENT;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::{info, instrument, warn};
use url::Url;

pub const DEFAULT_SOURCE_HOST: &str = "https://old.reddit.com";
pub const DEFAULT_TARGET_COUNT: usize = 5;
/// Orange.
pub const DEFAULT_COLOR: u32 = 16734003;
pub const DEFAULT_COLLECTIONS: &[&str] = &["memes", "dankmemes", "ProgrammerHumor"];

const WEBHOOK_HOSTS: &[&str] = &["discord.com", "discordapp.com", "ptb.discord.com", "canary.discord.com"];

/// The YAML file as written by a user; every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub webhook_url: Option<String>,
    pub source_host: Option<String>,
    pub user_agent: Option<String>,
    pub format: Option<SourceFormat>,
    pub image_extensions: Option<Vec<String>>,
    pub request_timeout_secs: Option<u64>,
    pub request_pause_ms: Option<u64>,
    pub message_pause_ms: Option<u64>,
    pub retry_base_delay_ms: Option<u64>,
    pub digests: Option<Vec<DigestSpec>>,
}

/// One digest entry of the YAML file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DigestSpec {
    pub name: Option<String>,
    pub header: Option<String>,
    pub color: Option<u32>,
    pub collections: Vec<String>,
    pub target_count: Option<usize>,
    pub per_collection_limit: Option<usize>,
}

/// Values taken from the command line / environment; they win over the file.
///
/// `collections` and `target_count` apply to the first digest.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub webhook_url: Option<String>,
    pub source_host: Option<String>,
    pub format: Option<SourceFormat>,
    pub collections: Vec<String>,
    pub target_count: Option<usize>,
}

/// A validated digest: which collections feed one webhook message.
#[derive(Debug, Clone, PartialEq)]
pub struct Digest {
    pub name: String,
    pub header: String,
    pub color: u32,
    pub collections: Vec<String>,
    pub target_count: usize,
    pub per_collection_limit: Option<usize>,
}

/// Everything one cycle needs, already validated.
#[derive(Debug, Clone)]
pub struct CycleConfig {
    pub webhook_url: Url,
    pub source_host: Url,
    pub user_agent: String,
    pub format: SourceFormat,
    pub image_extensions: Vec<String>,
    pub request_timeout: Duration,
    pub request_pause: Duration,
    pub message_pause: Duration,
    pub retry_base_delay: Duration,
    pub digests: Vec<Digest>,
}

/// Read and parse a YAML config file.
#[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
pub async fn load_file(path: impl AsRef<Path>) -> Result<FileConfig, DigestError> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .await
        .map_err(|e| DigestError::config_invalid("config", format!("{}: {e}", path.display())))?;
    let file: FileConfig = serde_yaml::from_str(&raw)
        .map_err(|e| DigestError::config_invalid("config", format!("{}: {e}", path.display())))?;
    info!(digests = file.digests.as_ref().map_or(0, Vec::len), "Loaded config file");
    Ok(file)
}

fn default_header(target_count: usize) -> String {
    format!("🔥 **Top {target_count} Trending Memes This Week** 🔥")
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl CycleConfig {
    /// Merge defaults, `file` and `overrides`, then validate the result.
    pub fn resolve(file: FileConfig, overrides: Overrides) -> Result<Self, DigestError> {
        let webhook_raw = non_empty(overrides.webhook_url)
            .or_else(|| non_empty(file.webhook_url))
            .ok_or_else(|| DigestError::config_missing("webhook_url"))?;
        let webhook_url = parse_http_url("webhook_url", &webhook_raw)?;
        if !webhook_url
            .host_str()
            .is_some_and(|h| WEBHOOK_HOSTS.contains(&h))
        {
            warn!(host = webhook_url.host_str().unwrap_or("-"), "Webhook host is not Discord; sending anyway");
        }

        let host_raw = non_empty(overrides.source_host)
            .or_else(|| non_empty(file.source_host))
            .unwrap_or_else(|| DEFAULT_SOURCE_HOST.to_string());
        let source_host = parse_http_url("source_host", &host_raw)?;

        let user_agent = match file.user_agent {
            Some(ua) if ua.trim().is_empty() => {
                return Err(DigestError::config_invalid("user_agent", "must not be empty"));
            }
            Some(ua) => ua.trim().to_string(),
            None => DEFAULT_USER_AGENT.to_string(),
        };

        let image_extensions: Vec<String> = file
            .image_extensions
            .unwrap_or_else(|| DEFAULT_IMAGE_EXTENSIONS.iter().map(|s| s.to_string()).collect())
            .into_iter()
            .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        if image_extensions.is_empty() {
            return Err(DigestError::config_invalid("image_extensions", "at least one extension is required"));
        }

        let request_timeout_secs = file.request_timeout_secs.unwrap_or(15);
        if request_timeout_secs == 0 {
            return Err(DigestError::config_invalid("request_timeout_secs", "must be at least 1"));
        }

        let mut specs = match file.digests {
            Some(specs) if specs.is_empty() => return Err(DigestError::config_missing("digests")),
            Some(specs) => specs,
            None => vec![DigestSpec {
                collections: DEFAULT_COLLECTIONS.iter().map(|s| s.to_string()).collect(),
                ..DigestSpec::default()
            }],
        };
        if let Some(first) = specs.first_mut() {
            if !overrides.collections.is_empty() {
                first.collections = overrides.collections;
            }
            if overrides.target_count.is_some() {
                first.target_count = overrides.target_count;
            }
        }

        let digests = specs
            .into_iter()
            .enumerate()
            .map(|(i, spec)| validate_digest(i, spec))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            webhook_url,
            source_host,
            user_agent,
            format: overrides.format.or(file.format).unwrap_or_default(),
            image_extensions,
            request_timeout: Duration::from_secs(request_timeout_secs),
            request_pause: Duration::from_millis(file.request_pause_ms.unwrap_or(1000)),
            message_pause: Duration::from_millis(file.message_pause_ms.unwrap_or(1000)),
            retry_base_delay: Duration::from_millis(file.retry_base_delay_ms.unwrap_or(2000)),
            digests,
        })
    }
}

fn parse_http_url(field: &str, raw: &str) -> Result<Url, DigestError> {
    let url = Url::parse(raw).map_err(|e| DigestError::config_invalid(field, e.to_string()))?;
    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        _ => Err(DigestError::config_invalid(field, "must be an absolute http(s) URL")),
    }
}

fn validate_digest(index: usize, spec: DigestSpec) -> Result<Digest, DigestError> {
    let collections: Vec<String> = spec
        .collections
        .into_iter()
        .map(|c| c.trim().trim_start_matches("r/").to_string())
        .filter(|c| !c.is_empty())
        .collect();
    if collections.is_empty() {
        return Err(DigestError::config_missing(format!("digests[{index}].collections")));
    }

    let target_count = spec.target_count.unwrap_or(DEFAULT_TARGET_COUNT);
    if target_count == 0 || target_count > MAX_EMBEDS {
        return Err(DigestError::config_invalid(
            format!("digests[{index}].target_count"),
            format!("must be between 1 and {MAX_EMBEDS}, got {target_count}"),
        ));
    }
    if spec.per_collection_limit == Some(0) {
        return Err(DigestError::config_invalid(
            format!("digests[{index}].per_collection_limit"),
            "must be at least 1 when set",
        ));
    }

    Ok(Digest {
        name: non_empty(spec.name).unwrap_or_else(|| format!("digest-{}", index + 1)),
        header: non_empty(spec.header).unwrap_or_else(|| default_header(target_count)),
        color: spec.color.unwrap_or(DEFAULT_COLOR),
        collections,
        target_count,
        per_collection_limit: spec.per_collection_limit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const WEBHOOK: &str = "https://discord.com/api/webhooks/123/abc";

    fn with_webhook() -> Overrides {
        Overrides {
            webhook_url: Some(WEBHOOK.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let cfg = CycleConfig::resolve(FileConfig::default(), with_webhook()).unwrap();
        assert_eq!(cfg.webhook_url.as_str(), WEBHOOK);
        assert_eq!(cfg.source_host.as_str(), "https://old.reddit.com/");
        assert_eq!(cfg.format, SourceFormat::Html);
        assert_eq!(cfg.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(cfg.image_extensions, vec!["jpg", "jpeg", "png", "gif", "gifv"]);
        assert_eq!(cfg.request_pause, Duration::from_secs(1));
        assert_eq!(cfg.digests.len(), 1);

        let d = &cfg.digests[0];
        assert_eq!(d.collections, vec!["memes", "dankmemes", "ProgrammerHumor"]);
        assert_eq!(d.target_count, 5);
        assert_eq!(d.color, DEFAULT_COLOR);
        assert_eq!(d.header, "🔥 **Top 5 Trending Memes This Week** 🔥");
        assert_eq!(d.name, "digest-1");
    }

    #[test]
    fn test_missing_webhook_is_config_missing() {
        let err = CycleConfig::resolve(FileConfig::default(), Overrides::default()).unwrap_err();
        assert!(matches!(err, DigestError::ConfigMissing { ref field } if field == "webhook_url"));

        let blank = Overrides {
            webhook_url: Some("   ".into()),
            ..Default::default()
        };
        let err = CycleConfig::resolve(FileConfig::default(), blank).unwrap_err();
        assert!(matches!(err, DigestError::ConfigMissing { .. }));
    }

    #[test]
    fn test_invalid_webhook_url() {
        for bad in ["not a url", "ftp://discord.com/api/webhooks/1/x", "mailto:someone@example.com"] {
            let o = Overrides {
                webhook_url: Some(bad.into()),
                ..Default::default()
            };
            let err = CycleConfig::resolve(FileConfig::default(), o).unwrap_err();
            assert!(
                matches!(err, DigestError::ConfigInvalid { ref field, .. } if field == "webhook_url"),
                "{bad} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_non_discord_webhook_is_accepted() {
        let o = Overrides {
            webhook_url: Some("http://127.0.0.1:9000/hook".into()),
            ..Default::default()
        };
        assert!(CycleConfig::resolve(FileConfig::default(), o).is_ok());
    }

    #[test]
    fn test_target_count_bounds() {
        for (count, ok) in [(0, false), (1, true), (10, true), (11, false)] {
            let o = Overrides {
                target_count: Some(count),
                ..with_webhook()
            };
            let res = CycleConfig::resolve(FileConfig::default(), o);
            assert_eq!(res.is_ok(), ok, "target_count {count}");
        }
    }

    #[test]
    fn test_overrides_apply_to_first_digest() {
        let file = FileConfig {
            digests: Some(vec![
                DigestSpec {
                    collections: vec!["memes".into()],
                    ..Default::default()
                },
                DigestSpec {
                    name: Some("work".into()),
                    collections: vec!["sysadmin".into()],
                    per_collection_limit: Some(2),
                    ..Default::default()
                },
            ]),
            ..Default::default()
        };
        let o = Overrides {
            collections: vec!["r/wholesomememes".into(), " ".into()],
            target_count: Some(3),
            format: Some(SourceFormat::Atom),
            ..with_webhook()
        };
        let cfg = CycleConfig::resolve(file, o).unwrap();

        assert_eq!(cfg.format, SourceFormat::Atom);
        assert_eq!(cfg.digests[0].collections, vec!["wholesomememes"]);
        assert_eq!(cfg.digests[0].target_count, 3);
        assert_eq!(cfg.digests[0].header, "🔥 **Top 3 Trending Memes This Week** 🔥");
        assert_eq!(cfg.digests[1].name, "work");
        assert_eq!(cfg.digests[1].target_count, 5);
        assert_eq!(cfg.digests[1].per_collection_limit, Some(2));
    }

    #[test]
    fn test_empty_collections_and_digests_are_missing() {
        let file = FileConfig {
            digests: Some(vec![DigestSpec::default()]),
            ..Default::default()
        };
        let err = CycleConfig::resolve(file, with_webhook()).unwrap_err();
        assert!(matches!(err, DigestError::ConfigMissing { ref field } if field == "digests[0].collections"));

        let file = FileConfig {
            digests: Some(vec![]),
            ..Default::default()
        };
        let err = CycleConfig::resolve(file, with_webhook()).unwrap_err();
        assert!(matches!(err, DigestError::ConfigMissing { ref field } if field == "digests"));
    }

    #[test]
    fn test_other_invalid_values() {
        let cases = [
            FileConfig {
                user_agent: Some(" ".into()),
                ..Default::default()
            },
            FileConfig {
                image_extensions: Some(vec![".".into(), "".into()]),
                ..Default::default()
            },
            FileConfig {
                request_timeout_secs: Some(0),
                ..Default::default()
            },
            FileConfig {
                source_host: Some("old.reddit.com".into()),
                ..Default::default()
            },
            FileConfig {
                digests: Some(vec![DigestSpec {
                    collections: vec!["memes".into()],
                    per_collection_limit: Some(0),
                    ..Default::default()
                }]),
                ..Default::default()
            },
        ];
        for file in cases {
            let err = CycleConfig::resolve(file, with_webhook()).unwrap_err();
            assert!(matches!(err, DigestError::ConfigInvalid { .. }), "{err:?}");
        }
    }

    #[tokio::test]
    async fn test_load_yaml_file() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        write!(
            tmp,
            r#"
webhook_url: "{WEBHOOK}"
format: atom
image_extensions: [".PNG", "jpg"]
request_pause_ms: 0
digests:
  - name: general
    header: "🔥 **Top 5 Trending Memes This Week** 🔥"
    color: 16734003
    collections: [memes, dankmemes, ProgrammerHumor]
    target_count: 5
  - name: support
    header: "💻 **Top 5 Tech Support Memes** 💻"
    color: 3447003
    collections: [talesfromtechsupport, iiiiiiitttttttttttt, sysadmin, techsupportgore, ProgrammerHumor]
    per_collection_limit: 2
"#
        )
        .unwrap();

        let file = load_file(tmp.path()).await.unwrap();
        let cfg = CycleConfig::resolve(file, Overrides::default()).unwrap();

        assert_eq!(cfg.format, SourceFormat::Atom);
        assert_eq!(cfg.image_extensions, vec!["png", "jpg"]);
        assert_eq!(cfg.request_pause, Duration::ZERO);
        assert_eq!(cfg.digests.len(), 2);
        assert_eq!(cfg.digests[1].color, 3447003);
        assert_eq!(cfg.digests[1].collections.len(), 5);
    }

    #[test]
    fn test_example_config_resolves() {
        let file: FileConfig = serde_yaml::from_str(include_str!("../config.example.yaml")).unwrap();
        let cfg = CycleConfig::resolve(file, Overrides::default()).unwrap();

        assert_eq!(cfg.digests.len(), 2);
        assert_eq!(cfg.digests[0].name, "trending");
        assert_eq!(cfg.digests[1].header, "💻 **Top 5 Tech Support Memes** 💻");
        assert_eq!(cfg.digests[1].per_collection_limit, Some(2));
    }

    #[tokio::test]
    async fn test_load_rejects_unknown_keys_and_missing_files() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp, "webhook: https://example.com").unwrap();
        let err = load_file(tmp.path()).await.unwrap_err();
        assert!(matches!(err, DigestError::ConfigInvalid { ref field, .. } if field == "config"));

        let err = load_file("/definitely/not/here.yaml").await.unwrap_err();
        assert!(matches!(err, DigestError::ConfigInvalid { .. }));
    }
}
