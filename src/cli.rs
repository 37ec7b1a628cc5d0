//! Command-line interface definitions for the weekly meme digest.
//!
//! Every option can also come from the environment, so a scheduler only has
//! to export `DISCORD_WEBHOOK_URL` and run the binary.

use crate::config::Overrides;
use crate::scrapers::SourceFormat;
use clap::Parser;

/// Command-line arguments.
///
/// # Examples
///
/// ```sh
/// # Defaults: r/memes, r/dankmemes, r/ProgrammerHumor, top 5
/// DISCORD_WEBHOOK_URL=https://discord.com/api/webhooks/... weekly_meme_digest
///
/// # Several digests from a file
/// weekly_meme_digest --config digests.yaml
///
/// # One-off run over different subreddits
/// weekly_meme_digest -s wholesomememes -s aww --target-count 3
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file describing the digests
    #[arg(short, long, env = "MEME_DIGEST_CONFIG")]
    pub config: Option<String>,

    /// Discord webhook URL that receives the digest
    #[arg(long, env = "DISCORD_WEBHOOK_URL", hide_env_values = true)]
    pub webhook_url: Option<String>,

    /// Subreddit to pull from, in priority order (repeatable; replaces the first digest's list)
    #[arg(short = 's', long = "collection", env = "MEME_COLLECTIONS", value_delimiter = ',')]
    pub collections: Vec<String>,

    /// Number of posts in the first digest
    #[arg(short = 'n', long, env = "MEME_TARGET_COUNT")]
    pub target_count: Option<usize>,

    /// Base URL of the listing site
    #[arg(long, env = "MEME_SOURCE_HOST")]
    pub source_host: Option<String>,

    /// Listing format to request
    #[arg(long, value_enum, env = "MEME_SOURCE_FORMAT")]
    pub format: Option<SourceFormat>,
}

impl Cli {
    /// The values that take precedence over the config file.
    pub fn overrides(&self) -> Overrides {
        Overrides {
            webhook_url: self.webhook_url.clone(),
            source_host: self.source_host.clone(),
            format: self.format,
            collections: self.collections.clone(),
            target_count: self.target_count,
        }
    }
}
