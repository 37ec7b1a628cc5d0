//! Subreddit listing sources.
//!
//! Fetching and parsing are split in two phases, the same way for every
//! source:
//!
//! 1. **Fetching** ([`reddit`]): download the week's top listing for one
//!    collection as raw markup
//! 2. **Parsing** ([`listing`]): turn that markup into ordered candidates
//!
//! # Supported Formats
//!
//! | Format | URL | Strategy |
//! |--------|-----|----------|
//! | `html` (default) | `{host}/r/{collection}/top/?t=week` | [`listing::OldRedditHtml`] |
//! | `atom` | `{host}/r/{collection}/top/.rss?t=week&limit=50` | [`listing::AtomFeed`] |

use crate::error::DigestError;
use serde::Deserialize;

pub mod listing;
pub mod reddit;

/// Which listing view is requested, and therefore which parser reads it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// Legacy HTML listing page.
    #[default]
    Html,
    /// Atom feed of the same listing.
    Atom,
}

/// Something that can hand back the raw listing markup for one collection.
///
/// [`reddit::RedditClient`] is the real implementation; the collector only
/// depends on this trait.
pub trait ListingSource {
    /// Raw markup of the collection's ranked listing. An empty string means the
    /// collection exists but has nothing to offer.
    async fn fetch(&self, collection: &str) -> Result<String, DigestError>;
}
