//! Data models passed between the pipeline stages.
//!
//! - [`Candidate`]: one listing entry as extracted from a source page
//! - [`DeliveryBatch`]: the ordered, capped set of candidates sent to the sink
//!
//! Nothing here outlives a cycle and nothing is mutated once built; every
//! stage produces a fresh `Vec`.

use url::Url;

/// One listing entry, as parsed from a subreddit page or feed.
///
/// Extraction is best-effort, so any field may hold its default. Only
/// candidates whose [`media_url`](Candidate::media_url) points at an allowed
/// image survive filtering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Candidate {
    /// Post title. May be empty.
    pub title: String,
    /// Absolute URL of the directly linked media file.
    pub media_url: String,
    /// Absolute permalink of the post itself.
    pub origin_url: String,
    /// Popularity score for display only; `0.0` when unknown.
    pub score: f64,
}

impl Candidate {
    /// Lowercased path of the media URL, or `None` when it does not parse.
    pub fn media_path(&self) -> Option<String> {
        if self.media_url.is_empty() {
            return None;
        }
        Url::parse(&self.media_url)
            .ok()
            .map(|u| u.path().to_ascii_lowercase())
    }
}

/// Final ordered selection for one digest message; discovery order is kept.
pub type DeliveryBatch = Vec<Candidate>;
