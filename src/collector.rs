//! Collector: walk the configured collections in priority order and gather a
//! capped, ordered batch of image candidates.
//!
//! # Ordering
//!
//! Collections are tried in exactly the configured order and each listing
//! keeps its document order, so the batch is in discovery order. Scores are
//! never used to re-rank.
//!
//! # Degradation
//!
//! A collection whose fetch fails is logged and skipped. Running out of
//! collections before the quota is met is a normal outcome: the batch is
//! simply shorter.

use crate::filter::filter_images;
use crate::models::DeliveryBatch;
use crate::scrapers::ListingSource;
use crate::scrapers::listing::ListingParser;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

/// Borrowed wiring for one collection pass.
pub struct Collector<'a, S> {
    source: &'a S,
    parser: &'a ListingParser,
    image_extensions: &'a [String],
    request_pause: Duration,
}

impl<'a, S: ListingSource> Collector<'a, S> {
    pub fn new(
        source: &'a S,
        parser: &'a ListingParser,
        image_extensions: &'a [String],
        request_pause: Duration,
    ) -> Self {
        Self {
            source,
            parser,
            image_extensions,
            request_pause,
        }
    }

    /// Gather at most `target_count` image candidates from `collections`.
    ///
    /// `per_collection_limit` caps how many items one collection may
    /// contribute, for digests that want variety over raw popularity. Items
    /// past the quota are discarded, never carried over. A media URL already
    /// in the batch (typically a crosspost) is skipped.
    #[instrument(level = "info", skip_all, fields(collections = collections.len(), target_count = target_count))]
    pub async fn collect(
        &self,
        collections: &[String],
        target_count: usize,
        per_collection_limit: Option<usize>,
    ) -> DeliveryBatch {
        let mut batch = DeliveryBatch::with_capacity(target_count);
        let mut seen: HashSet<String> = HashSet::new();

        for (i, collection) in collections.iter().enumerate() {
            if batch.len() >= target_count {
                debug!(skipped = collections.len() - i, "Quota reached; not querying remaining collections");
                break;
            }
            if i > 0 && !self.request_pause.is_zero() {
                sleep(self.request_pause).await;
            }

            let raw = match self.source.fetch(collection).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(%collection, error = %e, "Skipping collection");
                    continue;
                }
            };

            let parsed = self.parser.parse(&raw);
            let parsed_count = parsed.len();
            let images = filter_images(parsed, self.image_extensions);
            let image_count = images.len();

            let remaining = target_count - batch.len();
            let take = per_collection_limit.map_or(remaining, |limit| limit.min(remaining));

            let mut added = 0usize;
            for candidate in images {
                if added >= take {
                    break;
                }
                if !seen.insert(candidate.media_url.clone()) {
                    debug!(media_url = %candidate.media_url, %collection, "Duplicate media; skipping");
                    continue;
                }
                batch.push(candidate);
                added += 1;
            }

            info!(
                %collection,
                parsed = parsed_count,
                images = image_count,
                added,
                total = batch.len(),
                "Collected from collection"
            );
        }

        if batch.len() < target_count {
            warn!(found = batch.len(), target_count, "Sources exhausted before reaching target");
        }
        batch
    }
}
