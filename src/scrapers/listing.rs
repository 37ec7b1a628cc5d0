//! Listing parser: raw subreddit markup in, ordered [`Candidate`]s out.
//!
//! The selectors that know what a listing looks like live behind
//! [`ExtractionStrategy`], so a markup change on the source site means
//! swapping or editing one strategy while [`ListingParser`] and everything
//! downstream stay the same.
//!
//! | Strategy | Input | Item | Media | Score |
//! |----------|-------|------|-------|-------|
//! | [`OldRedditHtml`] | `old.reddit.com` listing page | `div.thing` | `data-url` | `data-score` |
//! | [`AtomFeed`] | `.rss` Atom feed | `<entry>` | thumbnail / content links | `N points` in content |
//!
//! Extraction is best-effort per item: a field that cannot be read takes its
//! default (empty string or `0`) and the item is still emitted. Document order
//! is kept, since the source already ranks by popularity.

use crate::models::Candidate;
use crate::scrapers::SourceFormat;
use crate::utils::squash_whitespace;
use once_cell::sync::Lazy;
use quick_xml::Reader;
use quick_xml::events::Event;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Turns one fetched document into candidates, in document order.
pub trait ExtractionStrategy {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Extract every listing item. Relative links resolve against `base`.
    /// Must not fail: an unreadable document yields an empty `Vec`.
    fn extract(&self, raw: &str, base: &Url) -> Vec<Candidate>;
}

/// Stable parsing entry point; the strategy decides how items are found.
pub struct ListingParser {
    strategy: Box<dyn ExtractionStrategy + Send + Sync>,
    base: Url,
}

impl ListingParser {
    pub fn new(strategy: Box<dyn ExtractionStrategy + Send + Sync>, base: Url) -> Self {
        Self { strategy, base }
    }

    /// Parser matching the URL shape the source client requests.
    pub fn for_format(format: SourceFormat, base: Url) -> Self {
        let strategy: Box<dyn ExtractionStrategy + Send + Sync> = match format {
            SourceFormat::Html => Box::new(OldRedditHtml),
            SourceFormat::Atom => Box::new(AtomFeed),
        };
        Self::new(strategy, base)
    }

    /// Parse `raw` from scratch. An empty or item-less document is a normal,
    /// empty result.
    #[instrument(level = "debug", skip_all, fields(strategy = self.strategy.name(), bytes = raw.len()))]
    pub fn parse(&self, raw: &str) -> Vec<Candidate> {
        if raw.trim().is_empty() {
            return Vec::new();
        }
        let candidates = self.strategy.extract(raw, &self.base);
        info!(count = candidates.len(), strategy = self.strategy.name(), "Parsed listing items");
        candidates
    }
}

/// Resolve a possibly relative link; empty or unresolvable input gives `""`.
fn resolve(base: &Url, raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return String::new();
    }
    match base.join(raw) {
        Ok(u) => u.to_string(),
        Err(e) => {
            debug!(link = raw, error = %e, "Unresolvable link; leaving empty");
            String::new()
        }
    }
}

fn parse_score(raw: &str) -> f64 {
    match raw.trim().replace(',', "").parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => v,
        _ => 0.0,
    }
}

// ---------------------------------------------------------------------------
// old.reddit.com HTML
// ---------------------------------------------------------------------------

static THING_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.thing").expect("static selector"));
static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a.title").expect("static selector"));

/// Legacy listing markup: every post is a `div.thing` carrying its data as
/// attributes (`data-url`, `data-permalink`, `data-score`).
#[derive(Debug, Default, Clone, Copy)]
pub struct OldRedditHtml;

impl OldRedditHtml {
    fn extract_item(item: ElementRef<'_>, base: &Url) -> Candidate {
        let el = item.value();
        let title = item
            .select(&TITLE_SELECTOR)
            .next()
            .map(|a| squash_whitespace(&a.text().collect::<String>()))
            .unwrap_or_default();

        let media_url = el.attr("data-url").map(|u| resolve(base, u)).unwrap_or_default();
        let origin_url = el
            .attr("data-permalink")
            .map(|p| resolve(base, p))
            .unwrap_or_default();
        let score = el.attr("data-score").map(parse_score).unwrap_or_default();

        if media_url.is_empty() || origin_url.is_empty() {
            debug!(
                id = el.attr("data-fullname").unwrap_or("-"),
                has_media = !media_url.is_empty(),
                has_permalink = !origin_url.is_empty(),
                "Listing item extracted partially"
            );
        }

        Candidate {
            title,
            media_url,
            origin_url,
            score,
        }
    }
}

impl ExtractionStrategy for OldRedditHtml {
    fn name(&self) -> &'static str {
        "old-reddit-html"
    }

    fn extract(&self, raw: &str, base: &Url) -> Vec<Candidate> {
        let document = Html::parse_document(raw);
        document
            .select(&THING_SELECTOR)
            .filter(|item| {
                let promoted = item.value().attr("data-promoted") == Some("true");
                if promoted {
                    debug!(id = item.value().attr("data-fullname").unwrap_or("-"), "Skipping promoted item");
                }
                !promoted
            })
            .map(|item| Self::extract_item(item, base))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Atom feed (`/top/.rss`)
// ---------------------------------------------------------------------------

static IMG_SRC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<img[^>]+src="([^"]+)""#).expect("static regex"));
static IMAGE_HREF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)href="([^"]+\.(?:jpe?g|png|gifv?)[^"]*)""#).expect("static regex")
});
static IMAGE_EXT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(?:jpe?g|png|gifv?)").expect("static regex"));
static IMAGE_SUFFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(?:jpe?g|png|gifv?)$").expect("static regex"));
static POINTS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s+points?").expect("static regex"));

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FeedEntry {
    title: String,
    id: String,
    #[serde(rename = "link")]
    links: Vec<FeedLink>,
    content: Option<FeedContent>,
    #[serde(rename = "media:thumbnail", alias = "thumbnail")]
    thumbnails: Vec<FeedThumbnail>,
}

#[derive(Debug, Default, Deserialize)]
struct FeedLink {
    #[serde(rename = "@href", default)]
    href: String,
}

#[derive(Debug, Default, Deserialize)]
struct FeedContent {
    #[serde(rename = "$text", default)]
    html: String,
}

#[derive(Debug, Default, Deserialize)]
struct FeedThumbnail {
    #[serde(rename = "@url", default)]
    url: String,
}

/// Reddit's Atom feed. Entries carry an HTML `<content>` blob in which the
/// direct image link has to be found.
#[derive(Debug, Default, Clone, Copy)]
pub struct AtomFeed;

impl AtomFeed {
    fn media_from_entry(entry: &FeedEntry) -> String {
        if let Some(thumb) = entry.thumbnails.iter().find(|t| !t.url.is_empty()) {
            return thumb.url.replace("&amp;", "&");
        }

        let html = entry.content.as_ref().map(|c| c.html.as_str()).unwrap_or("");
        if html.contains("<img") {
            if let Some(src) = IMG_SRC_RE.captures(html).and_then(|c| c.get(1)) {
                let src = src.as_str().replace("&amp;", "&");
                if IMAGE_EXT_RE.is_match(&src) && src.contains("preview") {
                    return src;
                }
            }
        }
        if let Some(href) = IMAGE_HREF_RE.captures(html).and_then(|c| c.get(1)) {
            return href.as_str().replace("&amp;", "&");
        }
        if IMAGE_SUFFIX_RE.is_match(entry.id.trim()) {
            return entry.id.trim().to_string();
        }
        String::new()
    }

    fn score_from_entry(entry: &FeedEntry) -> f64 {
        entry
            .content
            .as_ref()
            .and_then(|c| POINTS_RE.captures(&c.html))
            .and_then(|c| c.get(1))
            .map(|m| parse_score(m.as_str()))
            .unwrap_or_default()
    }

    fn candidate_from_entry(entry: &FeedEntry, base: &Url) -> Candidate {
        let media = Self::media_from_entry(entry);
        let origin = entry
            .links
            .iter()
            .map(|l| l.href.as_str())
            .find(|h| !h.is_empty())
            .unwrap_or("");
        Candidate {
            title: squash_whitespace(&entry.title),
            media_url: resolve(base, &media),
            origin_url: resolve(base, origin),
            score: Self::score_from_entry(entry),
        }
    }
}

impl ExtractionStrategy for AtomFeed {
    fn name(&self) -> &'static str {
        "atom-feed"
    }

    /// Entries are cut out of the feed one by one and deserialized on their
    /// own, so one unreadable entry is skipped instead of losing the page.
    fn extract(&self, raw: &str, base: &Url) -> Vec<Candidate> {
        let mut reader = Reader::from_str(raw);
        let mut candidates = Vec::new();
        let mut skipped = 0usize;

        loop {
            let start = reader.buffer_position() as usize;
            match reader.read_event() {
                Ok(Event::Start(e)) if e.local_name().as_ref() == b"entry" => {
                    let end = e.to_end().into_owned();
                    if let Err(err) = reader.read_to_end(end.name()) {
                        warn!(error = %err, parsed = candidates.len(), "Feed is not readable XML past this entry; stopping");
                        break;
                    }
                    let fragment = &raw[start..reader.buffer_position() as usize];
                    match quick_xml::de::from_str::<FeedEntry>(fragment) {
                        Ok(entry) => candidates.push(Self::candidate_from_entry(&entry, base)),
                        Err(err) => {
                            skipped += 1;
                            debug!(error = %err, position = start, "Skipping unreadable feed entry");
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(err) => {
                    warn!(error = %err, parsed = candidates.len(), "Feed is not readable XML; stopping");
                    break;
                }
            }
        }

        if skipped > 0 {
            debug!(skipped, kept = candidates.len(), "Feed had unreadable entries");
        }
        candidates
    }
}
