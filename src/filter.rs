//! Candidate filter: keep only posts that link straight to an image.

use crate::models::Candidate;
use tracing::debug;

/// Extensions accepted when no list is configured.
pub const DEFAULT_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "gifv"];

/// Keep candidates whose media URL path ends in `.{ext}` for one of
/// `allowed` (compared case-insensitively). Relative order is preserved.
pub fn filter_images(candidates: Vec<Candidate>, allowed: &[String]) -> Vec<Candidate> {
    candidates
        .into_iter()
        .filter(|c| {
            let keep = is_allowed_image(c, allowed);
            if !keep {
                debug!(media_url = %c.media_url, origin_url = %c.origin_url, "Dropping non-image candidate");
            }
            keep
        })
        .collect()
}

fn is_allowed_image(candidate: &Candidate, allowed: &[String]) -> bool {
    let Some(path) = candidate.media_path() else {
        return false;
    };
    let Some((_, ext)) = path.rsplit_once('.') else {
        return false;
    };
    allowed
        .iter()
        .any(|a| a.trim_start_matches('.').eq_ignore_ascii_case(ext))
}
