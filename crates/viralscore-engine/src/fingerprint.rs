//! Content fingerprint used to spot the same video submitted twice.
//!
//! The fingerprint is a soft heuristic over the title and the set of
//! platform links. It does not look at video bytes, so two different videos
//! with the same working title and the same links collide.

use sha2::{Digest, Sha256};
use viralscore_core::PlatformLink;

/// `lower(trim(title))::url1|url2|...` with the URLs sorted lexicographically.
///
/// Invariant to link order and to title case or surrounding whitespace.
#[must_use]
pub fn fingerprint(title: &str, links: &[PlatformLink]) -> String {
    let mut urls: Vec<&str> = links.iter().map(|l| l.url.as_str()).collect();
    urls.sort_unstable();
    format!("{}::{}", title.trim().to_lowercase(), urls.join("|"))
}

/// Fixed-width lookup key for a fingerprint: lowercase hex SHA-256.
#[must_use]
pub fn fingerprint_key(fingerprint: &str) -> String {
    format!("{:x}", Sha256::digest(fingerprint.as_bytes()))
}
