//! Tag map conversions and the allow-list projection.

use std::collections::BTreeMap;

use crate::gateway::TagPair;

/// Tag keys reserved by AWS. Never user-writable, always dropped on ingestion.
pub const RESERVED_TAG_PREFIX: &str = "aws:";

pub const TAG_NAME: &str = "Name";

/// Resource tag set. BTreeMap keeps report output and tests deterministic.
pub type TagMap = BTreeMap<String, String>;

/// Convert a gateway tag list into a tag map, dropping reserved-prefix keys.
///
/// Reserved keys (`aws:*`) are managed by the provider and must never
/// reappear in a propagated or derived set.
pub fn tag_pairs_to_map(pairs: &[TagPair]) -> TagMap {
    pairs
        .iter()
        .filter(|pair| !pair.key.starts_with(RESERVED_TAG_PREFIX))
        .map(|pair| (pair.key.clone(), pair.value.clone()))
        .collect()
}

/// Project a tag map down to the allow-listed keys.
///
/// An empty allow list yields an empty result.
pub fn filter_tags(tags: &TagMap, allowed_keys: &[String]) -> TagMap {
    tags.iter()
        .filter(|(key, _)| allowed_keys.iter().any(|allowed| allowed == *key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
