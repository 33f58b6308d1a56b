//! Derived tag index.
//!
//! Projection consumed by tag filters in the rendering layer; never persisted.

use crate::model::page::Page;
use std::collections::{BTreeMap, BTreeSet};

/// Counts how many pages carry each tag.
///
/// Tags are trimmed, blank tags are ignored, and a tag repeated on one page
/// counts once for that page.
pub fn build_tag_index(pages: &[Page]) -> BTreeMap<String, usize> {
    let mut index = BTreeMap::new();
    for page in pages {
        let unique: BTreeSet<&str> = page
            .tags
            .iter()
            .map(|tag| tag.trim())
            .filter(|tag| !tag.is_empty())
            .collect();
        for tag in unique {
            *index.entry(tag.to_string()).or_insert(0) += 1;
        }
    }
    index
}
