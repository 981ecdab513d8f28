//! Tag extraction utilities for parsing records
//!
//! Provides helper functions to reduce boilerplate when reading tags from Nostr events.

use super::Record;

fn is_named(tag: &[String], tag_name: &str) -> bool {
    tag.first().map(String::as_str) == Some(tag_name)
}

/// Extract a single string value from a tag by name.
/// Returns the first occurrence if multiple tags exist.
pub fn extract_tag_str<'a>(record: &'a Record, tag_name: &str) -> Option<&'a str> {
    record
        .tags
        .iter()
        .find(|tag| is_named(tag, tag_name))
        .and_then(|tag| tag.get(1))
        .map(String::as_str)
}

/// Like [`extract_tag_str`] but treats an empty value as missing.
pub fn extract_non_empty<'a>(record: &'a Record, tag_name: &str) -> Option<&'a str> {
    extract_tag_str(record, tag_name).filter(|v| !v.is_empty())
}

/// Extract all non-empty values for a given tag name.
/// Useful for tags that appear multiple times (e.g., "t", "web", "clone").
pub fn extract_all_tag_values(record: &Record, tag_name: &str) -> Vec<String> {
    record
        .tags
        .iter()
        .filter(|tag| is_named(tag, tag_name))
        .filter_map(|tag| tag.get(1))
        .filter(|v| !v.is_empty())
        .cloned()
        .collect()
}

/// First value of a tag whose third element is `marker`, e.g. `["r", sha, "euc"]`.
pub fn extract_marked_tag<'a>(record: &'a Record, tag_name: &str, marker: &str) -> Option<&'a str> {
    record
        .tags
        .iter()
        .find(|tag| is_named(tag, tag_name) && tag.get(2).map(String::as_str) == Some(marker))
        .and_then(|tag| tag.get(1))
        .map(String::as_str)
}

/// Check if a record has a specific tag (regardless of value).
pub fn has_tag(record: &Record, tag_name: &str) -> bool {
    record.tags.iter().any(|tag| is_named(tag, tag_name))
}
