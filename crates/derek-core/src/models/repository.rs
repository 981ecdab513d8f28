use serde::Serialize;

use super::tag_utils::{extract_all_tag_values, extract_marked_tag, extract_non_empty};
use super::Record;
use crate::constants::kinds;

/// A NIP-34 git repository announcement (kind:30617)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Repository {
    /// d-tag, or the event id when the d-tag is empty
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub web_urls: Vec<String>,
    pub clone_urls: Vec<String>,
    pub relays: Vec<String>,
    pub maintainers: Vec<String>,
    pub tags: Vec<String>,
    /// Earliest unique commit (`["r", <sha>, "euc"]`)
    pub earliest_commit: Option<String>,
}

impl Repository {
    pub fn from_record(record: &Record) -> Option<Self> {
        if record.kind != kinds::GIT_REPOSITORY {
            return None;
        }

        let id = extract_non_empty(record, "d")
            .unwrap_or(record.id.as_str())
            .to_string();

        Some(Self {
            name: extract_non_empty(record, "name")
                .map(String::from)
                .unwrap_or_else(|| id.clone()),
            id,
            description: extract_non_empty(record, "description").map(String::from),
            web_urls: extract_all_tag_values(record, "web"),
            clone_urls: extract_all_tag_values(record, "clone"),
            relays: extract_all_tag_values(record, "relays"),
            maintainers: extract_all_tag_values(record, "maintainers"),
            tags: extract_all_tag_values(record, "t"),
            earliest_commit: extract_marked_tag(record, "r", "euc").map(String::from),
        })
    }
}
