use serde::Serialize;

use super::tag_utils::{extract_all_tag_values, extract_non_empty};
use super::Record;
use crate::constants::{kinds, ARTICLE_TOPICS, READING_WORDS_PER_MINUTE};

/// A long-form article (kind:30023)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Article {
    /// Event ID (hex)
    pub id: String,
    /// d-tag slug (same slug = same article, different versions)
    pub slug: String,
    /// Author pubkey (hex)
    pub author: String,
    pub title: String,
    /// Summary (from summary tag, or first 160 chars of content)
    pub summary: String,
    pub image: Option<String>,
    /// Full markdown content
    pub content: String,
    /// Hashtags (t-tags)
    pub hashtags: Vec<String>,
    pub created_at: u64,
    /// Author-declared first publication time (published_at tag)
    pub published_at: Option<u64>,
    pub reading_time_mins: u32,
}

impl Article {
    pub fn from_record(record: &Record) -> Option<Self> {
        if record.kind != kinds::LONG_FORM {
            return None;
        }

        let content = record.content.clone();

        let title = extract_non_empty(record, "title")
            .map(String::from)
            .unwrap_or_else(|| content.lines().next().unwrap_or("Untitled").to_string());
        let summary = extract_non_empty(record, "summary")
            .map(String::from)
            .unwrap_or_else(|| content.chars().take(160).collect());

        let word_count = content.split_whitespace().count();
        let reading_time_mins = (word_count.div_ceil(READING_WORDS_PER_MINUTE) as u32).max(1);

        Some(Self {
            id: record.id.clone(),
            slug: record.d_tag().to_string(),
            author: record.pubkey.clone(),
            title,
            summary,
            image: extract_non_empty(record, "image").map(String::from),
            hashtags: extract_all_tag_values(record, "t"),
            created_at: record.created_at,
            published_at: published_at(record),
            reading_time_mins,
            content,
        })
    }

    /// Get the a-tag coordinate for this article
    pub fn a_tag(&self) -> String {
        format!("{}:{}:{}", kinds::LONG_FORM, self.author, self.slug)
    }
}

/// `published_at` tag when it parses, otherwise `created_at`
pub fn sort_time(record: &Record) -> u64 {
    published_at(record).unwrap_or(record.created_at)
}

fn published_at(record: &Record) -> Option<u64> {
    extract_non_empty(record, "published_at").and_then(|v| v.parse().ok())
}

/// Sort newest first by publication time
pub fn sort_by_published(records: &mut [Record]) {
    records.sort_by_key(|r| std::cmp::Reverse(sort_time(r)));
}

/// Whether an article's content or tag values mention one of the site's topics
pub fn is_topical(record: &Record) -> bool {
    let tag_text = record
        .tags
        .iter()
        .map(|tag| tag.get(1).map(String::as_str).unwrap_or(""))
        .collect::<Vec<_>>()
        .join(" ");
    let haystack = format!("{} {}", record.content, tag_text).to_lowercase();

    ARTICLE_TOPICS.iter().any(|topic| haystack.contains(topic))
}
