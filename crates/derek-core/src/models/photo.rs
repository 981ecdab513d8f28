use serde::Serialize;

use super::Record;
use crate::constants::kinds;

const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".webp"];

/// One image from a NIP-68 picture event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Photo {
    /// `<event id>-<index>`, or `<event id>-content-<index>` for content fallbacks
    pub id: String,
    pub event_id: String,
    pub url: String,
    pub caption: Option<String>,
    pub alt: Option<String>,
    pub created_at: u64,
}

impl Photo {
    /// Extract every photo from a kind:20 record.
    ///
    /// `imeta` tags are authoritative; image URLs in the content are only used
    /// when no `imeta` tag yields a URL.
    pub fn from_record(record: &Record) -> Vec<Self> {
        if record.kind != kinds::PICTURE {
            return Vec::new();
        }

        let mut photos: Vec<Photo> = record
            .tags
            .iter()
            .filter(|tag| tag.first().map(String::as_str) == Some("imeta"))
            .enumerate()
            .filter_map(|(index, tag)| {
                let (url, alt) = parse_imeta(&tag[1..]);
                url.map(|url| Photo {
                    id: format!("{}-{}", record.id, index),
                    event_id: record.id.clone(),
                    url,
                    caption: Some(record.content.clone()).filter(|c| !c.is_empty()),
                    alt,
                    created_at: record.created_at,
                })
            })
            .collect();

        if photos.is_empty() {
            photos = extract_image_urls(&record.content)
                .into_iter()
                .enumerate()
                .map(|(index, url)| {
                    let caption = record.content.replacen(&url, "", 1).trim().to_string();
                    Photo {
                        id: format!("{}-content-{}", record.id, index),
                        event_id: record.id.clone(),
                        caption: Some(caption).filter(|c| !c.is_empty()),
                        url,
                        alt: None,
                        created_at: record.created_at,
                    }
                })
                .collect();
        }

        photos
    }
}

/// `imeta` entries are space-separated `key value` pairs
fn parse_imeta(entries: &[String]) -> (Option<String>, Option<String>) {
    let mut url = None;
    let mut alt = None;
    for entry in entries {
        if let Some(value) = entry.strip_prefix("url ") {
            url = Some(value.to_string()).filter(|v| !v.is_empty());
        } else if let Some(value) = entry.strip_prefix("alt ") {
            alt = Some(value.to_string()).filter(|v| !v.is_empty());
        }
    }
    (url, alt)
}

/// http(s) URLs in `content` that end in a known image extension
pub fn extract_image_urls(content: &str) -> Vec<String> {
    content
        .split_whitespace()
        .filter(|word| word.starts_with("http://") || word.starts_with("https://"))
        .filter(|word| {
            let lower = word.to_lowercase();
            IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
        })
        .map(String::from)
        .collect()
}

/// Whether a picture record carries at least one usable image
pub fn has_image(record: &Record) -> bool {
    !Photo::from_record(record).is_empty()
}
