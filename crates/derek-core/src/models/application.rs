use serde::{Deserialize, Serialize};

use super::tag_utils::extract_non_empty;
use super::Record;
use crate::constants::kinds;

/// A NIP-89 application handler (kind:31990)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Application {
    /// d-tag, or the event id when the d-tag is empty
    pub id: String,
    pub name: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub picture: Option<String>,
    pub banner: Option<String>,
    pub web: Option<String>,
    pub supported_kinds: Vec<u16>,
    pub platforms: Platforms,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Platforms {
    pub web: Option<String>,
    pub ios: Option<String>,
    pub android: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApplicationMetadata {
    name: Option<String>,
    display_name: Option<String>,
    about: Option<String>,
    description: Option<String>,
    picture: Option<String>,
    banner: Option<String>,
    web: Option<String>,
    website: Option<String>,
}

impl Application {
    pub fn from_record(record: &Record) -> Option<Self> {
        if record.kind != kinds::APPLICATION {
            return None;
        }

        let metadata: ApplicationMetadata = if record.content.is_empty() {
            ApplicationMetadata::default()
        } else {
            serde_json::from_str(&record.content).unwrap_or_else(|e| {
                tracing::debug!("Unparseable application metadata in {}: {}", record.id, e);
                ApplicationMetadata::default()
            })
        };

        let id = extract_non_empty(record, "d")
            .unwrap_or(record.id.as_str())
            .to_string();

        let supported_kinds: Vec<u16> = record
            .tags
            .iter()
            .filter(|tag| tag.first().map(String::as_str) == Some("k"))
            .filter_map(|tag| tag.get(1)?.parse().ok())
            .collect();

        let mut platforms = Platforms::default();
        for tag in &record.tags {
            let (Some(name), Some(url)) = (tag.first(), tag.get(1)) else {
                continue;
            };
            if url.is_empty() {
                continue;
            }
            match name.as_str() {
                "web" => platforms.web = Some(url.clone()),
                "ios" => platforms.ios = Some(url.clone()),
                "android" => platforms.android = Some(url.clone()),
                _ => {}
            }
        }

        Some(Self {
            name: metadata.name.clone().unwrap_or_else(|| id.clone()),
            id,
            display_name: metadata.display_name,
            description: metadata.about.or(metadata.description),
            picture: metadata.picture,
            banner: metadata.banner,
            web: metadata.website.or(metadata.web).or_else(|| platforms.web.clone()),
            supported_kinds,
            platforms,
        })
    }
}
