use serde::Serialize;
use serde_json::{Map, Value};

use super::Record;
use crate::constants::kinds;

/// Kind:0 profile metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub pubkey: String,
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub about: Option<String>,
    pub picture: Option<String>,
    pub banner: Option<String>,
    pub nip05: Option<String>,
    pub lud16: Option<String>,
    pub website: Option<String>,
    pub updated_at: u64,
}

/// String value of `key`; other JSON types count as absent
fn string_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields.get(key).and_then(Value::as_str).map(String::from)
}

impl Profile {
    /// Parse a Profile from a kind:0 record; `None` when the content is not a JSON object.
    ///
    /// Fields with the wrong JSON type are skipped individually.
    pub fn from_record(record: &Record) -> Option<Self> {
        if record.kind != kinds::METADATA {
            return None;
        }

        let content: Value = serde_json::from_str(&record.content).ok()?;
        let fields = content.as_object()?;

        Some(Self {
            pubkey: record.pubkey.clone(),
            name: string_field(fields, "name"),
            display_name: string_field(fields, "display_name")
                .or_else(|| string_field(fields, "displayName")),
            about: string_field(fields, "about"),
            picture: string_field(fields, "picture"),
            banner: string_field(fields, "banner"),
            nip05: string_field(fields, "nip05"),
            lud16: string_field(fields, "lud16"),
            website: string_field(fields, "website"),
            updated_at: record.created_at,
        })
    }

    /// Best name to show: display_name, then name, then a shortened pubkey
    pub fn best_name(&self) -> String {
        self.display_name
            .as_deref()
            .or(self.name.as_deref())
            .filter(|n| !n.is_empty())
            .map(String::from)
            .unwrap_or_else(|| self.pubkey.chars().take(8).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::test_support::*;

    #[test]
    fn test_from_record() {
        let rec = with_content(
            record("id", "3f770d65", 0, 42),
            r#"{"name":"derek","display_name":"Derek Ross","lud16":"pay@derekross.me","extra":1}"#,
        );
        let profile = Profile::from_record(&rec).expect("Failed to parse profile");

        assert_eq!(profile.pubkey, "3f770d65");
        assert_eq!(profile.updated_at, 42);
        assert_eq!(profile.lud16.as_deref(), Some("pay@derekross.me"));
        assert_eq!(profile.best_name(), "Derek Ross");
    }

    #[test]
    fn test_invalid_content() {
        let rec = with_content(record("id", "pk", 0, 1), "not json");
        assert!(Profile::from_record(&rec).is_none());
        assert!(Profile::from_record(&record("id", "pk", 1, 1)).is_none());
    }

    #[test]
    fn test_wrong_typed_field_keeps_the_rest() {
        let rec = with_content(
            record("id", "pk", 0, 1),
            r#"{"name":"derek","website":123,"about":null,"displayName":"Derek"}"#,
        );
        let profile = Profile::from_record(&rec).expect("Failed to parse profile");

        assert_eq!(profile.name.as_deref(), Some("derek"));
        assert_eq!(profile.display_name.as_deref(), Some("Derek"));
        assert!(profile.website.is_none());
        assert!(profile.about.is_none());

        let array = with_content(record("id", "pk", 0, 1), "[1,2]");
        assert!(Profile::from_record(&array).is_none());
    }

    #[test]
    fn test_best_name_falls_back_to_pubkey() {
        let rec = with_content(record("id", "0123456789abcdef", 0, 1), "{}");
        let profile = Profile::from_record(&rec).expect("Failed to parse profile");
        assert_eq!(profile.best_name(), "01234567");
    }
}
