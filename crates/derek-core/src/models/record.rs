use std::fmt;

use serde::{Deserialize, Serialize};

use super::tag_utils;
use crate::constants::kinds;

/// A signed Nostr event as it travels on the wire.
///
/// Field names match NIP-01 exactly so records deserialize straight from relay
/// responses. Signatures are verified by the transport before a record gets
/// here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    /// Event ID (hex)
    pub id: String,
    /// Author pubkey (hex)
    pub pubkey: String,
    /// Signer-supplied creation timestamp; only used for ordering
    pub created_at: u64,
    pub kind: u16,
    pub tags: Vec<Vec<String>>,
    pub content: String,
    pub sig: String,
}

impl Record {
    pub fn class(&self) -> KindClass {
        classify_kind(self.kind)
    }

    /// Value of the first `d` tag, or the empty string when absent.
    pub fn d_tag(&self) -> &str {
        tag_utils::extract_tag_str(self, "d").unwrap_or("")
    }

    /// Key under which newer versions of this record replace older ones
    pub fn identity_key(&self) -> IdentityKey {
        match self.class() {
            KindClass::Regular | KindClass::Deletion => IdentityKey::Id(self.id.clone()),
            KindClass::Replaceable => IdentityKey::Replaceable {
                author: self.pubkey.clone(),
                kind: self.kind,
            },
            KindClass::Addressable => IdentityKey::Addressable {
                author: self.pubkey.clone(),
                kind: self.kind,
                d: self.d_tag().to_string(),
            },
        }
    }

    /// `kind:pubkey:d` coordinate for addressable records
    pub fn coordinate(&self) -> Option<String> {
        match self.class() {
            KindClass::Addressable => {
                Some(format!("{}:{}:{}", self.kind, self.pubkey, self.d_tag()))
            }
            _ => None,
        }
    }
}

/// Storage discipline of a kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KindClass {
    /// Immutable; every distinct id is kept
    Regular,
    /// Latest per author+kind
    Replaceable,
    /// Latest per author+kind+d-tag
    Addressable,
    /// NIP-09 retraction directive (stored like a regular record)
    Deletion,
}

pub fn classify_kind(kind: u16) -> KindClass {
    match kind {
        kinds::DELETION => KindClass::Deletion,
        kinds::METADATA | kinds::CONTACTS => KindClass::Replaceable,
        10_000..=19_999 => KindClass::Replaceable,
        30_000..=39_999 => KindClass::Addressable,
        _ => KindClass::Regular,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IdentityKey {
    Id(String),
    Replaceable { author: String, kind: u16 },
    Addressable { author: String, kind: u16, d: String },
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityKey::Id(id) => write!(f, "{}", id),
            IdentityKey::Replaceable { author, kind } => write!(f, "{}:{}", author, kind),
            IdentityKey::Addressable { author, kind, d } => {
                write!(f, "{}:{}:{}", author, kind, d)
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_classify_kind() {
        assert_eq!(classify_kind(1), KindClass::Regular);
        assert_eq!(classify_kind(5), KindClass::Deletion);
        assert_eq!(classify_kind(0), KindClass::Replaceable);
        assert_eq!(classify_kind(3), KindClass::Replaceable);
        assert_eq!(classify_kind(10002), KindClass::Replaceable);
        assert_eq!(classify_kind(19999), KindClass::Replaceable);
        assert_eq!(classify_kind(20000), KindClass::Regular);
        assert_eq!(classify_kind(30023), KindClass::Addressable);
        assert_eq!(classify_kind(39999), KindClass::Addressable);
        assert_eq!(classify_kind(40000), KindClass::Regular);
    }

    #[test]
    fn test_identity_keys() {
        let note = record("n1", "alice", 1, 10);
        assert_eq!(note.identity_key(), IdentityKey::Id("n1".to_string()));

        let profile = record("p1", "alice", 0, 10);
        assert_eq!(
            profile.identity_key().to_string(),
            "alice:0".to_string()
        );

        let article = with_tag(record("a1", "alice", 30023, 10), &["d", "post1"]);
        assert_eq!(article.identity_key().to_string(), "alice:30023:post1");
        assert_eq!(article.coordinate().as_deref(), Some("30023:alice:post1"));
    }

    #[test]
    fn test_missing_d_tag_is_empty_identifier() {
        let bare = record("a1", "alice", 30023, 10);
        let empty = with_tag(record("a2", "alice", 30023, 10), &["d", ""]);
        let named = with_tag(record("a3", "alice", 30023, 10), &["d", "x"]);

        assert_eq!(bare.identity_key(), empty.identity_key());
        assert_ne!(bare.identity_key(), named.identity_key());
    }

    #[test]
    fn test_wire_field_names() {
        let json = r#"{"id":"x1","pubkey":"A","created_at":100,"kind":1,"tags":[["t","nostr"]],"content":"hi","sig":"s"}"#;
        let parsed: Record = serde_json::from_str(json).expect("Failed to parse record");

        assert_eq!(parsed.created_at, 100);
        assert_eq!(parsed.tags, vec![vec!["t".to_string(), "nostr".to_string()]]);
        let back = serde_json::to_value(&parsed).expect("Failed to serialize");
        assert_eq!(back["pubkey"], "A");
    }
}
