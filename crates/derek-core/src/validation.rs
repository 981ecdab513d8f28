//! Record validation run before reconciliation.
//!
//! Records that fail are dropped silently by the feeds; nothing here returns an
//! error.

use crate::constants::kinds;
use crate::models::tag_utils::extract_non_empty;
use crate::models::{photo, Record};

/// Lowercase hex string encoding exactly `bytes` bytes
pub fn is_hex_of_len(value: &str, bytes: usize) -> bool {
    !value.bytes().any(|b| b.is_ascii_uppercase())
        && hex::decode(value).is_ok_and(|decoded| decoded.len() == bytes)
}

/// Structural checks plus the required-tag rules for kinds the site renders.
pub fn is_well_formed(record: &Record) -> bool {
    if !is_hex_of_len(&record.id, 32) || !is_hex_of_len(&record.pubkey, 32) {
        return false;
    }

    match record.kind {
        kinds::CALENDAR_DATE | kinds::CALENDAR_TIME => is_valid_calendar_event(record),
        kinds::PICTURE => photo::has_image(record),
        _ => true,
    }
}

/// NIP-52: `d`, `title` and `start` are required; date events start on a
/// `YYYY-MM-DD` day, time events on a positive unix timestamp.
pub fn is_valid_calendar_event(record: &Record) -> bool {
    if record.kind != kinds::CALENDAR_DATE && record.kind != kinds::CALENDAR_TIME {
        return false;
    }

    let (Some(_), Some(_), Some(start)) = (
        extract_non_empty(record, "d"),
        extract_non_empty(record, "title"),
        extract_non_empty(record, "start"),
    ) else {
        return false;
    };

    if record.kind == kinds::CALENDAR_DATE {
        is_iso_date(start)
    } else {
        start.parse::<i64>().is_ok_and(|ts| ts > 0)
    }
}

fn is_iso_date(value: &str) -> bool {
    let bytes = value.as_bytes();
    let shaped = bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        });
    shaped && chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::test_support::*;

    const ID: &str = "8f0a5b2c0d0e9f1a2b3c4d5e6f708192a3b4c5d6e7f8091a2b3c4d5e6f708192";
    const PK: &str = "3f770d65d3a764a9c5cb503ae123e62ec7598ad035d836e2a810f3877a745b24";

    #[test]
    fn test_hex_checks() {
        assert!(is_hex_of_len(ID, 32));
        assert!(!is_hex_of_len(&ID.to_uppercase(), 32));
        assert!(!is_hex_of_len("x1", 32));
        assert!(!is_hex_of_len(&ID[..62], 32));
    }

    #[test]
    fn test_structural() {
        assert!(is_well_formed(&record(ID, PK, 1, 1)));
        assert!(!is_well_formed(&record("x1", PK, 1, 1)));
        assert!(!is_well_formed(&record(ID, "A", 1, 1)));
    }

    #[test]
    fn test_calendar_rules() {
        let base = with_tag(record(ID, PK, 31922, 1), &["d", "ev"]);
        let titled = with_tag(base.clone(), &["title", "Meetup"]);

        assert!(!is_well_formed(&base));
        assert!(!is_well_formed(&with_tag(titled.clone(), &["start", "2024-02-30"])));
        assert!(!is_well_formed(&with_tag(titled.clone(), &["start", "2024-2-3"])));
        assert!(is_well_formed(&with_tag(titled, &["start", "2024-02-29"])));

        let mut timed = with_tag(record(ID, PK, 31923, 1), &["d", "ev"]);
        timed = with_tag(timed, &["title", "Talk"]);
        assert!(!is_well_formed(&with_tag(timed.clone(), &["start", "0"])));
        assert!(is_well_formed(&with_tag(timed, &["start", "1700000000"])));
    }

    #[test]
    fn test_picture_requires_image() {
        let empty = record(ID, PK, 20, 1);
        let with_imeta = with_tag(empty.clone(), &["imeta", "url https://img/a.png"]);

        assert!(!is_well_formed(&empty));
        assert!(is_well_formed(&with_imeta));
    }

    #[test]
    fn test_addressable_without_d_is_valid() {
        assert!(is_well_formed(&record(ID, PK, 30023, 1)));
    }
}
