use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use super::tag_utils::{extract_non_empty, extract_tag_str};
use super::Record;
use crate::constants::{kinds, AUTHOR_PUBKEY_HEX, DEFAULT_EVENT_TITLE};
use crate::validation;

/// A NIP-52 calendar event (kind:31922 date-based, kind:31923 time-based)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    /// `YYYY-MM-DD`
    pub date: String,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    /// Conference, Meetup, Workshop, Speaking, the raw t-tag, or "Event"
    pub event_type: String,
    /// Reference URL (r tag)
    pub url: Option<String>,
    pub is_creator: bool,
    pub is_past: bool,
    /// Start as unix seconds, used for ordering
    pub starts_at: Option<i64>,
}

impl CalendarEvent {
    /// Parse a calendar event; `None` for records that fail NIP-52 validation.
    pub fn from_record(record: &Record, now: DateTime<Utc>) -> Option<Self> {
        if !validation::is_valid_calendar_event(record) {
            return None;
        }

        let start = extract_tag_str(record, "start").unwrap_or("");
        let title = extract_non_empty(record, "title")
            .unwrap_or(DEFAULT_EVENT_TITLE)
            .to_string();
        let description = extract_non_empty(record, "description")
            .map(String::from)
            .or_else(|| Some(record.content.clone()).filter(|c| !c.is_empty()));

        let (date, start_time, end_time, starts_at) = if record.kind == kinds::CALENDAR_DATE {
            let starts_at = NaiveDate::parse_from_str(start, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc().timestamp());
            (
                start.to_string(),
                extract_non_empty(record, "start_time").map(String::from),
                extract_non_empty(record, "end_time").map(String::from),
                starts_at,
            )
        } else {
            let start_dt = start
                .parse::<i64>()
                .ok()
                .and_then(|secs| DateTime::from_timestamp(secs, 0));
            let end_dt = extract_non_empty(record, "end")
                .and_then(|v| v.parse::<i64>().ok())
                .and_then(|secs| DateTime::from_timestamp(secs, 0));
            match start_dt {
                Some(dt) => (
                    dt.format("%Y-%m-%d").to_string(),
                    Some(dt.format("%H:%M").to_string()),
                    end_dt.map(|e| e.format("%H:%M").to_string()),
                    Some(dt.timestamp()),
                ),
                None => (String::new(), None, None, None),
            }
        };

        Some(Self {
            id: record.id.clone(),
            title,
            description,
            location: extract_non_empty(record, "location").map(String::from),
            date,
            start_time,
            end_time,
            event_type: event_type(extract_non_empty(record, "t")),
            url: extract_non_empty(record, "r").map(String::from),
            is_creator: record.pubkey == AUTHOR_PUBKEY_HEX,
            is_past: starts_at.is_some_and(|ts| ts < now.timestamp()),
            starts_at,
        })
    }
}

fn event_type(tag: Option<&str>) -> String {
    let Some(tag) = tag else {
        return "Event".to_string();
    };
    let lower = tag.to_lowercase();
    for (needle, label) in [
        ("conference", "Conference"),
        ("meetup", "Meetup"),
        ("workshop", "Workshop"),
        ("speaking", "Speaking"),
    ] {
        if lower.contains(needle) {
            return label.to_string();
        }
    }
    tag.to_string()
}

/// Upcoming events first (soonest first), then past events (most recent first)
pub fn sort_events(events: &mut [CalendarEvent]) {
    events.sort_by(|a, b| {
        let a_start = a.starts_at.unwrap_or(0);
        let b_start = b.starts_at.unwrap_or(0);
        match (a.is_past, b.is_past) {
            (false, true) => std::cmp::Ordering::Less,
            (true, false) => std::cmp::Ordering::Greater,
            (false, false) => a_start.cmp(&b_start),
            (true, true) => b_start.cmp(&a_start),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::test_support::*;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).expect("valid timestamp")
    }

    fn date_event(id: &str, start: &str) -> Record {
        let rec = with_tag(record(id, AUTHOR_PUBKEY_HEX, 31922, 1), &["d", id]);
        let rec = with_tag(rec, &["title", "Nostr Meetup"]);
        with_tag(rec, &["start", start])
    }

    fn time_event(id: &str, start: i64) -> Record {
        let rec = with_tag(record(id, "someone", 31923, 1), &["d", id]);
        let rec = with_tag(rec, &["title", "Talk"]);
        let rec = with_tag(rec, &["start", &start.to_string()]);
        let rec = with_tag(rec, &["end", &(start + 3600).to_string()]);
        with_tag(rec, &["t", "Speaking engagement"])
    }

    #[test]
    fn test_date_based() {
        let rec = with_tag(date_event("m1", "2030-05-01"), &["location", "Nashville"]);
        let event = CalendarEvent::from_record(&rec, now()).expect("Failed to parse event");

        assert_eq!(event.date, "2030-05-01");
        assert_eq!(event.location.as_deref(), Some("Nashville"));
        assert_eq!(event.event_type, "Event");
        assert!(event.is_creator);
        assert!(!event.is_past);
    }

    #[test]
    fn test_time_based() {
        let event = CalendarEvent::from_record(&time_event("t1", 1_600_000_000), now())
            .expect("Failed to parse event");

        assert_eq!(event.date, "2020-09-13");
        assert_eq!(event.start_time.as_deref(), Some("12:26"));
        assert_eq!(event.end_time.as_deref(), Some("13:26"));
        assert_eq!(event.event_type, "Speaking");
        assert!(event.is_past);
        assert!(!event.is_creator);
    }

    #[test]
    fn test_invalid_events_rejected() {
        assert!(CalendarEvent::from_record(&date_event("bad", "05/01/2030"), now()).is_none());
        assert!(CalendarEvent::from_record(&time_event("neg", -5), now()).is_none());
    }

    #[test]
    fn test_sort_events() {
        let mut events: Vec<CalendarEvent> = [
            date_event("past-old", "2020-01-01"),
            date_event("future-far", "2031-01-01"),
            date_event("past-recent", "2023-01-01"),
            date_event("future-soon", "2030-01-01"),
        ]
        .iter()
        .filter_map(|r| CalendarEvent::from_record(r, now()))
        .collect();

        sort_events(&mut events);
        let ids: Vec<_> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["future-soon", "future-far", "past-recent", "past-old"]);
    }
}
