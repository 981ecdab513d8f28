//! Application-wide constants
//!
//! Centralized location for identities, relay defaults, timeouts and limits
//! that are shared between the pool, the feeds and the CLI.

use std::time::Duration;

/// Site author's npub
pub const AUTHOR_NPUB: &str = "npub18ams6ewn5aj2n3wt2qawzglx9mr4nzksxhvrdc4gzrecw7n5tvjqctp424";

/// Site author's pubkey (hex)
pub const AUTHOR_PUBKEY_HEX: &str =
    "3f770d65d3a764a9c5cb503ae123e62ec7598ad035d836e2a810f3877a745b24";

/// Default primary relay
pub const RELAY_URL: &str = "wss://relay.primal.net";

/// Well-known relays used to widen read/write reach, as `(url, name)`
pub const PRESET_RELAYS: &[(&str, &str)] = &[
    ("wss://relay.primal.net", "Primal"),
    ("wss://nostr-relay.derekross.me", "Derek Ross"),
    ("wss://nos.lol", "nos.lol"),
    ("wss://relay.ditto.pub", "Ditto"),
    ("wss://nostr.wine", "nostr.wine"),
    ("wss://relay.damus.io", "Damus"),
];

/// Upper bound on distinct relays a single publish is sent to
pub const MAX_PUBLISH_RELAYS: usize = 6;

// Timeouts
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);
pub const PAGED_QUERY_TIMEOUT: Duration = Duration::from_secs(8);
pub const PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// Stale windows for cached feed results
pub const SHORT_STALE_TIME: Duration = Duration::from_secs(5 * 60);
pub const LONG_STALE_TIME: Duration = Duration::from_secs(10 * 60);

/// Page size for the paginated article feed
pub const ARTICLE_PAGE_SIZE: usize = 20;

/// Words per minute used for article reading time
pub const READING_WORDS_PER_MINUTE: usize = 200;

/// Fallback title for calendar events without one
pub const DEFAULT_EVENT_TITLE: &str = "Untitled Event";

/// Keywords that make a long-form article topical for the highlights feed
pub const ARTICLE_TOPICS: &[&str] = &[
    "nostr",
    "decentralized",
    "censorship",
    "relay",
    "zap",
    "bitcoin",
];

// Nostr event kinds used by the site
pub mod kinds {
    /// Profile metadata
    pub const METADATA: u16 = 0;
    /// Text note
    pub const TEXT_NOTE: u16 = 1;
    /// Contact list
    pub const CONTACTS: u16 = 3;
    /// NIP-09 deletion request
    pub const DELETION: u16 = 5;
    /// NIP-68 picture
    pub const PICTURE: u16 = 20;
    /// NIP-65 relay list
    pub const RELAY_LIST: u16 = 10002;
    /// Long-form article
    pub const LONG_FORM: u16 = 30023;
    /// NIP-34 git repository announcement
    pub const GIT_REPOSITORY: u16 = 30617;
    /// NIP-52 date-based calendar event
    pub const CALENDAR_DATE: u16 = 31922;
    /// NIP-52 time-based calendar event
    pub const CALENDAR_TIME: u16 = 31923;
    /// NIP-89 application handler
    pub const APPLICATION: u16 = 31990;
}
