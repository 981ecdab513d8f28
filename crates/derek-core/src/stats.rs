use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::Serialize;

/// Counters for one relay
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RelayCounters {
    pub queries: u64,
    pub events_received: u64,
    pub failures: u64,
    pub timeouts: u64,
    pub published: u64,
    pub publish_failures: u64,
}

/// Per-relay outcomes of queries and publishes
#[derive(Debug, Default, Clone, Serialize)]
pub struct RelayStats {
    pub by_relay: HashMap<String, RelayCounters>,
}

impl RelayStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, url: &str) -> &mut RelayCounters {
        self.by_relay.entry(url.to_string()).or_default()
    }

    pub fn total_events(&self) -> u64 {
        self.by_relay.values().map(|c| c.events_received).sum()
    }

    /// Relays sorted by events received (descending)
    pub fn relays_by_events(&self) -> Vec<(String, RelayCounters)> {
        let mut relays: Vec<_> = self
            .by_relay
            .iter()
            .map(|(url, c)| (url.clone(), c.clone()))
            .collect();
        relays.sort_by(|a, b| b.1.events_received.cmp(&a.1.events_received).then(a.0.cmp(&b.0)));
        relays
    }
}

/// Thread-safe wrapper for relay stats
#[derive(Debug, Clone)]
pub struct SharedRelayStats {
    inner: Arc<RwLock<RelayStats>>,
}

impl Default for SharedRelayStats {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedRelayStats {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(RelayStats::new())),
        }
    }

    fn update(&self, url: &str, f: impl FnOnce(&mut RelayCounters)) {
        if let Ok(mut stats) = self.inner.write() {
            f(stats.entry(url));
        }
    }

    pub fn record_query(&self, url: &str, events: usize) {
        self.update(url, |c| {
            c.queries += 1;
            c.events_received += events as u64;
        });
    }

    pub fn record_failure(&self, url: &str) {
        self.update(url, |c| {
            c.queries += 1;
            c.failures += 1;
        });
    }

    pub fn record_timeout(&self, url: &str) {
        self.update(url, |c| {
            c.queries += 1;
            c.timeouts += 1;
        });
    }

    pub fn record_publish(&self, url: &str, accepted: bool) {
        self.update(url, |c| {
            if accepted {
                c.published += 1;
            } else {
                c.publish_failures += 1;
            }
        });
    }

    pub fn snapshot(&self) -> RelayStats {
        self.inner.read().map(|s| s.clone()).unwrap_or_default()
    }
}
