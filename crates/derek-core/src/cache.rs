//! Stale-time cache for raw feed results.
//!
//! Entries are keyed by feed name (plus cursor where relevant) and hold the
//! unprocessed records, so feeds re-run parsing on every hit. The whole cache
//! is dropped when the pool's routing changes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use crate::models::Record;
use crate::nostr::PoolChange;

struct CacheEntry {
    fetched_at: Instant,
    records: Vec<Record>,
}

#[derive(Default)]
pub struct QueryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached records for `key` if they are younger than `stale_after`
    pub fn get_fresh(&self, key: &str, stale_after: Duration) -> Option<Vec<Record>> {
        let entries = self.entries.lock();
        entries
            .get(key)
            .filter(|entry| entry.fetched_at.elapsed() < stale_after)
            .map(|entry| entry.records.clone())
    }

    pub fn insert(&self, key: impl Into<String>, records: Vec<Record>) {
        self.entries.lock().insert(
            key.into(),
            CacheEntry {
                fetched_at: Instant::now(),
                records,
            },
        );
    }

    pub fn reset(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear the cache whenever the pool asks for a query reset.
    ///
    /// Runs until the pool is dropped. A lagged receiver also clears, since a
    /// reset may have been missed.
    pub fn listen(self: Arc<Self>, mut changes: broadcast::Receiver<PoolChange>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(PoolChange::ResetQueries) | Err(RecvError::Lagged(_)) => {
                        tracing::debug!("Dropping {} cached quer(ies)", self.len());
                        self.reset();
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}
