//! One logical connection per relay URL.
//!
//! The pool only talks to relays through [`RelayConnection`]; [`Connector`]
//! decides how a URL becomes a connection. Production uses `nostr-sdk`, tests
//! plug in a scripted connector.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::{join_all, BoxFuture};
use nostr_sdk::{Client, Event, Filter, RelayStatus};

use super::PoolError;
use crate::constants::CONNECT_TIMEOUT;
use crate::models::{QueryFilter, Record};

pub trait RelayConnection: Send + Sync {
    fn url(&self) -> &str;

    /// Run every filter once and return the stored events (until EOSE or `timeout`).
    fn fetch<'a>(
        &'a self,
        filters: &'a [QueryFilter],
        timeout: Duration,
    ) -> BoxFuture<'a, Result<Vec<Record>, PoolError>>;

    /// Send a signed record; `Ok` only when the relay accepted it.
    fn publish<'a>(&'a self, record: &'a Record) -> BoxFuture<'a, Result<(), PoolError>>;

    fn close(&self) -> BoxFuture<'_, ()>;
}

/// Opens connections on first use of a URL
pub trait Connector: Send + Sync {
    fn open<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Arc<dyn RelayConnection>, PoolError>>;
}

pub(crate) fn to_nostr_filter(filter: &QueryFilter) -> Result<Filter, serde_json::Error> {
    serde_json::from_value(serde_json::to_value(filter)?)
}

pub(crate) fn record_from_event(event: &Event) -> Result<Record, serde_json::Error> {
    serde_json::from_value(serde_json::to_value(event)?)
}

pub(crate) fn event_from_record(record: &Record) -> Result<Event, serde_json::Error> {
    serde_json::from_value(serde_json::to_value(record)?)
}

/// [`Connector`] backed by one `nostr_sdk::Client` per relay
#[derive(Debug, Clone)]
pub struct NostrConnector {
    connect_timeout: Duration,
}

impl Default for NostrConnector {
    fn default() -> Self {
        Self::new(CONNECT_TIMEOUT)
    }
}

impl NostrConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    async fn connect(&self, url: &str) -> Result<Arc<dyn RelayConnection>, PoolError> {
        let fail = |reason: String| PoolError::Connection {
            url: url.to_string(),
            reason,
        };

        let client = Client::builder().build();
        client.add_relay(url).await.map_err(|e| fail(e.to_string()))?;

        let connect_start = Instant::now();
        if tokio::time::timeout(self.connect_timeout, client.connect())
            .await
            .is_err()
        {
            return Err(fail(format!("connect timed out after {:?}", self.connect_timeout)));
        }

        // Relay status transitions asynchronously after connect() returns
        let poll_interval = Duration::from_millis(100);
        loop {
            let connected = client
                .relays()
                .await
                .values()
                .any(|r| r.status() == RelayStatus::Connected);
            if connected {
                tracing::debug!("Connected to {} in {:?}", url, connect_start.elapsed());
                break;
            }
            if connect_start.elapsed() >= self.connect_timeout {
                client.disconnect().await;
                return Err(fail(format!(
                    "not connected after {:?}",
                    self.connect_timeout
                )));
            }
            tokio::time::sleep(poll_interval).await;
        }

        Ok(Arc::new(NostrConnection {
            url: url.to_string(),
            client,
        }))
    }
}

impl Connector for NostrConnector {
    fn open<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Arc<dyn RelayConnection>, PoolError>> {
        Box::pin(self.connect(url))
    }
}

pub struct NostrConnection {
    url: String,
    client: Client,
}

impl NostrConnection {
    async fn fetch_one(&self, filter: &QueryFilter, timeout: Duration) -> Result<Vec<Record>, PoolError> {
        let query_error = |reason: String| PoolError::Query {
            url: self.url.clone(),
            reason,
        };

        let filter = to_nostr_filter(filter).map_err(|e| query_error(e.to_string()))?;
        let events = self
            .client
            .fetch_events(filter, timeout)
            .await
            .map_err(|e| query_error(e.to_string()))?;

        let mut records = Vec::new();
        for event in events.into_iter() {
            match record_from_event(&event) {
                Ok(record) => records.push(record),
                Err(e) => tracing::debug!("Dropping unconvertible event from {}: {}", self.url, e),
            }
        }
        Ok(records)
    }
}

impl RelayConnection for NostrConnection {
    fn url(&self) -> &str {
        &self.url
    }

    fn fetch<'a>(
        &'a self,
        filters: &'a [QueryFilter],
        timeout: Duration,
    ) -> BoxFuture<'a, Result<Vec<Record>, PoolError>> {
        Box::pin(async move {
            let results = join_all(filters.iter().map(|f| self.fetch_one(f, timeout))).await;
            let mut records = Vec::new();
            for result in results {
                records.extend(result?);
            }
            Ok(records)
        })
    }

    fn publish<'a>(&'a self, record: &'a Record) -> BoxFuture<'a, Result<(), PoolError>> {
        Box::pin(async move {
            let publish_error = |reason: String| PoolError::Publish {
                url: self.url.clone(),
                reason,
            };

            let event = event_from_record(record).map_err(|e| PoolError::InvalidRecord(e.to_string()))?;
            let output = self
                .client
                .send_event(&event)
                .await
                .map_err(|e| publish_error(e.to_string()))?;

            if output.success.is_empty() {
                let reason = output
                    .failed
                    .values()
                    .next()
                    .cloned()
                    .unwrap_or_else(|| "rejected".to_string());
                return Err(publish_error(reason));
            }
            Ok(())
        })
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.client.disconnect().await;
        })
    }
}
