//! The relay pool: owns one connection per relay URL and fans reads and
//! writes out according to the router.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::{broadcast, Mutex, OnceCell};
use tokio::time::{timeout_at, Instant};

use super::connection::{Connector, NostrConnector, RelayConnection};
use super::router::RelayRouter;
use super::signal::AbortSignal;
use super::PoolError;
use crate::config::RelayConfig;
use crate::constants::DEFAULT_QUERY_TIMEOUT;
use crate::models::{QueryFilter, Record};
use crate::reconcile::sort_newest_first;
use crate::stats::{RelayStats, SharedRelayStats};
use crate::validation::is_hex_of_len;

/// Notifications emitted by the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolChange {
    /// Routing changed; cached query results are stale
    ResetQueries,
}

#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub signal: AbortSignal,
    pub timeout: Duration,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            signal: AbortSignal::never(),
            timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }
}

impl QueryOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }

    pub fn signal(mut self, signal: AbortSignal) -> Self {
        self.signal = signal;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishFailure {
    pub url: String,
    pub reason: String,
}

/// Per-relay outcome of a publish
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PublishReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<PublishFailure>,
}

type ConnectionSlot = Arc<OnceCell<Arc<dyn RelayConnection>>>;

pub struct RelayPool {
    connector: Arc<dyn Connector>,
    router: RelayRouter,
    connections: Mutex<HashMap<String, ConnectionSlot>>,
    changes: broadcast::Sender<PoolChange>,
    stats: SharedRelayStats,
}

impl RelayPool {
    pub fn new(connector: Arc<dyn Connector>, config: &RelayConfig) -> Self {
        let (changes, _) = broadcast::channel(16);
        Self {
            connector,
            router: RelayRouter::from_config(config),
            connections: Mutex::new(HashMap::new()),
            changes,
            stats: SharedRelayStats::new(),
        }
    }

    /// Pool backed by real websocket connections
    pub fn with_nostr(config: &RelayConfig) -> Self {
        Self::new(Arc::new(NostrConnector::default()), config)
    }

    pub fn router(&self) -> &RelayRouter {
        &self.router
    }

    pub fn subscribe_changes(&self) -> broadcast::Receiver<PoolChange> {
        self.changes.subscribe()
    }

    pub fn stats(&self) -> RelayStats {
        self.stats.snapshot()
    }

    /// Get the connection for `url`, opening it on first use.
    ///
    /// Concurrent first uses share one open. A failed open leaves the slot
    /// empty, so the next call tries again.
    pub async fn connection(&self, url: &str) -> Result<Arc<dyn RelayConnection>, PoolError> {
        let slot = {
            let mut connections = self.connections.lock().await;
            Arc::clone(connections.entry(url.to_string()).or_default())
        };

        let conn = slot.get_or_try_init(|| self.connector.open(url)).await?;
        Ok(Arc::clone(conn))
    }

    /// Change the primary relay and read mode.
    ///
    /// Open connections are kept. Subscribers get [`PoolChange::ResetQueries`]
    /// when anything actually changed.
    pub fn reconfigure(&self, primary: &str, use_all_relays: bool) -> bool {
        let changed = self.router.set_params(primary, use_all_relays);
        if changed {
            tracing::info!(
                "Relay routing changed: primary={} all_relays={}",
                primary,
                use_all_relays
            );
            // No subscribers is fine
            let _ = self.changes.send(PoolChange::ResetQueries);
        }
        changed
    }

    async fn fetch_from(
        &self,
        url: &str,
        filters: &[QueryFilter],
        timeout: Duration,
    ) -> Result<Vec<Record>, PoolError> {
        let conn = self.connection(url).await?;
        conn.fetch(filters, timeout).await
    }

    /// Fan `filters` out to the routed relays and merge what comes back.
    ///
    /// Each relay gets until the shared deadline; late relays contribute
    /// nothing. Fails only if every relay errored, or on abort. The result
    /// holds each record id once, newest first.
    pub async fn query(
        &self,
        filters: &[QueryFilter],
        options: QueryOptions,
    ) -> Result<Vec<Record>, PoolError> {
        if options.signal.is_aborted() {
            return Err(PoolError::Aborted);
        }

        let routes = self.router.route_query(filters);
        let attempted = routes.len();
        let timeout = options.timeout;
        let deadline = Instant::now() + timeout;

        let fetches = routes.iter().map(|(url, filters)| async move {
            let outcome = timeout_at(deadline, self.fetch_from(url, filters, timeout))
                .await
                .unwrap_or_else(|_| Err(PoolError::Timeout { url: url.clone() }));
            (url.as_str(), outcome)
        });

        let results = tokio::select! {
            results = join_all(fetches) => results,
            _ = options.signal.aborted() => {
                tracing::debug!("Query aborted with {} relay(s) in flight", attempted);
                return Err(PoolError::Aborted);
            }
        };

        let mut seen = HashSet::new();
        let mut records = Vec::new();
        let mut failures = 0;

        for (url, result) in results {
            match result {
                Ok(batch) => {
                    tracing::debug!("{} returned {} event(s)", url, batch.len());
                    self.stats.record_query(url, batch.len());
                    records.extend(batch.into_iter().filter(|r| seen.insert(r.id.clone())));
                }
                Err(e) if e.is_timeout() => {
                    tracing::warn!("{}", e);
                    self.stats.record_timeout(url);
                }
                Err(e) => {
                    tracing::warn!("{}", e);
                    self.stats.record_failure(url);
                    failures += 1;
                }
            }
        }

        if attempted > 0 && failures == attempted {
            return Err(PoolError::AllRelaysFailed { attempted });
        }

        sort_newest_first(&mut records);
        Ok(records)
    }

    /// Send a signed record to the publish targets.
    ///
    /// Succeeds when at least one relay accepted it; the report lists every
    /// relay's outcome.
    pub async fn publish(&self, record: &Record, timeout: Duration) -> Result<PublishReport, PoolError> {
        if !is_hex_of_len(&record.id, 32) || !is_hex_of_len(&record.pubkey, 32) {
            return Err(PoolError::InvalidRecord(format!(
                "malformed id or pubkey on {}",
                record.id
            )));
        }

        let targets = self.router.route_publish(record);
        let attempted = targets.len();
        let deadline = Instant::now() + timeout;

        let sends = targets.iter().map(|url| async move {
            let send = async {
                let conn = self.connection(url).await?;
                conn.publish(record).await
            };
            let outcome = timeout_at(deadline, send)
                .await
                .unwrap_or_else(|_| Err(PoolError::Timeout { url: url.clone() }));
            (url, outcome)
        });

        let mut report = PublishReport::default();
        for (url, outcome) in join_all(sends).await {
            match outcome {
                Ok(()) => {
                    self.stats.record_publish(url, true);
                    report.succeeded.push(url.clone());
                }
                Err(e) => {
                    tracing::warn!("Publish of {} to {} failed: {}", record.id, url, e);
                    self.stats.record_publish(url, false);
                    report.failed.push(PublishFailure {
                        url: url.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if report.succeeded.is_empty() {
            return Err(PoolError::NoRelayAccepted { attempted });
        }
        tracing::info!(
            "Published {} to {}/{} relay(s)",
            record.id,
            report.succeeded.len(),
            attempted
        );
        Ok(report)
    }

    /// Close every open connection. Later use reconnects.
    pub async fn close(&self) {
        let slots: Vec<ConnectionSlot> = {
            let mut connections = self.connections.lock().await;
            connections.drain().map(|(_, slot)| slot).collect()
        };

        for slot in slots {
            if let Some(conn) = slot.get() {
                tracing::debug!("Closing {}", conn.url());
                conn.close().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PresetRelay;
    use crate::constants::AUTHOR_PUBKEY_HEX;
    use crate::models::record::test_support::{record, with_tag};
    use crate::nostr::connection::mock::{Behavior, MockConnector};
    use crate::nostr::AbortController;
    use crate::reconcile::reconcile;

    const PRIMARY: &str = "wss://primary.test";
    const RELAY_A: &str = "wss://a.test";
    const RELAY_B: &str = "wss://b.test";

    fn hex_id(n: u32) -> String {
        format!("{:064x}", n)
    }

    fn config(use_all_relays: bool) -> RelayConfig {
        RelayConfig {
            relay_url: PRIMARY.to_string(),
            use_all_relays,
            preset_relays: vec![PresetRelay::new(RELAY_A, "A"), PresetRelay::new(RELAY_B, "B")],
        }
    }

    fn pool_with(mock: &Arc<MockConnector>, use_all_relays: bool) -> RelayPool {
        RelayPool::new(Arc::new(Arc::clone(mock)), &config(use_all_relays))
    }

    fn notes() -> Vec<QueryFilter> {
        vec![QueryFilter::new().kinds([1]).author(AUTHOR_PUBKEY_HEX)]
    }

    #[tokio::test]
    async fn test_duplicate_id_from_two_relays_yields_one_record() {
        let mock = MockConnector::new();
        let note = record(&hex_id(1), AUTHOR_PUBKEY_HEX, 1, 100);
        mock.set(RELAY_A, Behavior::Respond(vec![note.clone()]));
        mock.set(RELAY_B, Behavior::Respond(vec![note.clone()]));
        let pool = pool_with(&mock, true);

        let records = pool.query(&notes(), QueryOptions::default()).await.expect("query failed");
        assert_eq!(records, vec![note]);
    }

    #[tokio::test]
    async fn test_addressable_versions_reconcile_to_newest() {
        let mock = MockConnector::new();
        let v1 = with_tag(record(&hex_id(1), AUTHOR_PUBKEY_HEX, 30023, 1), &["d", "x"]);
        let v2 = with_tag(record(&hex_id(2), AUTHOR_PUBKEY_HEX, 30023, 2), &["d", "x"]);
        mock.set(RELAY_A, Behavior::Respond(vec![v1]));
        mock.set(RELAY_B, Behavior::Respond(vec![v2.clone()]));
        let pool = pool_with(&mock, true);

        let filters = vec![QueryFilter::new().kinds([30023])];
        let records = pool.query(&filters, QueryOptions::default()).await.expect("query failed");
        assert_eq!(records.len(), 2);
        assert_eq!(reconcile(records, &[]), vec![v2]);
    }

    #[tokio::test]
    async fn test_single_mode_only_contacts_primary() {
        let mock = MockConnector::new();
        let pool = pool_with(&mock, false);

        pool.query(&notes(), QueryOptions::default()).await.expect("query failed");

        let seen = mock.seen_filters.lock().expect("lock");
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, PRIMARY);
        assert_eq!(seen[0].1, notes());
    }

    #[tokio::test]
    async fn test_failed_relay_does_not_fail_query() {
        let mock = MockConnector::new();
        let note = record(&hex_id(1), AUTHOR_PUBKEY_HEX, 1, 100);
        mock.set(PRIMARY, Behavior::Unreachable);
        mock.set(RELAY_A, Behavior::Broken);
        mock.set(RELAY_B, Behavior::Respond(vec![note.clone()]));
        let pool = pool_with(&mock, true);

        let records = pool.query(&notes(), QueryOptions::default()).await.expect("query failed");
        assert_eq!(records, vec![note]);

        let stats = pool.stats();
        assert_eq!(stats.by_relay[RELAY_A].failures, 1);
        assert_eq!(stats.by_relay[PRIMARY].failures, 1);
        assert_eq!(stats.by_relay[RELAY_B].events_received, 1);
    }

    #[tokio::test]
    async fn test_all_relays_failing_is_an_error() {
        let mock = MockConnector::new();
        mock.set(PRIMARY, Behavior::Broken);
        mock.set(RELAY_A, Behavior::Unreachable);
        mock.set(RELAY_B, Behavior::Broken);
        let pool = pool_with(&mock, true);

        let err = pool.query(&notes(), QueryOptions::default()).await.unwrap_err();
        assert_eq!(err, PoolError::AllRelaysFailed { attempted: 3 });
    }

    #[tokio::test]
    async fn test_slow_relay_is_an_empty_contributor() {
        let mock = MockConnector::new();
        let note = record(&hex_id(1), AUTHOR_PUBKEY_HEX, 1, 100);
        mock.set(PRIMARY, Behavior::Hang);
        mock.set(RELAY_A, Behavior::Respond(vec![note.clone()]));
        let pool = pool_with(&mock, true);

        let options = QueryOptions::with_timeout(Duration::from_millis(50));
        let records = pool.query(&notes(), options).await.expect("query failed");
        assert_eq!(records, vec![note]);
        assert_eq!(pool.stats().by_relay[PRIMARY].timeouts, 1);
    }

    #[tokio::test]
    async fn test_only_slow_relays_yield_empty_result() {
        let mock = MockConnector::new();
        mock.set(PRIMARY, Behavior::Hang);
        let pool = pool_with(&mock, false);

        let options = QueryOptions::with_timeout(Duration::from_millis(20));
        let records = pool.query(&notes(), options).await.expect("timeouts are not failures");
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_abort_stops_waiting() {
        let mock = MockConnector::new();
        mock.set(PRIMARY, Behavior::Hang);
        let pool = pool_with(&mock, false);

        let controller = AbortController::new();
        let options = QueryOptions::with_timeout(Duration::from_secs(30)).signal(controller.signal());
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            controller.abort();
        });

        let result = tokio::time::timeout(Duration::from_secs(5), pool.query(&notes(), options))
            .await
            .expect("abort did not interrupt the query");
        assert_eq!(result, Err(PoolError::Aborted));
    }

    #[tokio::test]
    async fn test_already_aborted_signal() {
        let mock = MockConnector::new();
        let pool = pool_with(&mock, false);
        let controller = AbortController::new();
        controller.abort();

        let options = QueryOptions::default().signal(controller.signal());
        assert_eq!(pool.query(&notes(), options).await, Err(PoolError::Aborted));
        assert_eq!(mock.open_count(), 0);
    }

    #[tokio::test]
    async fn test_connections_are_reused() {
        let mock = MockConnector::new();
        let pool = pool_with(&mock, true);

        let first = pool.connection(RELAY_A).await.expect("open failed");
        let second = pool.connection(RELAY_A).await.expect("open failed");
        assert!(Arc::ptr_eq(&first, &second));

        let filters = notes();
        let (a, b) = tokio::join!(
            pool.query(&filters, QueryOptions::default()),
            pool.query(&filters, QueryOptions::default())
        );
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(mock.open_count(), 3);
    }

    #[tokio::test]
    async fn test_failed_open_is_retried() {
        let mock = MockConnector::new();
        mock.set(RELAY_A, Behavior::Unreachable);
        let pool = pool_with(&mock, false);

        assert!(pool.connection(RELAY_A).await.is_err());
        mock.set(RELAY_A, Behavior::Respond(Vec::new()));
        assert!(pool.connection(RELAY_A).await.is_ok());
        assert_eq!(mock.open_count(), 2);
    }

    #[tokio::test]
    async fn test_reconfigure_resets_queries_and_keeps_connections() {
        let mock = MockConnector::new();
        let pool = pool_with(&mock, true);
        let mut changes = pool.subscribe_changes();

        pool.query(&notes(), QueryOptions::default()).await.expect("query failed");
        assert_eq!(mock.open_count(), 3);

        assert!(pool.reconfigure(RELAY_A, false));
        assert_eq!(changes.try_recv(), Ok(PoolChange::ResetQueries));

        assert!(!pool.reconfigure(RELAY_A, false));
        assert!(changes.try_recv().is_err());

        pool.query(&notes(), QueryOptions::default()).await.expect("query failed");
        assert_eq!(mock.open_count(), 3);
    }

    #[tokio::test]
    async fn test_publish_succeeds_with_one_accepting_relay() {
        let mock = MockConnector::new();
        mock.set(RELAY_A, Behavior::Broken);
        mock.set(RELAY_B, Behavior::Unreachable);
        let pool = pool_with(&mock, false);
        let note = record(&hex_id(7), AUTHOR_PUBKEY_HEX, 1, 100);

        let report = pool
            .publish(&note, Duration::from_secs(1))
            .await
            .expect("publish failed");
        assert_eq!(report.succeeded, vec![PRIMARY.to_string()]);
        assert_eq!(report.failed.len(), 2);

        let published = mock.published.lock().expect("lock");
        assert_eq!(*published, vec![format!("{}:{}", PRIMARY, note.id)]);
    }

    #[tokio::test]
    async fn test_publish_fails_when_no_relay_accepts() {
        let mock = MockConnector::new();
        mock.set(PRIMARY, Behavior::Hang);
        mock.set(RELAY_A, Behavior::Broken);
        mock.set(RELAY_B, Behavior::Unreachable);
        let pool = pool_with(&mock, false);
        let note = record(&hex_id(7), AUTHOR_PUBKEY_HEX, 1, 100);

        let err = pool
            .publish(&note, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert_eq!(err, PoolError::NoRelayAccepted { attempted: 3 });
        assert_eq!(pool.stats().by_relay[PRIMARY].publish_failures, 1);
    }

    #[tokio::test]
    async fn test_publish_rejects_malformed_record() {
        let mock = MockConnector::new();
        let pool = pool_with(&mock, false);

        let err = pool
            .publish(&record("not-hex", AUTHOR_PUBKEY_HEX, 1, 1), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, PoolError::InvalidRecord(_)));
        assert_eq!(mock.open_count(), 0);
    }

    #[tokio::test]
    async fn test_close_disconnects_open_relays() {
        let mock = MockConnector::new();
        let pool = pool_with(&mock, false);
        pool.query(&notes(), QueryOptions::default()).await.expect("query failed");

        pool.close().await;
        assert_eq!(*mock.closed.lock().expect("lock"), vec![PRIMARY.to_string()]);

        pool.query(&notes(), QueryOptions::default()).await.expect("query failed");
        assert_eq!(mock.open_count(), 2);
    }
}
