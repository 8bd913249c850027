use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::future;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::broadcast;
use tracing::warn;

use crate::error::{Error, Result};
use crate::position::VehiclePosition;

/// Emitted whenever a new position row lands in the store.
#[derive(Debug, Clone)]
pub struct PositionChange {
    pub vehicle_id: String,
    pub updated_at: DateTime<Utc>,
}

/// The `TelemetryStore` trait defines read access to vehicle position rows in
/// the external data store.
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    /// Most recent sample for the vehicle, if any was ever recorded.
    async fn last_position(&self, vehicle_id: &str) -> Result<Option<VehiclePosition>>;

    /// All samples with `from <= updated_at <= to`, ordered ascending by
    /// timestamp. The ordering is a contract: stores without a native ordered
    /// range query must order before returning.
    async fn query_range(
        &self, vehicle_id: &str, from: DateTime<Utc>, to: DateTime<Utc>,
    ) -> Result<Vec<VehiclePosition>>;

    /// Samples of the window as a lazily consumed stream. The default
    /// implementation falls back to loading the full window and iterating in
    /// memory; stores with native streaming should override it.
    fn stream_range<'a>(
        &'a self, vehicle_id: &'a str, from: DateTime<Utc>, to: DateTime<Utc>,
    ) -> BoxStream<'a, Result<VehiclePosition>> {
        let window = self.query_range(vehicle_id, from, to);
        stream::once(window)
            .map(|batch| match batch {
                Ok(positions) => stream::iter(positions.into_iter().map(Ok)).left_stream(),
                Err(err) => stream::once(future::ready(Err(err))).right_stream(),
            })
            .flatten()
            .boxed()
    }

    /// Change feed for the position table. Dropping the receiver unsubscribes.
    async fn subscribe_changes(&self) -> Result<broadcast::Receiver<PositionChange>>;
}

/// Bounds a store call with a deadline, surfacing elapse as a retryable
/// `StoreUnavailable`.
///
/// # Errors
///
/// Returns the operation's own error, or `Error::StoreUnavailable` when the
/// deadline elapses first.
pub async fn bounded<T, F>(limit: Duration, label: &str, operation: F) -> Result<T>
where
    F: Future<Output = Result<T>> + Send,
{
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => {
            warn!(label, ?limit, "store call exceeded deadline");
            Err(Error::StoreUnavailable(format!("{label} timed out after {limit:?}")))
        }
    }
}

/// In-memory telemetry store: per-vehicle rows kept timestamp ordered, change
/// notifications over a broadcast channel. Backs the integration tests and
/// embedders without a managed data store.
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    rows: Arc<DashMap<String, Vec<VehiclePosition>>>,
    changes: broadcast::Sender<PositionChange>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(256);
        Self { rows: Arc::new(DashMap::new()), changes }
    }

    /// Validates and records a sample, then notifies subscribers.
    ///
    /// # Errors
    ///
    /// Returns `Error::MalformedTelemetry` when the sample violates the
    /// telemetry invariants.
    pub fn record(&self, position: VehiclePosition) -> Result<()> {
        position.validate()?;
        let change = PositionChange {
            vehicle_id: position.vehicle_id.clone(),
            updated_at: position.updated_at,
        };

        let mut rows = self.rows.entry(position.vehicle_id.clone()).or_default();
        let at = rows.partition_point(|row| row.updated_at <= position.updated_at);
        rows.insert(at, position);
        drop(rows);

        // nobody listening is fine
        let _ = self.changes.send(change);
        Ok(())
    }

    #[must_use]
    pub fn sample_count(&self, vehicle_id: &str) -> usize {
        self.rows.get(vehicle_id).map_or(0, |rows| rows.len())
    }
}

#[async_trait]
impl TelemetryStore for InMemoryStore {
    async fn last_position(&self, vehicle_id: &str) -> Result<Option<VehiclePosition>> {
        Ok(self.rows.get(vehicle_id).and_then(|rows| rows.last().cloned()))
    }

    async fn query_range(
        &self, vehicle_id: &str, from: DateTime<Utc>, to: DateTime<Utc>,
    ) -> Result<Vec<VehiclePosition>> {
        let Some(rows) = self.rows.get(vehicle_id) else {
            return Ok(Vec::new());
        };
        Ok(rows
            .iter()
            .filter(|row| row.updated_at >= from && row.updated_at <= to)
            .cloned()
            .collect())
    }

    async fn subscribe_changes(&self) -> Result<broadcast::Receiver<PositionChange>> {
        Ok(self.changes.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use futures::StreamExt;
    use pretty_assertions::assert_eq;

    use super::{InMemoryStore, TelemetryStore, bounded};
    use crate::error::Error;
    use crate::position::VehiclePosition;

    fn sample(vehicle_id: &str, epoch: i64, speed: f64) -> VehiclePosition {
        VehiclePosition {
            vehicle_id: vehicle_id.to_string(),
            latitude: -36.85,
            longitude: 174.76,
            speed: Some(speed),
            heading: None,
            updated_at: Utc.timestamp_opt(epoch, 0).unwrap(),
            tag: None,
        }
    }

    #[tokio::test]
    async fn rows_ordered_regardless_of_insert_order() {
        let store = InMemoryStore::new();
        store.record(sample("v-1", 300, 10.0)).expect("valid");
        store.record(sample("v-1", 100, 20.0)).expect("valid");
        store.record(sample("v-1", 200, 30.0)).expect("valid");

        let from = Utc.timestamp_opt(0, 0).unwrap();
        let to = Utc.timestamp_opt(400, 0).unwrap();
        let rows = store.query_range("v-1", from, to).await.expect("query");
        let stamps: Vec<i64> = rows.iter().map(|row| row.updated_at.timestamp()).collect();

        assert_eq!(stamps, vec![100, 200, 300]);
    }

    #[tokio::test]
    async fn range_bounds_are_inclusive() {
        let store = InMemoryStore::new();
        for epoch in [100, 200, 300, 400] {
            store.record(sample("v-1", epoch, 0.0)).expect("valid");
        }

        let from = Utc.timestamp_opt(200, 0).unwrap();
        let to = Utc.timestamp_opt(300, 0).unwrap();
        let rows = store.query_range("v-1", from, to).await.expect("query");

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].updated_at.timestamp(), 200);
        assert_eq!(rows[1].updated_at.timestamp(), 300);
    }

    #[tokio::test]
    async fn last_position_tracks_latest_sample() {
        let store = InMemoryStore::new();
        assert!(store.last_position("v-1").await.expect("query").is_none());

        store.record(sample("v-1", 200, 40.0)).expect("valid");
        store.record(sample("v-1", 100, 10.0)).expect("valid");

        let last = store.last_position("v-1").await.expect("query").expect("recorded");
        assert_eq!(last.updated_at.timestamp(), 200);
    }

    #[tokio::test]
    async fn record_rejects_malformed_sample() {
        let store = InMemoryStore::new();
        let mut bad = sample("v-1", 100, 10.0);
        bad.latitude = 120.0;

        let err = store.record(bad).unwrap_err();
        assert_eq!(err.code(), "malformed_telemetry");
        assert_eq!(store.sample_count("v-1"), 0);
    }

    #[tokio::test]
    async fn change_feed_notifies_subscribers() {
        let store = InMemoryStore::new();
        let mut changes = store.subscribe_changes().await.expect("subscribe");

        store.record(sample("v-7", 100, 10.0)).expect("valid");

        let change = changes.recv().await.expect("notified");
        assert_eq!(change.vehicle_id, "v-7");
        assert_eq!(change.updated_at.timestamp(), 100);
    }

    #[tokio::test]
    async fn stream_fallback_matches_query_range() {
        let store = InMemoryStore::new();
        for epoch in [100, 200, 300] {
            store.record(sample("v-1", epoch, 15.0)).expect("valid");
        }

        let from = Utc.timestamp_opt(0, 0).unwrap();
        let to = Utc.timestamp_opt(400, 0).unwrap();
        let streamed: Vec<_> = store
            .stream_range("v-1", from, to)
            .map(|item| item.expect("valid sample"))
            .collect()
            .await;
        let queried = store.query_range("v-1", from, to).await.expect("query");

        assert_eq!(streamed, queried);
    }

    #[tokio::test]
    async fn bounded_maps_elapse_to_store_unavailable() {
        let err = bounded(std::time::Duration::from_millis(5), "range query", async {
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            Ok(())
        })
        .await
        .unwrap_err();

        assert!(matches!(err, Error::StoreUnavailable(_)));
        assert!(err.is_retryable());
    }
}
