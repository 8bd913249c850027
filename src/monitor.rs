use std::collections::HashMap;

use anyhow::Context as _;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::Vehicle;
use futures::future;
use telemetry::{PositionChange, Result, TelemetryStore, bounded};
use tokio::sync::{broadcast, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use tracking::{
    Alert, FleetSnapshot, Reconstructor, TrackingConfig, VehicleStatus, scan, snapshot,
};

use crate::config::MonitorConfig;

/// Wall-clock access point. The core takes `now` as an argument everywhere;
/// only the monitor reads the clock, and only through this trait.
pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Downstream operator-notification boundary. The monitor's obligation ends
/// at handing over the alerts; persistence, acknowledgement, and
/// deduplication across refreshes live behind this trait.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn publish(&self, alerts: &[Alert]) -> anyhow::Result<()>;
}

/// Drives the pure tracking core: refreshes the fleet snapshot on a fixed
/// interval, rescans changed vehicles on store notifications, and forwards
/// detected alerts to the sink.
pub struct FleetMonitor<S, K, C = SystemClock> {
    store: S,
    sink: K,
    clock: C,
    fleet: Vec<Vehicle>,
    config: MonitorConfig,
    tracking: TrackingConfig,
}

impl<S, K, C> FleetMonitor<S, K, C>
where
    S: TelemetryStore + Clone,
    K: AlertSink,
    C: Clock,
{
    pub const fn new(
        store: S, sink: K, clock: C, fleet: Vec<Vehicle>, config: MonitorConfig,
        tracking: TrackingConfig,
    ) -> Self {
        Self { store, sink, clock, fleet, config, tracking }
    }

    /// Reads every vehicle's last position and derives a fresh fleet snapshot.
    /// Each store call is bounded by the configured deadline.
    ///
    /// # Errors
    ///
    /// Propagates store errors unchanged; deadline elapse surfaces as a
    /// retryable `StoreUnavailable`.
    pub async fn poll_once(&self) -> Result<FleetSnapshot> {
        let now = self.clock.now_utc();
        let mut positions = HashMap::new();

        for vehicle in &self.fleet {
            let last = bounded(
                self.config.store_timeout,
                "last position read",
                self.store.last_position(&vehicle.id),
            )
            .await?;
            if let Some(position) = last {
                positions.insert(vehicle.id.clone(), position);
            }
        }

        let snapshot = snapshot(&self.fleet, &positions, now, &self.tracking);
        debug!(
            en_route = snapshot.en_route,
            stopped = snapshot.stopped,
            offline = snapshot.offline,
            "fleet snapshot refreshed"
        );
        Ok(snapshot)
    }

    /// Reconstructs the trailing alert window for one vehicle and scans it.
    ///
    /// # Errors
    ///
    /// Propagates window, store, and telemetry validation errors unchanged.
    pub async fn scan_vehicle(&self, vehicle_id: &str) -> Result<Vec<Alert>> {
        let now = self.clock.now_utc();
        let from = now - self.config.alert_window;
        let reconstructor = Reconstructor::new(self.store.clone(), self.tracking.clone());

        let trajectory = bounded(
            self.config.store_timeout,
            "trajectory range read",
            reconstructor.reconstruct(vehicle_id, from, now),
        )
        .await?;

        Ok(scan(&trajectory.positions, &self.tracking))
    }

    /// One full refresh: snapshot, per-vehicle alert scan, publish.
    async fn tick(&self) -> anyhow::Result<FleetSnapshot> {
        let snapshot = self.poll_once().await.context("refreshing fleet snapshot")?;

        let mut alerts = Vec::new();
        for vehicle in &self.fleet {
            // offline vehicles have no fresh telemetry to scan
            if snapshot.statuses.get(&vehicle.id) == Some(&VehicleStatus::Offline) {
                continue;
            }
            let found = self
                .scan_vehicle(&vehicle.id)
                .await
                .with_context(|| format!("scanning {}", vehicle.display_name()))?;
            alerts.extend(found);
        }

        if !alerts.is_empty() {
            info!(count = alerts.len(), "publishing alerts");
            self.sink.publish(&alerts).await.context("publishing alerts")?;
        }

        Ok(snapshot)
    }

    async fn on_change(&self, change: PositionChange) {
        debug!(vehicle_id = %change.vehicle_id, "position change notification");
        match self.scan_vehicle(&change.vehicle_id).await {
            Ok(alerts) if !alerts.is_empty() => {
                if let Err(err) = self.sink.publish(&alerts).await {
                    error!(error = %err, vehicle_id = %change.vehicle_id, "failed to publish alerts");
                }
            }
            Ok(_) => {}
            Err(err) => {
                error!(error = %err, vehicle_id = %change.vehicle_id, "change-triggered scan failed");
            }
        }
    }

    /// Runs until the shutdown signal flips to `true`. Each refresh is
    /// independent and idempotent, so a failed tick is logged and the next one
    /// retries; duplicate alerts across refreshes are a sink concern.
    ///
    /// # Errors
    ///
    /// Returns an error only when the change-feed subscription itself cannot
    /// be established.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let mut changes = Some(
            self.store.subscribe_changes().await.context("subscribing to position changes")?,
        );
        let mut ticks = tokio::time::interval(self.config.poll_interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            vehicles = self.fleet.len(),
            interval = ?self.config.poll_interval,
            "fleet monitor started"
        );

        loop {
            tokio::select! {
                _ = ticks.tick() => {
                    if let Err(err) = self.tick().await {
                        error!(error = %err, "fleet poll failed");
                    }
                }
                change = next_change(&mut changes) => match change {
                    Ok(change) => self.on_change(change).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "change feed lagged, next poll will catch up");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        warn!("change feed closed, falling back to polling only");
                        changes = None;
                    }
                },
                changed = shutdown.changed() => {
                    // a dropped sender also means shut down
                    if changed.is_err() || *shutdown.borrow_and_update() {
                        break;
                    }
                }
            }
        }

        info!("fleet monitor stopped");
        Ok(())
    }
}

// Pends forever once the feed is gone so the select loop keeps polling.
async fn next_change(
    changes: &mut Option<broadcast::Receiver<PositionChange>>,
) -> std::result::Result<PositionChange, broadcast::error::RecvError> {
    match changes {
        Some(receiver) => receiver.recv().await,
        None => future::pending().await,
    }
}
