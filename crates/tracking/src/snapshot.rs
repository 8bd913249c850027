use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::Vehicle;
use serde::{Deserialize, Serialize};
use telemetry::VehiclePosition;

use crate::config::TrackingConfig;
use crate::status::{self, VehicleStatus};
use crate::trajectory::TrajectorySummary;

/// Point-in-time aggregate over the whole fleet. Recomputed on demand, never
/// mutated in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetSnapshot {
    pub taken_at: Option<DateTime<Utc>>,
    pub total_vehicles: usize,
    pub active: usize,
    pub en_route: usize,
    pub stopped: usize,
    pub offline: usize,
    pub active_routes: usize,
    /// Zero unless route figures were folded in; see `with_route_figures`.
    pub total_distance_km: f64,
    /// Zero unless route figures were folded in; see `with_route_figures`.
    pub mean_route_minutes: f64,
    pub statuses: HashMap<String, VehicleStatus>,
}

/// Tallies per-vehicle statuses across the registry. Distance and duration
/// figures stay zero here: they need trajectory data this aggregator does not
/// fetch, so callers combine the result with per-vehicle summaries via
/// `with_route_figures`.
#[must_use]
pub fn snapshot(
    vehicles: &[Vehicle], positions: &HashMap<String, VehiclePosition>, now: DateTime<Utc>,
    config: &TrackingConfig,
) -> FleetSnapshot {
    let mut snapshot = FleetSnapshot {
        taken_at: Some(now),
        total_vehicles: vehicles.len(),
        ..FleetSnapshot::default()
    };

    for vehicle in vehicles {
        let status = status::derive(positions.get(vehicle.id.as_str()), now, config);
        match status {
            VehicleStatus::Active => snapshot.active += 1,
            VehicleStatus::EnRoute => snapshot.en_route += 1,
            VehicleStatus::Stopped => snapshot.stopped += 1,
            VehicleStatus::Offline => snapshot.offline += 1,
        }
        snapshot.statuses.insert(vehicle.id.clone(), status);
    }

    snapshot.active_routes = snapshot.en_route;
    snapshot
}

impl FleetSnapshot {
    /// Folds per-vehicle trajectory summaries into the distance and duration
    /// aggregates. Windows without samples are skipped.
    #[must_use]
    pub fn with_route_figures<'a, I>(mut self, summaries: I) -> Self
    where
        I: IntoIterator<Item = &'a TrajectorySummary>,
    {
        let mut durations = Vec::new();
        for summary in summaries {
            if summary.sample_count == 0 {
                continue;
            }
            self.total_distance_km += summary.distance_km;
            durations.push(summary.duration_seconds);
        }

        if !durations.is_empty() {
            self.mean_route_minutes =
                durations.iter().sum::<i64>() as f64 / durations.len() as f64 / 60.0;
        }
        self
    }
}
