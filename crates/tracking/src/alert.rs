use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use telemetry::{Coordinate, SampleTag, VehiclePosition};
use tracing::warn;
use uuid::Uuid;

use crate::config::TrackingConfig;
use crate::trajectory::{TrajectorySegment, segments};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Speeding,
    ProlongedStop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// A derived threshold violation over a telemetry window. Ephemeral: the
/// detector's obligation ends at returning it; persistence and
/// acknowledgement belong downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    pub vehicle_id: String,
    pub kind: AlertKind,
    pub severity: Severity,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub location: Coordinate,
    pub description: String,
}

/// Scans an ordered telemetry window for threshold violations. Stateless per
/// invocation: duplicate alerts across scheduler ticks are a caller concern.
/// No matches yields an empty list, not an error.
#[must_use]
pub fn scan(positions: &[VehiclePosition], config: &TrackingConfig) -> Vec<Alert> {
    let mut alerts = Vec::new();

    for segment in segments(positions, config) {
        match segment.tag {
            SampleTag::Speeding => alerts.push(speeding(positions, &segment, config)),
            SampleTag::Stop if segment.duration() >= config.alerts.prolonged_stop => {
                alerts.push(prolonged_stop(positions, &segment));
            }
            _ => {}
        }
    }

    alerts
}

// One alert per maximal speeding run, spanning the whole run.
fn speeding(
    positions: &[VehiclePosition], segment: &TrajectorySegment, config: &TrackingConfig,
) -> Alert {
    let run = &positions[segment.start_index..=segment.end_index];
    let peak = run.iter().filter_map(|position| position.speed).fold(0.0_f64, f64::max);
    let vehicle_id = run[0].vehicle_id.clone();

    warn!(
        vehicle_id = %vehicle_id,
        peak_kmh = peak,
        limit_kmh = config.alerts.speed_limit_kmh,
        samples = segment.sample_count(),
        "speeding detected"
    );

    Alert {
        id: Uuid::new_v4().to_string(),
        vehicle_id,
        kind: AlertKind::Speeding,
        severity: Severity::High,
        started_at: segment.started_at,
        ended_at: segment.ended_at,
        location: segment.start,
        description: format!(
            "reached {peak:.0} km/h against a limit of {:.0} km/h",
            config.alerts.speed_limit_kmh
        ),
    }
}

// Anchored at the segment's start time and location.
fn prolonged_stop(positions: &[VehiclePosition], segment: &TrajectorySegment) -> Alert {
    let vehicle_id = positions[segment.start_index].vehicle_id.clone();
    let minutes = segment.duration().num_minutes();

    warn!(vehicle_id = %vehicle_id, minutes, "prolonged stop detected");

    Alert {
        id: Uuid::new_v4().to_string(),
        vehicle_id,
        kind: AlertKind::ProlongedStop,
        severity: Severity::Medium,
        started_at: segment.started_at,
        ended_at: segment.ended_at,
        location: segment.start,
        description: format!("stopped for {minutes} minutes"),
    }
}
