use chrono::{DateTime, Utc};
use futures::stream::{BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use telemetry::{Coordinate, Error, Result, SampleTag, TelemetryStore, VehiclePosition};
use tracing::debug;

use crate::config::TrackingConfig;
use crate::geo;

/// A maximal run of consecutive same-classification samples. Index range is
/// inclusive and refers back into the trajectory's position list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrajectorySegment {
    pub tag: SampleTag,
    pub start_index: usize,
    pub end_index: usize,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub start: Coordinate,
    pub end: Coordinate,
    /// Summed haversine distance between consecutive points within the run.
    pub distance_km: f64,
}

impl TrajectorySegment {
    #[must_use]
    pub const fn sample_count(&self) -> usize {
        self.end_index - self.start_index + 1
    }

    #[must_use]
    pub fn duration(&self) -> chrono::Duration {
        self.ended_at - self.started_at
    }
}

/// Summary statistics for one reconstructed window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrajectorySummary {
    pub sample_count: usize,
    pub moving_count: usize,
    pub stopped_count: usize,
    /// Mean over samples that carry a speed signal; zero when none do.
    pub mean_speed_kmh: f64,
    pub distance_km: f64,
    pub duration_seconds: i64,
}

/// An ordered, classified position history for one vehicle and time window.
/// Built transiently per query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trajectory {
    pub vehicle_id: String,
    pub positions: Vec<VehiclePosition>,
    pub segments: Vec<TrajectorySegment>,
    pub summary: TrajectorySummary,
}

/// Classifies one sample: movement above the moving threshold, stop at or
/// below it, speeding above the configured limit. A recorded tag is only
/// consulted when the sample carries no speed signal.
#[must_use]
pub fn classify(position: &VehiclePosition, config: &TrackingConfig) -> SampleTag {
    match position.speed {
        Some(speed) if speed > config.moving_threshold_kmh => {
            if speed > config.alerts.speed_limit_kmh {
                SampleTag::Speeding
            } else {
                SampleTag::Movement
            }
        }
        Some(_) => SampleTag::Stop,
        None => position.tag.unwrap_or(SampleTag::Stop),
    }
}

/// Groups consecutive same-classification samples into segments. Input must
/// already be ordered ascending by timestamp.
#[must_use]
pub fn segments(positions: &[VehiclePosition], config: &TrackingConfig) -> Vec<TrajectorySegment> {
    let mut result = Vec::new();
    let mut start = 0;

    while start < positions.len() {
        let tag = classify(&positions[start], config);
        let mut end = start;
        while end + 1 < positions.len() && classify(&positions[end + 1], config) == tag {
            end += 1;
        }

        let run = &positions[start..=end];
        let distance_km = run
            .windows(2)
            .map(|pair| geo::distance_km(pair[0].coordinate(), pair[1].coordinate()))
            .sum();
        let first = &run[0];
        let last = &run[run.len() - 1];

        result.push(TrajectorySegment {
            tag,
            start_index: start,
            end_index: end,
            started_at: first.updated_at,
            ended_at: last.updated_at,
            start: first.coordinate(),
            end: last.coordinate(),
            distance_km,
        });
        start = end + 1;
    }

    result
}

/// Summarises an ordered window and its segments.
#[must_use]
pub fn summarize(
    positions: &[VehiclePosition], segments: &[TrajectorySegment],
) -> TrajectorySummary {
    let stopped_count = segments
        .iter()
        .filter(|segment| segment.tag == SampleTag::Stop)
        .map(TrajectorySegment::sample_count)
        .sum::<usize>();

    let speeds: Vec<f64> = positions.iter().filter_map(|position| position.speed).collect();
    let mean_speed_kmh = if speeds.is_empty() {
        0.0
    } else {
        speeds.iter().sum::<f64>() / speeds.len() as f64
    };

    let duration_seconds = match (positions.first(), positions.last()) {
        (Some(first), Some(last)) => (last.updated_at - first.updated_at).num_seconds(),
        _ => 0,
    };

    TrajectorySummary {
        sample_count: positions.len(),
        moving_count: positions.len() - stopped_count,
        stopped_count,
        mean_speed_kmh,
        distance_km: segments.iter().map(|segment| segment.distance_km).sum(),
        duration_seconds,
    }
}

/// Rebuilds ordered, classified position history from the telemetry store.
#[derive(Debug, Clone)]
pub struct Reconstructor<S> {
    store: S,
    config: TrackingConfig,
}

impl<S: TelemetryStore> Reconstructor<S> {
    pub const fn new(store: S, config: TrackingConfig) -> Self {
        Self { store, config }
    }

    #[must_use]
    pub const fn config(&self) -> &TrackingConfig {
        &self.config
    }

    /// Streams the window's samples lazily, validating each against the
    /// telemetry invariants and the store's ordering contract. Dropping the
    /// stream abandons the query; no writes are performed anywhere.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidWindow` before any store call when `from > to`.
    /// Stream items fail with `Error::MalformedTelemetry` on an invariant
    /// violation or an out-of-order sample, or with the store's own error.
    pub fn stream<'a>(
        &'a self, vehicle_id: &'a str, from: DateTime<Utc>, to: DateTime<Utc>,
    ) -> Result<BoxStream<'a, Result<VehiclePosition>>> {
        if from > to {
            return Err(Error::InvalidWindow(format!("window start {from} is after end {to}")));
        }

        let mut last_seen: Option<DateTime<Utc>> = None;
        let checked = self.store.stream_range(vehicle_id, from, to).map(move |item| {
            let position = item?;
            position.validate()?;
            if let Some(previous) = last_seen
                && position.updated_at < previous
            {
                return Err(Error::MalformedTelemetry(format!(
                    "vehicle {} at {}: sample out of order, previous sample at {previous}",
                    position.vehicle_id, position.updated_at
                )));
            }
            last_seen = Some(position.updated_at);
            Ok(position)
        });

        Ok(checked.boxed())
    }

    /// Loads the window and derives segments and summary statistics.
    ///
    /// # Errors
    ///
    /// Propagates window, store, and telemetry validation errors unchanged;
    /// never returns a partial trajectory.
    pub async fn reconstruct(
        &self, vehicle_id: &str, from: DateTime<Utc>, to: DateTime<Utc>,
    ) -> Result<Trajectory> {
        let mut stream = self.stream(vehicle_id, from, to)?;
        let mut positions = Vec::new();
        while let Some(item) = stream.next().await {
            positions.push(item?);
        }
        drop(stream);

        debug!(vehicle_id, samples = positions.len(), "reconstructed trajectory window");

        let segments = segments(&positions, &self.config);
        let summary = summarize(&positions, &segments);
        Ok(Trajectory { vehicle_id: vehicle_id.to_string(), positions, segments, summary })
    }
}
