use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use telemetry::VehiclePosition;

use crate::config::TrackingConfig;

/// Operational state of a vehicle, derived fresh on every read from its most
/// recent sample and the current instant. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VehicleStatus {
    Active,
    EnRoute,
    Stopped,
    Offline,
}

/// Derives the operational state from the last known sample. Rules are
/// evaluated in order, first match wins:
///
/// - no sample ever recorded: offline
/// - sample older than the staleness threshold: offline, telemetry presumed lost
/// - speed above the moving threshold: en route
/// - speed at or below the moving threshold: stopped
/// - fresh sample without a speed signal: active
#[must_use]
pub fn derive(
    last: Option<&VehiclePosition>, now: DateTime<Utc>, config: &TrackingConfig,
) -> VehicleStatus {
    let Some(position) = last else {
        return VehicleStatus::Offline;
    };
    if now - position.updated_at > config.stale_after {
        return VehicleStatus::Offline;
    }
    match position.speed {
        Some(speed) if speed > config.moving_threshold_kmh => VehicleStatus::EnRoute,
        Some(_) => VehicleStatus::Stopped,
        None => VehicleStatus::Active,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{VehicleStatus, derive};
    use crate::config::TrackingConfig;
    use telemetry::VehiclePosition;

    fn position(age_minutes: i64, speed: Option<f64>) -> VehiclePosition {
        VehiclePosition {
            vehicle_id: "v-1".to_string(),
            latitude: -36.85,
            longitude: 174.76,
            speed,
            heading: None,
            updated_at: now() - Duration::minutes(age_minutes),
            tag: None,
        }
    }

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap()
    }

    #[test]
    fn no_sample_is_offline() {
        assert_eq!(derive(None, now(), &TrackingConfig::default()), VehicleStatus::Offline);
    }

    #[test]
    fn staleness_overrides_speed() {
        let position = position(45, Some(40.0));
        assert_eq!(
            derive(Some(&position), now(), &TrackingConfig::default()),
            VehicleStatus::Offline
        );
    }

    #[test]
    fn exactly_at_threshold_is_not_stale() {
        let position = position(30, Some(40.0));
        assert_eq!(
            derive(Some(&position), now(), &TrackingConfig::default()),
            VehicleStatus::EnRoute
        );
    }

    #[test]
    fn fresh_and_fast_is_en_route() {
        let position = position(1, Some(5.1));
        assert_eq!(
            derive(Some(&position), now(), &TrackingConfig::default()),
            VehicleStatus::EnRoute
        );
    }

    #[test]
    fn threshold_speed_is_stopped() {
        let position = position(1, Some(5.0));
        assert_eq!(
            derive(Some(&position), now(), &TrackingConfig::default()),
            VehicleStatus::Stopped
        );
    }

    #[test]
    fn no_speed_signal_is_active() {
        let position = position(1, None);
        assert_eq!(
            derive(Some(&position), now(), &TrackingConfig::default()),
            VehicleStatus::Active
        );
    }
}
