use std::env;

use chrono::Duration;

/// Thresholds governing status derivation, sample classification, and alert
/// detection. Defaults match the operational rules the dashboard was tuned to;
/// every value can be overridden from the host environment.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingConfig {
    /// A vehicle with no sample newer than this is considered offline.
    pub stale_after: Duration,
    /// Samples faster than this count as movement, at or below as a stop.
    pub moving_threshold_kmh: f64,
    pub alerts: AlertConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertConfig {
    pub speed_limit_kmh: f64,
    /// A stop segment at least this long raises a prolonged-stop alert.
    pub prolonged_stop: Duration,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            stale_after: Duration::minutes(30),
            moving_threshold_kmh: 5.0,
            alerts: AlertConfig::default(),
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self { speed_limit_kmh: 80.0, prolonged_stop: Duration::minutes(120) }
    }
}

impl TrackingConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            stale_after: Duration::minutes(env_i64(
                "STALE_AFTER_MINUTES",
                defaults.stale_after.num_minutes(),
            )),
            moving_threshold_kmh: env_f64("MOVING_THRESHOLD_KMH", defaults.moving_threshold_kmh),
            alerts: AlertConfig::from_env(),
        }
    }
}

impl AlertConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            speed_limit_kmh: env_f64("SPEED_LIMIT_KMH", defaults.speed_limit_kmh),
            prolonged_stop: Duration::minutes(env_i64(
                "PROLONGED_STOP_MINUTES",
                defaults.prolonged_stop.num_minutes(),
            )),
        }
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    env::var(key).ok().and_then(|value| value.parse::<f64>().ok()).unwrap_or(default)
}

fn env_i64(key: &str, default: i64) -> i64 {
    env::var(key).ok().and_then(|value| value.parse::<i64>().ok()).unwrap_or(default)
}
