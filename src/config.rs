use std::env;
use std::time::Duration;

/// Scheduling configuration for the live fleet monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Cadence of the snapshot/alert refresh.
    pub poll_interval: Duration,
    /// Trailing window scanned for alerts on each refresh. Kept wider than the
    /// prolonged-stop threshold so long stops are never cut off mid-window.
    pub alert_window: chrono::Duration,
    /// Deadline for any single call into the telemetry store.
    pub store_timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            alert_window: chrono::Duration::minutes(180),
            store_timeout: Duration::from_secs(10),
        }
    }
}

impl MonitorConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            poll_interval: Duration::from_secs(env_u64(
                "POLL_INTERVAL_SECONDS",
                defaults.poll_interval.as_secs(),
            )),
            alert_window: chrono::Duration::minutes(env_i64(
                "ALERT_WINDOW_MINUTES",
                defaults.alert_window.num_minutes(),
            )),
            store_timeout: Duration::from_secs(env_u64(
                "STORE_TIMEOUT_SECONDS",
                defaults.store_timeout.as_secs(),
            )),
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key).ok().and_then(|value| value.parse::<u64>().ok()).unwrap_or(default)
}

fn env_i64(key: &str, default: i64) -> i64 {
    env::var(key).ok().and_then(|value| value.parse::<i64>().ok()).unwrap_or(default)
}
