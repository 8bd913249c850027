//! # Fleet Tracking
//!
//! Library-level fleet tracking core for the logistics back-office: turns
//! noisy, intermittently-arriving vehicle telemetry into operational statuses,
//! reconstructed trajectories, and threshold alerts, and aggregates them into
//! fleet snapshots for the dashboard. The [`monitor`] module drives the pure
//! core on a polling interval and on store change notifications.

pub mod config;
pub mod monitor;

pub use common::{Vehicle, VehicleKind};
pub use telemetry::{
    Coordinate, Error, InMemoryStore, PositionChange, PositionRecord, Result, SampleTag,
    TelemetryStore, VehiclePosition, bounded,
};
pub use tracking::{
    Alert, AlertConfig, AlertKind, FleetSnapshot, Reconstructor, Severity, TrackingConfig,
    Trajectory, TrajectorySegment, TrajectorySummary, VehicleStatus, classify, derive,
    distance_km, scan, segments, snapshot, summarize,
};

pub use crate::config::MonitorConfig;
pub use crate::monitor::{AlertSink, Clock, FleetMonitor, SystemClock};
