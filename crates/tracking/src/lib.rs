//! # Tracking
//!
//! Pure fleet tracking core: status derivation, geospatial utility, trajectory
//! reconstruction, alert detection, and fleet aggregation. Every function takes
//! `now` and its inputs explicitly; the only I/O seam is the `TelemetryStore`
//! handed to the reconstructor.

pub mod alert;
pub mod config;
pub mod geo;
pub mod snapshot;
pub mod status;
pub mod trajectory;

pub use crate::alert::*;
pub use crate::config::*;
pub use crate::geo::*;
pub use crate::snapshot::*;
pub use crate::status::*;
pub use crate::trajectory::*;
