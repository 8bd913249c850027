use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across the tracking crates.
pub type Result<T> = std::result::Result<T, Error>;

/// Domain level error type returned by the telemetry adapter and its consumers.
#[derive(Error, Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Error {
    /// The telemetry store failed to answer within the deadline or returned a
    /// transport-level failure. Retryable by the caller with backoff.
    #[error("code: store_unavailable, description: {0}")]
    StoreUnavailable(String),

    /// A position sample violates the telemetry invariants, or a range query
    /// returned samples out of timestamp order. Not retryable; the description
    /// identifies the offending sample.
    #[error("code: malformed_telemetry, description: {0}")]
    MalformedTelemetry(String),

    /// A range query was asked for a window whose start is after its end.
    /// Rejected before any store call.
    #[error("code: invalid_window, description: {0}")]
    InvalidWindow(String),
}

impl Error {
    /// Returns the stable error code associated with the variant.
    #[must_use]
    pub const fn code(&self) -> &str {
        match self {
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::MalformedTelemetry(_) => "malformed_telemetry",
            Self::InvalidWindow(_) => "invalid_window",
        }
    }

    /// Returns the error description.
    #[must_use]
    pub fn description(&self) -> String {
        self.to_string()
    }

    /// Whether the caller may retry the failed operation.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedTelemetry(format!("failed to deserialize position row: {err}"))
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<Self>() {
            Some(Self::StoreUnavailable(e)) => Self::StoreUnavailable(format!("{err}: {e}")),
            Some(Self::MalformedTelemetry(e)) => Self::MalformedTelemetry(format!("{err}: {e}")),
            Some(Self::InvalidWindow(e)) => Self::InvalidWindow(format!("{err}: {e}")),
            None => {
                let stack = err.chain().fold(String::new(), |cause, e| format!("{cause} -> {e}"));
                let stack = stack.trim_start_matches(" -> ").to_string();
                Self::StoreUnavailable(stack)
            }
        }
    }
}
