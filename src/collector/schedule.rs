//! Collector scheduling primitives and errors.

use std::time::Duration;

use thiserror::Error;

/// Minimum allowed interval (1 second).
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Errors raised by the scheduling layer.
///
/// Fetch failures never leave a collection task; this type only reaches callers
/// when a job cannot be created, registered or shut down.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// Scheduler error.
    #[error("scheduler error: {0}")]
    Scheduler(String),
}

/// How often a collection task runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Never scheduled; the task contributes no metrics.
    Disabled,

    /// Fixed interval between cycle starts, at least [`MIN_INTERVAL`].
    Interval(Duration),
}

impl Schedule {
    /// Create a schedule from a configured interval.
    ///
    /// A zero interval disables the task. Anything shorter than
    /// [`MIN_INTERVAL`] is clamped up to it.
    pub fn interval(duration: Duration) -> Self {
        if duration.is_zero() {
            Self::Disabled
        } else if duration < MIN_INTERVAL {
            tracing::warn!(min_interval = ?MIN_INTERVAL,
                "Interval duration is less than minimum allowed. Using minimum duration."
            );
            Self::Interval(MIN_INTERVAL)
        } else {
            Self::Interval(duration)
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Interval(_))
    }
}

impl std::fmt::Display for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled"),
            Self::Interval(d) => write!(f, "every {:?}", d),
        }
    }
}
