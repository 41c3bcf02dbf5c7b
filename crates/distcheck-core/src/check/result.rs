//! Outcome of one check cycle

use crate::check::scope::Interrupt;
use crate::timing::{Timing, Timings};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Phase of a check cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Creating the probe record
    Create,
    /// Querying distribution status
    Check,
    /// Deleting the probe record
    Delete,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Create => "create",
            Phase::Check => "check",
            Phase::Delete => "delete",
        })
    }
}

/// Terminal failure of a check cycle
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckError {
    /// The zone API returned an error
    #[error("{phase} failed: {message}")]
    Api {
        /// Phase the call belonged to
        phase: Phase,
        /// Error reported by the API implementation
        message: String,
        /// Whether the API error is transient (rate limit, 5xx, transport)
        temporary: bool,
    },

    /// Distribution was not confirmed before the cycle deadline
    #[error("Timeout after {timeout:?}")]
    Timeout {
        /// Configured per-cycle timeout
        #[serde(with = "humantime_serde")]
        timeout: Duration,
    },

    /// Shutdown was requested while the cycle was running
    #[error("Cancelled: {reason}")]
    Cancelled {
        /// Why the cycle was cancelled
        reason: String,
    },
}

impl CheckError {
    /// Build an API error for a phase
    pub fn api(phase: Phase, err: &crate::Error) -> Self {
        Self::Api {
            phase,
            message: err.to_string(),
            temporary: err.is_temporary(),
        }
    }

    /// Whether the cycle ran out of time
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Whether the next cycle may well succeed
    ///
    /// A timeout means the record was still propagating; it is reported as
    /// temporary so consumers can tell it apart from hard failures.
    pub fn is_temporary(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Api { temporary, .. } => *temporary,
            Self::Cancelled { .. } => false,
        }
    }

    /// Whether the cycle was cancelled by shutdown
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

impl From<Interrupt> for CheckError {
    fn from(interrupt: Interrupt) -> Self {
        match interrupt {
            Interrupt::Timeout(timeout) => Self::Timeout { timeout },
            Interrupt::Cancelled => Self::Cancelled {
                reason: "shutdown requested".to_string(),
            },
        }
    }
}

/// Classified outcome of a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
    /// The provider confirmed distribution
    Distributed,
    /// The cycle deadline passed first
    TimedOut,
    /// Shutdown interrupted the cycle
    Cancelled,
    /// The zone API returned an error
    Failed,
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CycleOutcome::Distributed => "distributed",
            CycleOutcome::TimedOut => "timed_out",
            CycleOutcome::Cancelled => "cancelled",
            CycleOutcome::Failed => "failed",
        })
    }
}

/// Per-phase timing breakdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseTimings {
    /// Probe creation
    pub create: Timing,
    /// One entry per distribution query, in order
    pub check: Timings,
    /// Probe deletion; absent when the probe was never created
    pub delete: Option<Timing>,
}

/// Result of one check cycle
///
/// Built by the check engine once the cycle, including cleanup, is over.
/// Read-only from then on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub(crate) started_at: DateTime<Utc>,
    #[serde(with = "humantime_serde")]
    pub(crate) duration: Duration,
    pub(crate) check_count: usize,
    pub(crate) probe_name: String,
    pub(crate) created: bool,
    pub(crate) deleted: bool,
    pub(crate) error: Option<CheckError>,
    pub(crate) timings: PhaseTimings,
}

impl CheckResult {
    /// Instant the cycle began
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Time from the start of the cycle until its outcome was known
    ///
    /// Deletion of the probe record is not included; see
    /// [`PhaseTimings::delete`].
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Number of distribution queries performed
    pub fn check_count(&self) -> usize {
        self.check_count
    }

    /// Name of the probe record
    pub fn probe_name(&self) -> &str {
        &self.probe_name
    }

    /// Whether the provider confirmed creation of the probe record
    pub fn created(&self) -> bool {
        self.created
    }

    /// Whether the probe record was deleted afterwards
    pub fn deleted(&self) -> bool {
        self.deleted
    }

    /// Terminal failure, if any
    pub fn error(&self) -> Option<&CheckError> {
        self.error.as_ref()
    }

    /// Per-phase timings
    pub fn timings(&self) -> &PhaseTimings {
        &self.timings
    }

    /// Whether distribution was confirmed
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Classified outcome
    pub fn outcome(&self) -> CycleOutcome {
        match &self.error {
            None => CycleOutcome::Distributed,
            Some(CheckError::Timeout { .. }) => CycleOutcome::TimedOut,
            Some(CheckError::Cancelled { .. }) => CycleOutcome::Cancelled,
            Some(CheckError::Api { .. }) => CycleOutcome::Failed,
        }
    }

    /// Whether a probe record may have been left behind in the zone
    pub fn leaked_probe(&self) -> bool {
        self.created && !self.deleted
    }
}
