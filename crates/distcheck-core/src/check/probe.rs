//! Probe record naming
//!
//! A probe is a temporary TXT record whose name and content both carry the
//! instant its cycle started:
//!
//! ```text
//! _distribution_check_20240315120000    TXT    "distribution-check: 2024-03-15T12:00:00Z"
//! ```
//!
//! Names have second resolution. Only the first probe of a second later than
//! every second seen so far gets the plain name; any other probe (same second,
//! or an earlier one after a clock step or a late naming call) gets a `_<n>`
//! suffix from a counter that never repeats within the process.

use crate::traits::RecordAttributes;
use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::Mutex;

/// Prefix of every probe record name
pub const PROBE_PREFIX: &str = "_distribution_check_";

/// Prefix of every probe record's content
pub const CONTENT_PREFIX: &str = "distribution-check: ";

/// Name and content of one probe record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    /// Record name relative to the zone
    pub name: String,
    /// TXT content
    pub content: String,
}

impl Probe {
    /// Build the probe for a cycle started at `started_at`
    ///
    /// `sequence` is 0 for the first probe of a given second and counts up
    /// for later ones.
    pub fn new(started_at: DateTime<Utc>, sequence: u32) -> Self {
        let stamp = started_at.format("%Y%m%d%H%M%S");
        let name = if sequence == 0 {
            format!("{PROBE_PREFIX}{stamp}")
        } else {
            format!("{PROBE_PREFIX}{stamp}_{sequence}")
        };

        Self {
            name,
            content: format!(
                "{CONTENT_PREFIX}{}",
                started_at.to_rfc3339_opts(SecondsFormat::Secs, true)
            ),
        }
    }

    /// Record attributes sent to the zone API
    pub fn attributes(&self) -> RecordAttributes {
        RecordAttributes::txt(&self.name, &self.content)
    }
}

/// Issues probe names that are unique within the process
#[derive(Debug, Default)]
pub struct ProbeNamer {
    state: Mutex<NamerState>,
}

#[derive(Debug, Default)]
struct NamerState {
    // Highest second a name was issued for
    latest: Option<i64>,
    // Last suffix handed out; shared by all seconds
    suffixes: u32,
}

impl ProbeNamer {
    /// Create a namer with no history
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the probe for a cycle started at `started_at`
    pub fn probe(&self, started_at: DateTime<Utc>) -> Probe {
        let second = started_at.timestamp();
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        // Plain names are only issued for strictly increasing seconds
        let sequence = match state.latest {
            Some(latest) if second <= latest => {
                state.suffixes += 1;
                state.suffixes
            }
            _ => {
                state.latest = Some(second);
                0
            }
        };

        Probe::new(started_at, sequence)
    }
}
