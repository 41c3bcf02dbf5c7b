//! Check engine
//!
//! Runs one verification cycle end to end:
//!
//! ```text
//!  create ──err──────────────────────────────────────────────┐
//!    │ ok                                                    │
//!    ▼                                                       │
//!  poll ◄──── not distributed ────┐                          │
//!    │  every `poll`, bounded by the cycle scope             │
//!    ├── distributed ──► success  │                          │
//!    ├── api error   ──► failed   ├──► delete ──► result ◄───┘
//!    ├── deadline    ──► timeout  │   (cleanup scope)
//!    └── shutdown    ──► cancelled┘
//! ```
//!
//! The cycle's `duration` is frozen as soon as the outcome is known, so
//! reported latency is detection latency. Deletion is timed separately and
//! runs under a [`CleanupScope`] that neither the cycle deadline nor a
//! shutdown request can cancel.
//!
//! Every exit path after a successful create goes through cleanup exactly
//! once: polling returns its outcome as a value instead of returning early
//! from the cycle.

pub mod probe;
pub mod result;
pub mod scope;

pub use probe::{Probe, ProbeNamer};
pub use result::{CheckError, CheckResult, CycleOutcome, Phase, PhaseTimings};
pub use scope::{CleanupScope, CycleScope, Interrupt};

use crate::timing::{Stopwatch, Timing, Timings};
use crate::traits::{AccountId, ZoneApi};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Runs check cycles against one zone
///
/// Cheap to share: the scheduler keeps one checker behind an `Arc` and runs
/// any number of cycles on it concurrently.
pub struct Checker {
    api: Arc<dyn ZoneApi>,
    account_id: AccountId,
    domain: String,
    poll: Duration,
    namer: ProbeNamer,
}

impl Checker {
    /// Create a checker
    ///
    /// # Parameters
    ///
    /// - `api`: Zone API handle, shared read-only
    /// - `account_id`: Account resolved at startup
    /// - `domain`: Zone the probe records are created in
    /// - `poll`: Time between distribution queries
    pub fn new(
        api: Arc<dyn ZoneApi>,
        account_id: impl Into<AccountId>,
        domain: impl Into<String>,
        poll: Duration,
    ) -> Self {
        Self {
            api,
            account_id: account_id.into(),
            domain: domain.into(),
            poll,
            namer: ProbeNamer::new(),
        }
    }

    /// Zone the probe records are created in
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Run one cycle
    ///
    /// Never fails: every error ends up in the returned result.
    pub async fn check(&self, scope: &CycleScope, cleanup: &CleanupScope) -> CheckResult {
        let overall = Stopwatch::start();
        let probe = self.namer.probe(overall.started_at());

        debug!(
            probe = %probe.name,
            domain = %self.domain,
            timeout = ?scope.timeout(),
            "Creating probe record"
        );

        let create = Stopwatch::start();
        let created = scope
            .run(
                self.api
                    .create_record(&self.account_id, &self.domain, &probe.attributes()),
            )
            .await;
        let mut cycle = CycleState::new(overall, probe.name, create.stop());

        let record_id = match created {
            Ok(Ok(id)) => id,
            Ok(Err(e)) => {
                cycle.conclude(Some(CheckError::api(Phase::Create, &e)));
                return cycle.into_result();
            }
            Err(interrupt) => {
                cycle.conclude(Some(interrupt.into()));
                return cycle.into_result();
            }
        };
        cycle.created = true;
        debug!(probe = %cycle.probe_name, record_id = %record_id, "Probe record created");

        let error = self.poll_distribution(&record_id, scope, &mut cycle).await;
        cycle.conclude(error);

        let (deleted, timing) = self.delete_probe(&record_id, cleanup).await;
        cycle.deleted = deleted;
        cycle.delete = Some(timing);

        cycle.into_result()
    }

    /// Poll until the record is distributed or the cycle scope fires
    ///
    /// Returns the cycle's terminal error, `None` on success.
    async fn poll_distribution(
        &self,
        record_id: &str,
        scope: &CycleScope,
        cycle: &mut CycleState,
    ) -> Option<CheckError> {
        loop {
            if let Err(interrupt) = scope.sleep(self.poll).await {
                return Some(interrupt.into());
            }

            let sw = Stopwatch::start();
            let response = scope
                .run(
                    self.api
                        .check_distribution(&self.account_id, &self.domain, record_id),
                )
                .await;
            cycle.checks.push(sw.stop());

            match response {
                Ok(Ok(true)) => {
                    debug!(
                        probe = %cycle.probe_name,
                        checks = cycle.checks.len(),
                        "Probe record distributed"
                    );
                    return None;
                }
                Ok(Ok(false)) => {
                    trace!(probe = %cycle.probe_name, checks = cycle.checks.len(), "Not distributed yet");
                }
                Ok(Err(e)) => return Some(CheckError::api(Phase::Check, &e)),
                Err(interrupt) => return Some(interrupt.into()),
            }
        }
    }

    /// Delete the probe record under the cleanup scope
    async fn delete_probe(&self, record_id: &str, cleanup: &CleanupScope) -> (bool, Timing) {
        let sw = Stopwatch::start();
        let result = cleanup
            .run(
                self.api
                    .delete_record(&self.account_id, &self.domain, record_id),
            )
            .await;
        let timing = sw.stop();

        let deleted = match result {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(record_id = %record_id, error = %e, "Failed to delete probe record");
                false
            }
            Err(interrupt) => {
                warn!(
                    record_id = %record_id,
                    reason = ?interrupt,
                    cleanup_timeout = ?cleanup.timeout(),
                    "Probe record deletion interrupted"
                );
                false
            }
        };

        (deleted, timing)
    }
}

/// Mutable state of a cycle in progress
///
/// Owned by exactly one cycle; becomes a [`CheckResult`] at the end.
struct CycleState {
    overall: Stopwatch,
    duration: Option<Duration>,
    probe_name: String,
    created: bool,
    deleted: bool,
    error: Option<CheckError>,
    create: Timing,
    checks: Timings,
    delete: Option<Timing>,
}

impl CycleState {
    fn new(overall: Stopwatch, probe_name: String, create: Timing) -> Self {
        Self {
            overall,
            duration: None,
            probe_name,
            created: false,
            deleted: false,
            error: None,
            create,
            checks: Timings::new(),
            delete: None,
        }
    }

    /// Record the terminal outcome and freeze the cycle duration
    ///
    /// Only the first call has an effect.
    fn conclude(&mut self, error: Option<CheckError>) {
        if self.duration.is_some() {
            return;
        }
        self.duration = Some(self.overall.elapsed());
        self.error = error;
    }

    fn into_result(self) -> CheckResult {
        let duration = self.duration.unwrap_or_else(|| self.overall.elapsed());

        CheckResult {
            started_at: self.overall.started_at(),
            duration,
            check_count: self.checks.len(),
            probe_name: self.probe_name,
            created: self.created,
            deleted: self.deleted,
            error: self.error,
            timings: PhaseTimings {
                create: self.create,
                check: self.checks,
                delete: self.delete,
            },
        }
    }
}
