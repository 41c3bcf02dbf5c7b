//! Result reporter
//!
//! Consumes the monitor's result channel and logs every cycle with its full
//! timing breakdown. Also keeps a rolling window of recent successful cycle
//! durations, held in memory only, for periodic summaries.

use crate::check::CheckResult;
use crate::config::{ReportConfig, ReportFormat};
use crate::timing::{mean_of, median_of};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Rolling statistics over reported cycles
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    window: VecDeque<Duration>,
    capacity: usize,
    /// Cycles reported
    pub total: u64,
    /// Cycles that confirmed distribution
    pub successes: u64,
    /// Cycles that timed out
    pub timeouts: u64,
    /// Cycles cancelled by shutdown
    pub cancelled: u64,
    /// Cycles that failed with an API error
    pub failures: u64,
    /// Cycles that left their probe record behind
    pub leaked_probes: u64,
}

impl Summary {
    /// Create an empty summary keeping the last `capacity` durations
    pub fn new(capacity: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
            ..Default::default()
        }
    }

    /// Account for one result
    pub fn record(&mut self, result: &CheckResult) {
        use crate::check::CycleOutcome;

        self.total += 1;
        match result.outcome() {
            CycleOutcome::Distributed => {
                self.successes += 1;
                if self.capacity > 0 {
                    if self.window.len() == self.capacity {
                        self.window.pop_front();
                    }
                    self.window.push_back(result.duration());
                }
            }
            CycleOutcome::TimedOut => self.timeouts += 1,
            CycleOutcome::Cancelled => self.cancelled += 1,
            CycleOutcome::Failed => self.failures += 1,
        }

        if result.leaked_probe() {
            self.leaked_probes += 1;
        }
    }

    /// Median duration of the successful cycles in the window
    pub fn median(&self) -> Duration {
        let mut durations: Vec<Duration> = self.window.iter().copied().collect();
        median_of(&mut durations)
    }

    /// Mean duration of the successful cycles in the window
    pub fn mean(&self) -> Duration {
        let durations: Vec<Duration> = self.window.iter().copied().collect();
        mean_of(&durations)
    }

    /// Number of durations currently in the window
    pub fn window_len(&self) -> usize {
        self.window.len()
    }
}

/// Logs check results
pub struct Reporter {
    config: ReportConfig,
    summary: Summary,
}

impl Reporter {
    /// Create a reporter
    pub fn new(config: ReportConfig) -> Self {
        let summary = Summary::new(config.summary_window);
        Self { config, summary }
    }

    /// Statistics gathered so far
    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    /// Report results until the channel closes
    ///
    /// Returns the final summary.
    pub async fn run(mut self, mut results: mpsc::UnboundedReceiver<CheckResult>) -> Summary {
        while let Some(result) = results.recv().await {
            self.report(&result);
        }

        if self.summary.total > 0 {
            self.log_summary();
        }
        self.summary
    }

    /// Log one result and update the summary
    pub fn report(&mut self, result: &CheckResult) {
        match self.config.format {
            ReportFormat::Text => log_text(result),
            ReportFormat::Json => log_json(result),
        }

        self.summary.record(result);

        let every = self.config.summary_every as u64;
        if every > 0 && self.summary.total % every == 0 {
            self.log_summary();
        }
    }

    fn log_summary(&self) {
        let s = &self.summary;
        info!(
            total = s.total,
            successes = s.successes,
            timeouts = s.timeouts,
            cancelled = s.cancelled,
            failures = s.failures,
            leaked_probes = s.leaked_probes,
            window = s.window_len(),
            median = %human(s.median()),
            mean = %human(s.mean()),
            "Distribution summary"
        );
    }
}

fn log_text(result: &CheckResult) {
    let timings = result.timings();
    let at = result.started_at().format("%Y-%m-%dT%H:%M:%SZ");
    let duration = human(result.duration());
    let create = human(timings.create.duration);
    let check_median = human(timings.check.median());
    let check_mean = human(timings.check.mean());
    let delete = timings
        .delete
        .map(|t| human(t.duration).to_string())
        .unwrap_or_else(|| "-".to_string());

    match result.error() {
        None => info!(
            %at,
            %duration,
            checks = result.check_count(),
            probe = %result.probe_name(),
            created = result.created(),
            deleted = result.deleted(),
            %create,
            %check_median,
            %check_mean,
            %delete,
            "Distribution confirmed"
        ),
        Some(error) => warn!(
            %at,
            %duration,
            checks = result.check_count(),
            probe = %result.probe_name(),
            created = result.created(),
            deleted = result.deleted(),
            %create,
            %check_median,
            %check_mean,
            %delete,
            outcome = %result.outcome(),
            temporary = error.is_temporary(),
            %error,
            "Distribution check failed"
        ),
    }
}

fn human(duration: Duration) -> humantime::FormattedDuration {
    humantime::format_duration(truncate_millis(duration))
}

fn log_json(result: &CheckResult) {
    match serde_json::to_string(result) {
        Ok(json) if result.is_success() => info!(result = %json, "Distribution confirmed"),
        Ok(json) => warn!(result = %json, "Distribution check failed"),
        Err(e) => warn!(error = %e, probe = %result.probe_name(), "Failed to serialize result"),
    }
}

fn truncate_millis(d: Duration) -> Duration {
    Duration::from_millis(d.as_millis() as u64)
}
