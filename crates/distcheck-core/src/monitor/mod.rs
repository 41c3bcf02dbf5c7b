//! Monitor scheduler
//!
//! The Monitor is responsible for:
//! - Starting one check cycle per tick
//! - Running cycles concurrently, so a slow cycle never delays the next tick
//! - Giving each cycle its own deadline and a child of the shutdown token
//! - Publishing every result to a single consumer
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐
//! │   Ticker    │─── tick ───┐
//! └─────────────┘            │
//!                            ▼
//!                    ┌──────────────┐        spawn per tick
//!                    │   Monitor    │──────────────────────────┐
//!                    └──────────────┘                          │
//!                            ▲                                 ▼
//!              shutdown token│                    ┌────────────────────────┐
//!                            │                    │ Checker::check (cycle) │
//!                                                 └────────────────────────┘
//!                                                              │
//!                                                              ▼
//!                                                 ┌────────────────────────┐
//!                                                 │ results (unbounded mpsc)│
//!                                                 └────────────────────────┘
//! ```
//!
//! ## Shutdown
//!
//! When the shutdown token fires the monitor stops consuming ticks and
//! returns. Cycles already in flight observe the same cancellation through
//! their child tokens, then still delete their probe record under the
//! lifetime-bound cleanup scope. [`Monitor::drain`] waits for them.

use crate::check::{Checker, CheckResult, CleanupScope, CycleScope};
use crate::config::MonitorConfig;
use crate::error::Result;
use crate::traits::{IntervalTicker, Ticker, ZoneApi};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc};
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Periodic distribution monitor
///
/// ## Lifecycle
///
/// 1. Create with [`Monitor::new()`], which also hands out the result receiver
/// 2. Run with [`Monitor::run()`] until the shutdown token fires
/// 3. Wait for in-flight cycles with [`Monitor::drain()`]
/// 4. Drop the monitor; the result channel closes once every cycle has published
///
/// A monitor runs once. Its ticker stream is not restartable.
pub struct Monitor {
    /// Shared check engine
    checker: Arc<Checker>,

    /// Time between cycle starts
    interval: Duration,

    /// Align the first tick to the wall clock
    align_ticks: bool,

    /// Per-cycle deadline
    timeout: Duration,

    /// Deadline for probe deletion
    cleanup_timeout: Duration,

    /// Overlap bound; `None` when unbounded
    slots: Option<Arc<Semaphore>>,

    /// Process lifetime; cancelled only when cleanups are abandoned
    lifetime: CancellationToken,

    /// In-flight cycles
    tracker: TaskTracker,

    /// Result sender, cloned into every cycle
    result_tx: mpsc::UnboundedSender<CheckResult>,
}

impl Monitor {
    /// Create a new monitor
    ///
    /// # Parameters
    ///
    /// - `api`: Zone API handle, shared by every cycle
    /// - `account_id`: Account resolved at startup
    /// - `config`: Monitor configuration (validated here)
    ///
    /// # Returns
    ///
    /// A tuple of (monitor, result_receiver). The receiver yields one
    /// [`CheckResult`] per finished cycle, in completion order.
    pub fn new(
        api: Arc<dyn ZoneApi>,
        account_id: impl Into<String>,
        config: &MonitorConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<CheckResult>)> {
        config.validate()?;

        let (tx, rx) = mpsc::unbounded_channel();

        let slots = match config.max_in_flight {
            0 => None,
            n => Some(Arc::new(Semaphore::new(n))),
        };

        let monitor = Self {
            checker: Arc::new(Checker::new(api, account_id, &config.domain, config.poll)),
            interval: config.interval,
            align_ticks: config.align_ticks,
            timeout: config.timeout,
            cleanup_timeout: config.cleanup_timeout,
            slots,
            lifetime: CancellationToken::new(),
            tracker: TaskTracker::new(),
            result_tx: tx,
        };

        Ok((monitor, rx))
    }

    /// Run the monitor on its configured interval
    ///
    /// Returns once `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let ticker = if self.align_ticks {
            IntervalTicker::aligned(self.interval)
        } else {
            IntervalTicker::new(self.interval)
        };

        self.run_with_ticker(&ticker, shutdown).await
    }

    /// Run the monitor on an arbitrary tick source
    ///
    /// Returns once `shutdown` is cancelled or the ticker ends. No cycle is
    /// started after the shutdown token has been observed as cancelled.
    pub async fn run_with_ticker(
        &self,
        ticker: &dyn Ticker,
        shutdown: CancellationToken,
    ) -> Result<()> {
        info!(
            domain = %self.checker.domain(),
            interval = ?self.interval,
            timeout = ?self.timeout,
            max_in_flight = ?self.slots.as_ref().map(|s| s.available_permits()),
            "Monitor started"
        );

        let mut ticks = ticker.ticks();

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!(in_flight = self.tracker.len(), "Shutdown signal received, monitor stopping");
                    break;
                }

                tick = ticks.next() => match tick {
                    Some(_) => self.launch_cycle(&shutdown),
                    None => {
                        warn!("Ticker ended, monitor stopping");
                        break;
                    }
                },
            }
        }

        Ok(())
    }

    /// Start one cycle in the background
    fn launch_cycle(&self, shutdown: &CancellationToken) {
        let permit = match &self.slots {
            None => None,
            Some(slots) => match Arc::clone(slots).try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    warn!(
                        in_flight = self.tracker.len(),
                        "Maximum overlapping cycles reached, skipping tick"
                    );
                    return;
                }
            },
        };

        let scope = CycleScope::new(shutdown.child_token(), self.timeout);
        let cleanup = CleanupScope::new(self.lifetime.clone(), self.cleanup_timeout);
        let checker = Arc::clone(&self.checker);
        let tx = self.result_tx.clone();

        debug!(in_flight = self.tracker.len() + 1, "Starting check cycle");

        self.tracker.spawn(async move {
            let result = checker.check(&scope, &cleanup).await;
            drop(permit);

            if tx.send(result).is_err() {
                debug!("Result receiver dropped, discarding result");
            }
        });
    }

    /// Number of cycles currently running
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Wait for in-flight cycles to finish
    ///
    /// Call after [`Monitor::run`] has returned. If cycles are still running
    /// once `grace` has passed, pending probe deletions are abandoned (the
    /// lifetime token is cancelled) and the cycles finish with
    /// `deleted = false`.
    ///
    /// # Returns
    ///
    /// `true` if every cycle finished within the grace period.
    pub async fn drain(&self, grace: Duration) -> bool {
        self.tracker.close();

        if tokio::time::timeout(grace, self.tracker.wait()).await.is_ok() {
            info!("All check cycles finished");
            return true;
        }

        warn!(
            in_flight = self.tracker.len(),
            grace = ?grace,
            "Grace period elapsed, abandoning probe cleanup"
        );
        self.lifetime.cancel();
        self.tracker.wait().await;
        false
    }
}
