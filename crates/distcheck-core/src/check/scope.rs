//! Cancellation scopes of a check cycle
//!
//! Every cycle runs under two independent scopes:
//!
//! - [`CycleScope`]: bounds creation and polling. Fires when the cycle's own
//!   deadline passes or when shutdown is requested.
//! - [`CleanupScope`]: bounds deletion of the probe record. Derived from the
//!   process lifetime only, so it survives both the cycle deadline and a
//!   shutdown request. Its own timeout keeps a hung delete from living forever.
//!
//! Operations run inside a scope are cancelled by dropping their future.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a scoped operation did not complete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// The scope's deadline passed; carries the configured timeout
    Timeout(Duration),
    /// The scope's token was cancelled
    Cancelled,
}

/// Deadline and cancellation for the create and poll phases of one cycle
#[derive(Debug, Clone)]
pub struct CycleScope {
    cancel: CancellationToken,
    deadline: Instant,
    timeout: Duration,
}

impl CycleScope {
    /// Start a scope that expires `timeout` from now
    ///
    /// `cancel` is normally a child of the monitor's shutdown token.
    pub fn new(cancel: CancellationToken, timeout: Duration) -> Self {
        Self {
            cancel,
            deadline: Instant::now() + timeout,
            timeout,
        }
    }

    /// Configured timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run `fut` until it completes or the scope fires
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Interrupt> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Interrupt::Cancelled),
            _ = tokio::time::sleep_until(self.deadline) => Err(Interrupt::Timeout(self.timeout)),
            output = fut => Ok(output),
        }
    }

    /// Wait for `period` unless the scope fires first
    pub async fn sleep(&self, period: Duration) -> Result<(), Interrupt> {
        self.run(tokio::time::sleep(period)).await
    }
}

/// Deadline and cancellation for deleting a probe record
#[derive(Debug, Clone)]
pub struct CleanupScope {
    lifetime: CancellationToken,
    timeout: Duration,
}

impl CleanupScope {
    /// Create a cleanup scope bound to the process lifetime
    ///
    /// `lifetime` must not be cancelled by a shutdown request; it is
    /// cancelled only once the process gives up on in-flight cleanups.
    pub fn new(lifetime: CancellationToken, timeout: Duration) -> Self {
        Self { lifetime, timeout }
    }

    /// Configured timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `fut` until it completes, the timeout passes or the lifetime ends
    ///
    /// The timeout starts counting when this method is called, not when the
    /// scope was created.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Interrupt> {
        tokio::select! {
            biased;
            _ = self.lifetime.cancelled() => Err(Interrupt::Cancelled),
            _ = tokio::time::sleep(self.timeout) => Err(Interrupt::Timeout(self.timeout)),
            output = fut => Ok(output),
        }
    }
}
