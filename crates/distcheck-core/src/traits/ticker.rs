// # Ticker Trait
//
// Defines the clock that drives the monitor scheduler. Each item yielded by
// the stream starts one check cycle.
//
// ## Implementations
//
// - [`IntervalTicker`]: fixed period, optionally aligned to wall-clock
//   multiples of the period
// - Tests inject a channel-backed ticker to trigger cycles on demand
//
// ## Usage
//
// ```rust,ignore
// use distcheck_core::traits::{IntervalTicker, Ticker};
// use tokio_stream::StreamExt;
//
// let ticker = IntervalTicker::aligned(std::time::Duration::from_secs(60));
// let mut ticks = ticker.ticks();
// while let Some(at) = ticks.next().await {
//     println!("tick at {:?}", at);
// }
// ```

use std::pin::Pin;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::Stream;
use tokio_stream::wrappers::IntervalStream;

/// Trait for scheduler tick sources
pub trait Ticker: Send + Sync {
    /// Stream of tick instants
    ///
    /// The stream is consumed by a single scheduler and never restarted.
    /// Ending the stream stops the scheduler.
    fn ticks(&self) -> Pin<Box<dyn Stream<Item = Instant> + Send + 'static>>;
}

/// Fixed-period ticker backed by [`tokio::time::interval_at`]
///
/// Ticks missed because the runtime was busy are skipped rather than
/// bursted, keeping later ticks on the period grid.
#[derive(Debug, Clone, Copy)]
pub struct IntervalTicker {
    period: Duration,
    aligned: bool,
}

impl IntervalTicker {
    /// First tick one period from now
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            aligned: false,
        }
    }

    /// First tick at the next wall-clock multiple of the period
    ///
    /// With a one minute period the monitor starts cycles at the top of
    /// every minute.
    pub fn aligned(period: Duration) -> Self {
        Self {
            period,
            aligned: true,
        }
    }

    /// Tick period
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Delay until the first tick
    pub fn first_delay(&self) -> Duration {
        if self.aligned {
            let since_epoch = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default();
            delay_to_next_multiple(since_epoch, self.period)
        } else {
            self.period
        }
    }
}

impl Ticker for IntervalTicker {
    fn ticks(&self) -> Pin<Box<dyn Stream<Item = Instant> + Send + 'static>> {
        let delay = self.first_delay();
        tracing::debug!(?delay, period = ?self.period, "Waiting for first tick");

        let mut interval = tokio::time::interval_at(Instant::now() + delay, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        Box::pin(IntervalStream::new(interval))
    }
}

/// Time remaining until `now` reaches the next multiple of `period`
///
/// Returns a full period when `now` sits exactly on a multiple.
fn delay_to_next_multiple(now: Duration, period: Duration) -> Duration {
    let period_nanos = period.as_nanos();
    if period_nanos == 0 {
        return Duration::ZERO;
    }

    let into_period = now.as_nanos() % period_nanos;
    let remaining = period_nanos - into_period;
    Duration::from_nanos(remaining as u64)
}
