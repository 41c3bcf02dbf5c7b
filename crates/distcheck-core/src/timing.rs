//! Timing recorder
//!
//! A [`Stopwatch`] captures the instant an operation started. Stopping it
//! consumes the stopwatch and freezes the elapsed time into a [`Timing`],
//! so every recorder is stopped at most once.
//!
//! Durations are measured on the tokio clock, which lets tests running on a
//! paused runtime observe virtual time.
//!
//! ```rust
//! use distcheck_core::timing::{Stopwatch, Timings};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mut checks = Timings::new();
//! for _ in 0..3 {
//!     let sw = Stopwatch::start();
//!     // ... one API call ...
//!     checks.push(sw.stop());
//! }
//! println!("median check latency: {:?}", checks.median());
//! # }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// A running timing recorder
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    started_at: DateTime<Utc>,
    instant: Instant,
}

impl Stopwatch {
    /// Capture the current instant
    pub fn start() -> Self {
        Self {
            started_at: Utc::now(),
            instant: Instant::now(),
        }
    }

    /// Wall-clock instant the recorder was started
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Time elapsed so far, without stopping
    pub fn elapsed(&self) -> Duration {
        self.instant.elapsed()
    }

    /// Stop the recorder and freeze the elapsed duration
    pub fn stop(self) -> Timing {
        Timing {
            started_at: self.started_at,
            duration: self.instant.elapsed(),
        }
    }
}

/// A completed timing record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timing {
    /// When recording began
    pub started_at: DateTime<Utc>,

    /// Elapsed time between start and stop
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
}

impl Timing {
    /// Build a timing record from known values
    pub fn new(started_at: DateTime<Utc>, duration: Duration) -> Self {
        Self {
            started_at,
            duration,
        }
    }
}

/// An ordered sequence of timing records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timings(Vec<Timing>);

impl Timings {
    /// Create an empty sequence
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append a timing record
    pub fn push(&mut self, timing: Timing) {
        self.0.push(timing);
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the sequence is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the records in insertion order
    pub fn iter(&self) -> std::slice::Iter<'_, Timing> {
        self.0.iter()
    }

    /// Median duration
    ///
    /// Even-length sequences average the two middle values. An empty
    /// sequence yields [`Duration::ZERO`].
    pub fn median(&self) -> Duration {
        let mut sorted: Vec<Duration> = self.0.iter().map(|t| t.duration).collect();
        median_of(&mut sorted)
    }

    /// Mean duration; [`Duration::ZERO`] for an empty sequence
    pub fn mean(&self) -> Duration {
        let durations: Vec<Duration> = self.0.iter().map(|t| t.duration).collect();
        mean_of(&durations)
    }
}

impl From<Vec<Timing>> for Timings {
    fn from(timings: Vec<Timing>) -> Self {
        Self(timings)
    }
}

impl FromIterator<Timing> for Timings {
    fn from_iter<I: IntoIterator<Item = Timing>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Timings {
    type Item = &'a Timing;
    type IntoIter = std::slice::Iter<'a, Timing>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Median of a set of durations; sorts the slice in place
pub(crate) fn median_of(durations: &mut [Duration]) -> Duration {
    if durations.is_empty() {
        return Duration::ZERO;
    }

    durations.sort_unstable();

    let mid = durations.len() / 2;
    if durations.len() % 2 == 0 {
        (durations[mid - 1] + durations[mid]) / 2
    } else {
        durations[mid]
    }
}

/// Mean of a set of durations
pub(crate) fn mean_of(durations: &[Duration]) -> Duration {
    if durations.is_empty() {
        return Duration::ZERO;
    }

    let total: Duration = durations.iter().sum();
    total / durations.len() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timings(secs: &[u64]) -> Timings {
        let now = Utc::now();
        secs.iter()
            .map(|s| Timing::new(now, Duration::from_secs(*s)))
            .collect()
    }

    #[test]
    fn test_median_fixed_values() {
        assert_eq!(timings(&[]).median(), Duration::ZERO);
        assert_eq!(timings(&[7]).median(), Duration::from_secs(7));
        assert_eq!(timings(&[1, 3]).median(), Duration::from_secs(2));
        assert_eq!(timings(&[1, 2, 3]).median(), Duration::from_secs(2));
    }

    #[test]
    fn test_median_even_length_averages_middle() {
        let t: Timings = vec![
            Timing::new(Utc::now(), Duration::from_millis(100)),
            Timing::new(Utc::now(), Duration::from_millis(400)),
            Timing::new(Utc::now(), Duration::from_millis(200)),
            Timing::new(Utc::now(), Duration::from_millis(300)),
        ]
        .into();

        assert_eq!(t.median(), Duration::from_millis(250));
    }

    #[test]
    fn test_mean() {
        assert_eq!(timings(&[]).mean(), Duration::ZERO);
        assert_eq!(timings(&[1, 2, 3, 6]).mean(), Duration::from_secs(3));
        assert_eq!(timings(&[5]).mean(), Duration::from_secs(5));
    }

    #[test]
    fn test_aggregation_is_order_independent() {
        let orders: [&[u64]; 4] = [
            &[1, 9, 4, 4, 12],
            &[12, 4, 4, 9, 1],
            &[4, 1, 12, 9, 4],
            &[9, 12, 1, 4, 4],
        ];

        let medians: Vec<Duration> = orders.iter().map(|o| timings(o).median()).collect();
        let means: Vec<Duration> = orders.iter().map(|o| timings(o).mean()).collect();

        assert!(medians.iter().all(|m| *m == Duration::from_secs(4)));
        assert!(means.iter().all(|m| *m == means[0]));
    }

    #[test]
    fn test_median_does_not_reorder_sequence() {
        let t = timings(&[3, 1, 2]);
        let _ = t.median();

        let order: Vec<u64> = t.iter().map(|t| t.duration.as_secs()).collect();
        assert_eq!(order, vec![3, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopwatch_measures_elapsed_time() {
        let sw = Stopwatch::start();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        let timing = sw.stop();

        assert!(timing.duration >= Duration::from_millis(1500));
        assert!(timing.duration < Duration::from_millis(1510));
        assert_eq!(timing.started_at, sw.started_at());
    }
}
