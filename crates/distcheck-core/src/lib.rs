// # distcheck-core
//
// Core library of the DNS distribution monitor.
//
// The monitor measures how long a provider takes to distribute a record
// change to all of its authoritative name servers. Once per interval it
// creates a uniquely named TXT probe record through the provider's API,
// polls the provider's distribution status until the record is reported
// as distributed (or a deadline passes), deletes the probe again and
// publishes a timed result.
//
// ## Architecture Overview
//
// - **ZoneApi**: Trait for the provider API (create / check distribution / delete)
// - **Ticker**: Trait for the scheduler's clock, injectable for tests
// - **Checker**: Runs one probe cycle under a deadline, with guaranteed cleanup
// - **Monitor**: Starts a cycle per tick, concurrently, and publishes results
// - **Reporter**: Logs results and keeps rolling statistics
// - **ApiRegistry**: Plugin-based registry for zone API implementations
//
// ## Design Principles
//
// 1. **Errors are results**: a failing cycle is reported, never fatal
// 2. **Cleanup survives cancellation**: probe deletion has its own scope
// 3. **No shared mutable state between cycles**
// 4. **Library-First**: the daemon is a thin layer over this crate

pub mod traits;
pub mod timing;
pub mod check;
pub mod monitor;
pub mod report;
pub mod registry;
pub mod config;
pub mod error;

// Re-export core types for convenience
pub use traits::{ZoneApi, Ticker, IntervalTicker};
pub use check::{Checker, CheckResult, CheckError, CycleOutcome};
pub use monitor::Monitor;
pub use report::{Reporter, Summary};
pub use registry::ApiRegistry;
pub use config::{MonitorConfig, ApiConfig, ReportConfig, ReportFormat};
pub use error::{Error, Result};
pub use timing::{Stopwatch, Timing, Timings};
