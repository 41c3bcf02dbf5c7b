//! Core traits for the distribution monitor
//!
//! This module defines the seams between the monitor and the outside world.
//!
//! - [`ZoneApi`]: Create, inspect and delete records through a managing API
//! - [`Ticker`]: Source of scheduler ticks (injectable for tests)

pub mod zone_api;
pub mod ticker;

pub use zone_api::{ZoneApi, ZoneApiFactory, RecordAttributes, AccountId, RecordId};
pub use ticker::{Ticker, IntervalTicker};
