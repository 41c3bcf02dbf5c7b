//! Test doubles and common utilities for contract tests
//!
//! This module provides a scripted zone API that counts calls and a ticker
//! the test drives by hand.

#![allow(dead_code)]

use distcheck_core::config::{ApiConfig, MonitorConfig};
use distcheck_core::error::{Error, Result};
use distcheck_core::traits::{RecordAttributes, Ticker, ZoneApi};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_stream::Stream;

/// A zone API whose behaviour is fixed up front
///
/// Each created record gets its own check counter, so overlapping cycles
/// see independent distribution progress.
#[derive(Default)]
pub struct ScriptedApi {
    /// Fail every create call
    pub fail_create: bool,
    /// Report distributed on this check of a record (1-based); never when `None`
    pub distributed_on: Option<usize>,
    /// Fail this check of a record (1-based)
    pub fail_check_on: Option<usize>,
    /// Fail every delete call
    pub fail_delete: bool,
    /// Latency of create calls
    pub create_delay: Duration,
    /// Latency of check calls
    pub check_delay: Duration,
    /// Latency of delete calls
    pub delete_delay: Duration,

    create_calls: AtomicUsize,
    check_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    checks_per_record: Mutex<HashMap<String, usize>>,
    created_names: Mutex<Vec<String>>,
    created_at: Mutex<Vec<Instant>>,
    deleted_ids: Mutex<Vec<String>>,
}

impl ScriptedApi {
    /// Distributed on the `n`-th check of every record
    pub fn distributed_on(n: usize) -> Self {
        Self {
            distributed_on: Some(n),
            ..Default::default()
        }
    }

    /// Never reports a record as distributed
    pub fn never_distributed() -> Self {
        Self::default()
    }

    /// Every create call fails
    pub fn failing_create() -> Self {
        Self {
            fail_create: true,
            ..Default::default()
        }
    }

    pub fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = delay;
        self
    }

    pub fn with_check_delay(mut self, delay: Duration) -> Self {
        self.check_delay = delay;
        self
    }

    pub fn with_delete_delay(mut self, delay: Duration) -> Self {
        self.delete_delay = delay;
        self
    }

    pub fn with_failing_check_on(mut self, n: usize) -> Self {
        self.fail_check_on = Some(n);
        self
    }

    pub fn with_failing_delete(mut self) -> Self {
        self.fail_delete = true;
        self
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn check_calls(&self) -> usize {
        self.check_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn created_names(&self) -> Vec<String> {
        self.created_names.lock().unwrap().clone()
    }

    pub fn created_at(&self) -> Vec<Instant> {
        self.created_at.lock().unwrap().clone()
    }

    pub fn deleted_ids(&self) -> Vec<String> {
        self.deleted_ids.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ZoneApi for ScriptedApi {
    async fn whoami(&self) -> Result<String> {
        Ok("1010".to_string())
    }

    async fn create_record(
        &self,
        _account_id: &str,
        _domain: &str,
        attributes: &RecordAttributes,
    ) -> Result<String> {
        let n = self.create_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.created_at.lock().unwrap().push(Instant::now());
        tokio::time::sleep(self.create_delay).await;

        if self.fail_create {
            return Err(Error::provider("scripted", "Zone is locked"));
        }

        self.created_names
            .lock()
            .unwrap()
            .push(attributes.name.clone());
        Ok(format!("record-{n}"))
    }

    async fn check_distribution(
        &self,
        _account_id: &str,
        _domain: &str,
        record_id: &str,
    ) -> Result<bool> {
        self.check_calls.fetch_add(1, Ordering::SeqCst);
        let n = {
            let mut per_record = self.checks_per_record.lock().unwrap();
            let count = per_record.entry(record_id.to_string()).or_insert(0);
            *count += 1;
            *count
        };
        tokio::time::sleep(self.check_delay).await;

        if self.fail_check_on == Some(n) {
            return Err(Error::provider_transient("scripted", "502 Bad Gateway"));
        }

        Ok(self.distributed_on.is_some_and(|on| n >= on))
    }

    async fn delete_record(&self, _account_id: &str, _domain: &str, record_id: &str) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delete_delay).await;

        if self.fail_delete {
            return Err(Error::provider("scripted", "Record is locked"));
        }

        self.deleted_ids.lock().unwrap().push(record_id.to_string());
        Ok(())
    }

    fn api_name(&self) -> &'static str {
        "scripted"
    }
}

/// A ticker the test triggers by hand
pub struct ControlledTicker {
    rx: Mutex<Option<mpsc::UnboundedReceiver<Instant>>>,
}

impl ControlledTicker {
    /// Create a ticker and the sender that triggers it
    pub fn new() -> (Self, mpsc::UnboundedSender<Instant>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                rx: Mutex::new(Some(rx)),
            },
            tx,
        )
    }
}

impl Ticker for ControlledTicker {
    fn ticks(&self) -> Pin<Box<dyn Stream<Item = Instant> + Send + 'static>> {
        let rx = self
            .rx
            .lock()
            .unwrap()
            .take()
            .expect("ticks() can only be called once");

        Box::pin(tokio_stream::wrappers::UnboundedReceiverStream::new(rx))
    }
}

/// Helper to create a minimal MonitorConfig for testing
pub fn minimal_config() -> MonitorConfig {
    MonitorConfig::new(
        "example.com",
        ApiConfig::Custom {
            factory: "scripted".to_string(),
            config: serde_json::json!({}),
        },
    )
    .with_interval(Duration::from_secs(1))
    .with_poll(Duration::from_millis(100))
    .with_timeout(Duration::from_secs(2))
}

/// Let spawned tasks run without advancing the paused clock
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
