//! Contract Test: Check Cycle Lifecycle
//!
//! These tests verify one probe cycle end to end against a scripted API,
//! on a paused clock.
//!
//! Constraints verified:
//! - A failed create ends the cycle with no cleanup
//! - Every created probe is deleted exactly once, whatever ended the cycle
//! - Deletion survives the cycle deadline and shutdown
//! - `duration` stops when the outcome is known, not after cleanup
//! - `check_count` always matches the recorded check timings
//! - Cleanup failure never overrides the cycle outcome

mod common;

use common::*;
use distcheck_core::check::{CheckError, Checker, CleanupScope, CycleOutcome, CycleScope, Phase};
use distcheck_core::CheckResult;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const POLL: Duration = Duration::from_millis(100);

async fn run_cycle(api: Arc<ScriptedApi>, timeout: Duration) -> CheckResult {
    let checker = Checker::new(api, "1010", "example.com", POLL);
    let scope = CycleScope::new(CancellationToken::new(), timeout);
    let cleanup = CleanupScope::new(CancellationToken::new(), Duration::from_secs(60));

    checker.check(&scope, &cleanup).await
}

fn assert_invariants(result: &CheckResult) {
    assert_eq!(result.check_count(), result.timings().check.len());
    if !result.created() {
        assert!(!result.deleted(), "a probe that was never created cannot be deleted");
        assert!(result.timings().delete.is_none());
    }
}

#[tokio::test(start_paused = true)]
async fn distributed_after_three_pending_polls() {
    // interval=1s, poll=100ms, timeout=2s, false x3 then true
    let api = Arc::new(ScriptedApi::distributed_on(4));

    let result = run_cycle(Arc::clone(&api), Duration::from_secs(2)).await;

    assert_invariants(&result);
    assert!(result.is_success(), "unexpected error: {:?}", result.error());
    assert_eq!(result.outcome(), CycleOutcome::Distributed);
    assert_eq!(result.check_count(), 4);
    assert!(result.created());
    assert!(result.deleted());
    assert!(result.duration() >= Duration::from_millis(400));
    assert!(result.duration() < Duration::from_millis(450));

    assert_eq!(api.create_calls(), 1);
    assert_eq!(api.check_calls(), 4);
    assert_eq!(api.delete_calls(), 1);
    assert_eq!(api.deleted_ids(), vec!["record-1".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn duration_excludes_cleanup() {
    let api = Arc::new(ScriptedApi::distributed_on(1).with_delete_delay(Duration::from_secs(5)));

    let result = run_cycle(Arc::clone(&api), Duration::from_secs(2)).await;

    assert!(result.is_success());
    assert!(result.deleted());
    assert!(result.duration() < Duration::from_secs(1));

    let delete = result.timings().delete.expect("delete was timed");
    assert!(delete.duration >= Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn probe_record_is_named_after_start_instant() {
    let api = Arc::new(ScriptedApi::distributed_on(1));

    let result = run_cycle(Arc::clone(&api), Duration::from_secs(2)).await;

    let expected = format!(
        "_distribution_check_{}",
        result.started_at().format("%Y%m%d%H%M%S")
    );
    assert_eq!(result.probe_name(), expected);
    assert_eq!(api.created_names(), vec![expected]);
}

#[tokio::test(start_paused = true)]
async fn create_failure_skips_cleanup() {
    let api = Arc::new(ScriptedApi::failing_create());

    let result = run_cycle(Arc::clone(&api), Duration::from_secs(2)).await;

    assert_invariants(&result);
    assert!(!result.created());
    assert!(!result.deleted());
    assert_eq!(result.check_count(), 0);
    assert_eq!(result.outcome(), CycleOutcome::Failed);
    assert!(matches!(
        result.error(),
        Some(CheckError::Api { phase: Phase::Create, .. })
    ));

    assert_eq!(api.check_calls(), 0);
    assert_eq!(api.delete_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn create_past_deadline_times_out_without_cleanup() {
    let api = Arc::new(ScriptedApi::distributed_on(1).with_create_delay(Duration::from_secs(10)));

    let result = run_cycle(Arc::clone(&api), Duration::from_secs(2)).await;

    assert_invariants(&result);
    assert!(!result.created());
    assert!(result.error().is_some_and(CheckError::is_timeout));
    assert_eq!(api.delete_calls(), 0);
    assert!(result.timings().create.duration >= Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn never_distributed_times_out_and_still_cleans_up() {
    let api = Arc::new(ScriptedApi::never_distributed());

    let result = run_cycle(Arc::clone(&api), Duration::from_secs(1)).await;

    assert_invariants(&result);
    assert!(result.created());
    assert!(result.deleted(), "cleanup must survive the cycle deadline");
    assert_eq!(result.outcome(), CycleOutcome::TimedOut);

    let error = result.error().expect("timeout is an error");
    assert!(error.is_timeout());
    assert!(error.is_temporary());

    // Polls at 100ms..900ms complete; the deadline at 1s wins over the tenth
    assert!((9..=10).contains(&result.check_count()));
    assert_eq!(api.check_calls(), result.check_count());
    assert_eq!(api.delete_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn slow_check_is_cut_off_by_deadline() {
    let api = Arc::new(ScriptedApi::never_distributed().with_check_delay(Duration::from_secs(30)));

    let result = run_cycle(Arc::clone(&api), Duration::from_secs(2)).await;

    assert_invariants(&result);
    assert_eq!(result.check_count(), 1);
    assert!(result.error().is_some_and(CheckError::is_timeout));
    assert!(result.duration() < Duration::from_secs(3));
    assert_eq!(api.delete_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn poll_error_aborts_and_cleans_up() {
    let api = Arc::new(ScriptedApi::never_distributed().with_failing_check_on(2));

    let result = run_cycle(Arc::clone(&api), Duration::from_secs(2)).await;

    assert_invariants(&result);
    assert_eq!(result.check_count(), 2);
    assert_eq!(result.outcome(), CycleOutcome::Failed);

    let error = result.error().expect("poll failure is an error");
    assert!(matches!(error, CheckError::Api { phase: Phase::Check, .. }));
    assert!(error.is_temporary(), "a 502 is transient");

    assert!(result.deleted());
    assert_eq!(api.delete_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancellation_aborts_and_cleans_up_with_independent_scope() {
    let api = Arc::new(ScriptedApi::never_distributed());
    let checker = Checker::new(Arc::clone(&api) as _, "1010", "example.com", POLL);

    let shutdown = CancellationToken::new();
    let scope = CycleScope::new(shutdown.child_token(), Duration::from_secs(60));
    let cleanup = CleanupScope::new(CancellationToken::new(), Duration::from_secs(60));

    let canceller = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(250)).await;
        canceller.cancel();
    });

    let result = checker.check(&scope, &cleanup).await;

    assert_invariants(&result);
    assert_eq!(result.outcome(), CycleOutcome::Cancelled);
    assert!(result.error().is_some_and(CheckError::is_cancelled));
    assert_eq!(result.check_count(), 2);
    assert!(result.deleted(), "shutdown must not leak the probe record");
    assert_eq!(api.delete_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn delete_failure_does_not_override_success() {
    let api = Arc::new(ScriptedApi::distributed_on(2).with_failing_delete());

    let result = run_cycle(Arc::clone(&api), Duration::from_secs(2)).await;

    assert!(result.is_success());
    assert!(result.created());
    assert!(!result.deleted());
    assert!(result.leaked_probe());
    assert_eq!(api.delete_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn hung_delete_is_bounded_by_cleanup_timeout() {
    let api = Arc::new(ScriptedApi::distributed_on(1).with_delete_delay(Duration::from_secs(600)));
    let checker = Checker::new(Arc::clone(&api) as _, "1010", "example.com", POLL);

    let scope = CycleScope::new(CancellationToken::new(), Duration::from_secs(2));
    let cleanup = CleanupScope::new(CancellationToken::new(), Duration::from_secs(30));

    let result = checker.check(&scope, &cleanup).await;

    assert!(result.is_success());
    assert!(!result.deleted());
    let delete = result.timings().delete.expect("delete was timed");
    assert!(delete.duration >= Duration::from_secs(30));
    assert!(delete.duration < Duration::from_secs(31));
}

#[tokio::test(start_paused = true)]
async fn concurrent_cycles_in_same_second_use_distinct_probes() {
    let api = Arc::new(ScriptedApi::distributed_on(1));
    let checker = Arc::new(Checker::new(Arc::clone(&api) as _, "1010", "example.com", POLL));

    let mut handles = Vec::new();
    for _ in 0..3 {
        let checker = Arc::clone(&checker);
        handles.push(tokio::spawn(async move {
            let scope = CycleScope::new(CancellationToken::new(), Duration::from_secs(2));
            let cleanup = CleanupScope::new(CancellationToken::new(), Duration::from_secs(60));
            checker.check(&scope, &cleanup).await
        }));
    }

    let mut names = Vec::new();
    for handle in handles {
        let result = handle.await.unwrap();
        assert!(result.is_success());
        names.push(result.probe_name().to_string());
    }

    names.sort();
    names.dedup();
    assert_eq!(names.len(), 3, "probe names must be unique: {:?}", names);
    assert_eq!(api.delete_calls(), 3);
}
