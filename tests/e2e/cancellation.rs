//! E2E tests for cancelling a run in flight

use settle::deadline::{CancelToken, Deadline};
use settle::models::Kind;
use settle::SettleError;
use std::thread;
use std::time::{Duration, Instant};

use super::helpers::*;

#[test]
fn test_cancel_during_build_wait() {
    let cluster = scripted_cluster(Vec::new(), "Succeeded", "sha256:abc");
    let token = CancelToken::new();
    let deadline = Deadline::with_token(Duration::from_secs(60), token.clone());

    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        token.cancel();
    });

    let start = Instant::now();
    let err = run_scenario(&cluster, &scenario(), false, &deadline).unwrap_err();

    assert!(matches!(err, SettleError::Cancelled { .. }));
    assert!(start.elapsed() < Duration::from_secs(5));
    assert!(cluster.created(Kind::Pod).is_empty());
    canceller.join().unwrap();
}

#[test]
fn test_cancelled_before_start_never_polls() {
    let cluster = scripted_cluster(Vec::new(), "Succeeded", "sha256:abc");
    let token = CancelToken::new();
    token.cancel();
    let deadline = Deadline::with_token(Duration::from_secs(60), token);

    let err = run_scenario(&cluster, &scenario(), false, &deadline).unwrap_err();

    assert!(matches!(err, SettleError::Cancelled { .. }));
    assert_eq!(cluster.reads(Kind::TaskRun, &task_run_id()), 0);
    assert!(cluster.creation_order().is_empty());
}

#[test]
fn test_expired_before_start_is_a_timeout() {
    let cluster = scripted_cluster(Vec::new(), "Succeeded", "sha256:abc");

    let err = run_scenario(&cluster, &scenario(), false, &Deadline::after(Duration::ZERO))
        .unwrap_err();

    assert!(err.is_timeout(), "unexpected error: {err:?}");
    assert!(cluster.creation_order().is_empty());
}
