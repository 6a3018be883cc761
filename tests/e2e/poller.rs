//! E2E tests for waiting on objects through the orchestrator

use serde_json::json;
use settle::client::{InMemoryCluster, Orchestrator};
use settle::conditions::{pod_terminated, succeed};
use settle::deadline::Deadline;
use settle::models::{Identity, Kind, PodPhase};
use settle::poll::{wait_for_pod_state, wait_for_task_run_state, PollConfig, Poller};
use settle::SettleError;
use std::time::{Duration, Instant};

use super::fixtures::*;
use super::helpers::*;

fn insert_task_run(cluster: &InMemoryCluster, id: &Identity) {
    cluster.insert(
        Kind::TaskRun,
        id,
        json!({"metadata": {"name": id.name, "namespace": id.namespace}}),
    );
}

#[test]
fn test_satisfied_on_first_matching_snapshot() {
    let cluster = InMemoryCluster::new();
    let id = task_run_id();
    insert_task_run(&cluster, &id);
    cluster.script_status(
        Kind::TaskRun,
        &id,
        vec![
            task_run_running(),
            task_run_running(),
            task_run_succeeded(build_results()),
            task_run_failed("later"),
        ],
    );

    let tr = wait_for_task_run_state(
        &cluster,
        &fast_poller(),
        &id,
        &succeed(&id.name),
        "TaskRunCompleted",
        &generous_deadline(),
    )
    .unwrap();

    assert_eq!(tr.status.resources_result.len(), 3);
    assert_eq!(cluster.reads(Kind::TaskRun, &id), 3);
}

#[test]
fn test_no_reads_after_terminal_failure() {
    let cluster = InMemoryCluster::new();
    let id = task_run_id();
    insert_task_run(&cluster, &id);
    cluster.script_status(
        Kind::TaskRun,
        &id,
        vec![task_run_running(), task_run_failed("boom"), task_run_succeeded(build_results())],
    );

    let err = wait_for_task_run_state(
        &cluster,
        &fast_poller(),
        &id,
        &succeed(&id.name),
        "TaskRunCompleted",
        &generous_deadline(),
    )
    .unwrap_err();

    assert!(matches!(err, SettleError::ConditionFailed { .. }));
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(cluster.reads(Kind::TaskRun, &id), 2);
}

#[test]
fn test_object_not_visible_yet() {
    let cluster = InMemoryCluster::new();
    let id = Identity::new(NAMESPACE, "skopeo-jq").unwrap();
    cluster.hide_after_create(Kind::Pod, 3);
    cluster.script_status(Kind::Pod, &id, vec![pod_phase("Succeeded")]);
    cluster
        .create(
            Kind::Pod,
            &json!({"metadata": {"name": "skopeo-jq", "namespace": NAMESPACE}}),
            &generous_deadline(),
        )
        .unwrap();

    let pod = wait_for_pod_state(
        &cluster,
        &fast_poller(),
        &id,
        &pod_terminated("skopeo-jq"),
        "PodContainersTerminated",
        &generous_deadline(),
    )
    .unwrap();

    assert_eq!(pod.status.phase, PodPhase::Succeeded);
    assert_eq!(cluster.reads(Kind::Pod, &id), 4);
}

#[test]
fn test_never_created_object_times_out() {
    let cluster = InMemoryCluster::new();
    let id = Identity::new(NAMESPACE, "ghost").unwrap();
    let timeout = Duration::from_millis(100);

    let start = Instant::now();
    let err = wait_for_pod_state(
        &cluster,
        &fast_poller(),
        &id,
        &pod_terminated("ghost"),
        "PodContainersTerminated",
        &Deadline::after(timeout),
    )
    .unwrap_err();
    let elapsed = start.elapsed();

    match err {
        SettleError::Timeout { last_state, attempts, .. } => {
            assert_eq!(last_state, "never observed");
            assert!(attempts > 1);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(elapsed >= timeout);
    assert!(elapsed < timeout + Duration::from_millis(500));
}

#[test]
fn test_slow_api_server_bounded_by_deadline() {
    let cluster = InMemoryCluster::new();
    let id = task_run_id();
    insert_task_run(&cluster, &id);
    cluster.script_status(Kind::TaskRun, &id, vec![task_run_succeeded(build_results())]);
    cluster.set_read_delay(Duration::from_secs(5));

    let start = Instant::now();
    let result = wait_for_task_run_state(
        &cluster,
        &fast_poller(),
        &id,
        &succeed(&id.name),
        "TaskRunCompleted",
        &Deadline::after(Duration::from_millis(100)),
    );

    assert!(result.unwrap_err().is_timeout());
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[test]
fn test_backoff_reduces_reads() {
    let cluster = InMemoryCluster::new();
    let id = Identity::new(NAMESPACE, "slow").unwrap();
    cluster.insert(
        Kind::Pod,
        &id,
        json!({"metadata": {"name": "slow", "namespace": NAMESPACE}}),
    );
    cluster.script_status(Kind::Pod, &id, vec![pod_phase("Running")]);

    let poller = Poller::new(PollConfig {
        interval: Duration::from_millis(5),
        max_interval: Duration::from_millis(80),
        timeout: None,
    });
    let _ = wait_for_pod_state(
        &cluster,
        &poller,
        &id,
        &pod_terminated("slow"),
        "PodContainersTerminated",
        &Deadline::after(Duration::from_millis(300)),
    );

    // 5, 10, 20, 40, 80, 80, ... ms: far fewer reads than a fixed 5ms cadence.
    assert!(cluster.reads(Kind::Pod, &id) < 15);
}
