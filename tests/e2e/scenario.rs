//! E2E tests for the image-build scenario

use serde_json::json;
use settle::models::{Kind, PodPhase};
use settle::scenario::{ScenarioStatus, DEFAULT_REVISION, TASK_RUN_COMPLETED};
use settle::SettleError;
use std::time::{Duration, Instant};

use super::fixtures::*;
use super::helpers::*;

#[test]
fn test_happy_path() {
    let cluster = scripted_cluster(
        vec![task_run_succeeded(build_results())],
        "Succeeded",
        "\"sha256:abc\"\n",
    );

    let report = run_scenario(&cluster, &scenario(), false, &generous_deadline()).unwrap();

    assert_eq!(report.status, ScenarioStatus::Passed);
    assert_eq!(report.results.get("digest").map(String::as_str), Some(BUILT_DIGEST));
    assert_eq!(report.results.get("commit").map(String::as_str), Some(DEFAULT_REVISION));
    assert_eq!(report.probe_phase, Some(PodPhase::Succeeded));
    assert!(report.anomalies.is_empty());
    assert_eq!(
        report.timeline.iter().map(|s| s.step).collect::<Vec<_>>(),
        ["created", "completed", "extracted", "verified"]
    );
    assert!(report.finished_at >= report.started_at);
    assert_eq!(cluster.reads(Kind::TaskRun, &task_run_id()), 2);
}

#[test]
fn test_results_come_from_the_settled_snapshot() {
    let later = json!([digest_entry("sha256:later"), commit_entry("0000000"), url_entry()]);
    let cluster = scripted_cluster(
        vec![
            task_run_succeeded(build_results()),
            task_run_succeeded(later),
        ],
        "Succeeded",
        BUILT_DIGEST,
    );

    let report = run_scenario(&cluster, &scenario(), false, &generous_deadline()).unwrap();

    assert_eq!(report.results.get("digest").map(String::as_str), Some(BUILT_DIGEST));
    assert_eq!(report.results.get("commit").map(String::as_str), Some(DEFAULT_REVISION));
}

#[test]
fn test_objects_created_before_polling_and_probe_last() {
    let cluster = scripted_cluster(
        vec![task_run_succeeded(build_results())],
        "Succeeded",
        "sha256:abc",
    );

    run_scenario(&cluster, &scenario(), false, &generous_deadline()).unwrap();

    assert_eq!(
        cluster.creation_order(),
        [
            Kind::PipelineResource,
            Kind::PipelineResource,
            Kind::Task,
            Kind::TaskRun,
            Kind::Pod
        ]
    );
    let probes = cluster.created(Kind::Pod);
    assert_eq!(probes.len(), 1);
    assert!(probes[0].name.starts_with("skopeo-jq-"));
    assert_eq!(probes[0].namespace, NAMESPACE);
}

#[test]
fn test_created_task_run_matches_manifest() {
    let cluster = scripted_cluster(
        vec![task_run_succeeded(build_results())],
        "Succeeded",
        "sha256:abc",
    );

    run_scenario(&cluster, &scenario(), false, &generous_deadline()).unwrap();

    let stored = cluster.object(Kind::TaskRun, &task_run_id()).unwrap();
    assert_eq!(stored["spec"]["taskRef"]["name"], json!("kanikotask"));
    assert_eq!(stored["spec"]["timeout"], json!("120s"));
    assert!(stored["metadata"]["uid"].is_string());
}

#[test]
fn test_probe_disagrees() {
    let cluster = scripted_cluster(
        vec![task_run_succeeded(build_results())],
        "Succeeded",
        "\"sha256:def\"",
    );

    let err = run_scenario(&cluster, &scenario(), false, &generous_deadline()).unwrap_err();

    match err {
        SettleError::VerificationMismatch { expected, actual } => {
            assert_eq!(expected, "sha256:abc");
            assert_eq!(actual, "sha256:def");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_missing_commit_launches_no_probe() {
    let results = json!([digest_entry(BUILT_DIGEST), url_entry()]);
    let cluster = scripted_cluster(vec![task_run_succeeded(results)], "Succeeded", "sha256:abc");

    let err = run_scenario(&cluster, &scenario(), false, &generous_deadline()).unwrap_err();

    assert_eq!(err.missing_key(), Some("commit"));
    assert!(cluster.created(Kind::Pod).is_empty());
    assert_eq!(cluster.log_reads(), 0);
}

#[test]
fn test_wrong_commit_launches_no_probe() {
    let results = json!([digest_entry(BUILT_DIGEST), commit_entry("deadbeef"), url_entry()]);
    let cluster = scripted_cluster(vec![task_run_succeeded(results)], "Succeeded", "sha256:abc");

    let err = run_scenario(&cluster, &scenario(), false, &generous_deadline()).unwrap_err();

    match err {
        SettleError::VerificationMismatch { expected, actual } => {
            assert_eq!(expected, DEFAULT_REVISION);
            assert_eq!(actual, "deadbeef");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(cluster.created(Kind::Pod).is_empty());
}

#[test]
fn test_build_never_finishes() {
    let cluster = scripted_cluster(Vec::new(), "Succeeded", "sha256:abc");
    let deadline = settle::deadline::Deadline::after(Duration::from_millis(150));

    let start = Instant::now();
    let err = run_scenario(&cluster, &scenario(), false, &deadline).unwrap_err();

    match err {
        SettleError::Timeout {
            identity,
            description,
            last_state,
            ..
        } => {
            assert_eq!(identity, task_run_id());
            assert_eq!(description, TASK_RUN_COMPLETED);
            assert!(last_state.contains("reason=Running"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(start.elapsed() < Duration::from_secs(2));
    assert!(cluster.created(Kind::Pod).is_empty());
}

#[test]
fn test_build_fails() {
    let cluster = scripted_cluster(
        vec![task_run_failed("step kaniko exited with code 1")],
        "Succeeded",
        "sha256:abc",
    );

    let err = run_scenario(&cluster, &scenario(), false, &generous_deadline()).unwrap_err();

    match err {
        SettleError::ConditionFailed { reason, .. } => {
            assert!(reason.contains("kanikotask-run"));
            assert!(reason.contains("exited with code 1"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(cluster.created(Kind::Pod).is_empty());
}

#[test]
fn test_failed_probe_is_compared_anyway() {
    let cluster = scripted_cluster(
        vec![task_run_succeeded(build_results())],
        "Failed",
        "\"sha256:abc\"",
    );

    let report = run_scenario(&cluster, &scenario(), false, &generous_deadline()).unwrap();

    assert_eq!(report.probe_phase, Some(PodPhase::Failed));
    assert_eq!(report.anomalies.len(), 1);
}

#[test]
fn test_failed_probe_in_strict_mode() {
    let cluster = scripted_cluster(
        vec![task_run_succeeded(build_results())],
        "Failed",
        "\"sha256:abc\"",
    );

    let err = run_scenario(&cluster, &scenario(), true, &generous_deadline()).unwrap_err();
    assert!(matches!(err, SettleError::ProbeFailed { .. }));
}

#[test]
fn test_empty_probe_output() {
    let cluster = scripted_cluster(vec![task_run_succeeded(build_results())], "Succeeded", "\n");

    let err = run_scenario(&cluster, &scenario(), false, &generous_deadline()).unwrap_err();
    assert!(matches!(err, SettleError::EmptyProbeOutput { .. }));
}

#[test]
fn test_skipped_when_root_is_forbidden() {
    let cluster = scripted_cluster(vec![task_run_succeeded(build_results())], "Succeeded", "x");
    let mut scenario = scenario();
    scenario.skip_root_user_tests = true;

    let report = run_scenario(&cluster, &scenario, false, &generous_deadline()).unwrap();

    assert_eq!(report.status, ScenarioStatus::Skipped);
    assert!(cluster.creation_order().is_empty());
}

#[test]
fn test_terminating_namespace() {
    let cluster = scripted_cluster(vec![task_run_succeeded(build_results())], "Succeeded", "x");
    cluster.terminate_namespace(NAMESPACE);

    let err = run_scenario(&cluster, &scenario(), false, &generous_deadline()).unwrap_err();

    match err {
        SettleError::Api(api) => assert!(api.is_gone()),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_unauthorized_reads_are_fatal() {
    let cluster = scripted_cluster(vec![task_run_succeeded(build_results())], "Succeeded", "x");
    cluster.fail_reads(Kind::TaskRun, 401);

    let err = run_scenario(&cluster, &scenario(), false, &generous_deadline()).unwrap_err();

    assert!(matches!(err, SettleError::Api(_)));
    assert_eq!(cluster.reads(Kind::TaskRun, &task_run_id()), 1);
}
