//! Canned object statuses

use serde_json::{json, Value};
use settle::scenario::{DEFAULT_REVISION, GIT_RESOURCE_NAME, IMAGE_RESOURCE_NAME};

pub const BUILT_DIGEST: &str = "sha256:abc";
pub const GIT_URL: &str = "https://github.com/GoogleContainerTools/kaniko";

/// TaskRun status with the `Succeeded` condition in a given state.
pub fn task_run_status(status: &str, reason: &str) -> Value {
    json!({
        "conditions": [{"type": "Succeeded", "status": status, "reason": reason}]
    })
}

pub fn task_run_running() -> Value {
    task_run_status("Unknown", "Running")
}

/// A finished build reporting the given result entries.
pub fn task_run_succeeded(results: Value) -> Value {
    json!({
        "conditions": [{"type": "Succeeded", "status": "True", "reason": "Succeeded"}],
        "resourcesResult": results
    })
}

pub fn task_run_failed(message: &str) -> Value {
    json!({
        "conditions": [{
            "type": "Succeeded",
            "status": "False",
            "reason": "Failed",
            "message": message
        }]
    })
}

pub fn digest_entry(digest: &str) -> Value {
    json!({"key": "digest", "value": digest, "resourceRef": {"name": IMAGE_RESOURCE_NAME}})
}

pub fn commit_entry(commit: &str) -> Value {
    json!({"key": "commit", "value": commit, "resourceRef": {"name": GIT_RESOURCE_NAME}})
}

pub fn url_entry() -> Value {
    json!({"key": "url", "value": GIT_URL, "resourceRef": {"name": GIT_RESOURCE_NAME}})
}

/// Every result a good build reports.
pub fn build_results() -> Value {
    json!([digest_entry(BUILT_DIGEST), commit_entry(DEFAULT_REVISION), url_entry()])
}

pub fn pod_phase(phase: &str) -> Value {
    json!({"phase": phase})
}
