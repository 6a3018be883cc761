//! Test helper functions for E2E tests

use serde_json::Value;
use settle::client::InMemoryCluster;
use settle::deadline::Deadline;
use settle::models::{Identity, Kind};
use settle::poll::{PollConfig, Poller};
use settle::probe::{PodProbeRunner, DIGEST_PROBE_CONTAINER};
use settle::scenario::{KanikoScenario, ScenarioReport, TASK_RUN_NAME};
use settle::verifier::CrossVerifier;
use settle::SettleError;
use std::time::Duration;

use super::fixtures::{pod_phase, task_run_running};

pub const NAMESPACE: &str = "arendelle-x1";

/// Poll every few milliseconds so tests stay fast.
pub fn fast_poller() -> Poller {
    Poller::new(PollConfig::fixed(Duration::from_millis(2)))
}

pub fn generous_deadline() -> Deadline {
    Deadline::after(Duration::from_secs(10))
}

pub fn task_run_id() -> Identity {
    Identity::new(NAMESPACE, TASK_RUN_NAME).unwrap()
}

/// A cluster where the build progresses through `statuses` and every probe
/// pod terminates with `probe_phase`, printing `probe_output`.
pub fn scripted_cluster(statuses: Vec<Value>, probe_phase: &str, probe_output: &str) -> InMemoryCluster {
    let cluster = InMemoryCluster::new();
    let mut progression = vec![task_run_running()];
    progression.extend(statuses);
    cluster.script_status(Kind::TaskRun, &task_run_id(), progression);
    cluster.script_created(Kind::Pod, vec![pod_phase("Pending"), pod_phase(probe_phase)]);
    cluster.set_container_logs(DIGEST_PROBE_CONTAINER, probe_output);
    cluster
}

pub fn scenario() -> KanikoScenario {
    KanikoScenario::new(NAMESPACE)
}

/// Run the scenario with probes launched as pods on the same cluster.
pub fn run_scenario(
    cluster: &InMemoryCluster,
    scenario: &KanikoScenario,
    strict_probe: bool,
    deadline: &Deadline,
) -> Result<ScenarioReport, SettleError> {
    let poller = fast_poller();
    let verifier =
        CrossVerifier::new(PodProbeRunner::new(cluster, poller.clone())).strict(strict_probe);
    scenario.run(cluster, &poller, &verifier, deadline)
}
