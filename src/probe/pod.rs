//! Probe run as a one-shot pod in the cluster.

use crate::client::{create_as, Orchestrator};
use crate::conditions::pod_terminated;
use crate::deadline::Deadline;
use crate::error::SettleError;
use crate::poll::{wait_for_pod_state, Poller};

use super::{ProbeRun, ProbeRunner, ProbeSpec};

/// Description used while waiting for the probe pod.
pub const PROBE_TERMINATED: &str = "PodContainersTerminated";

/// Launches a probe pod, waits for it to terminate and reads its log.
pub struct PodProbeRunner<'a> {
    client: &'a dyn Orchestrator,
    poller: Poller,
}

impl<'a> PodProbeRunner<'a> {
    pub fn new(client: &'a dyn Orchestrator, poller: Poller) -> Self {
        Self { client, poller }
    }
}

impl ProbeRunner for PodProbeRunner<'_> {
    fn run_probe(&self, spec: &ProbeSpec, deadline: &Deadline) -> Result<ProbeRun, SettleError> {
        tracing::info!(probe = %spec.identity, image = %spec.image, "launching probe pod");
        create_as(self.client, &spec.to_pod(), deadline)?;

        // Either terminal phase counts: the verifier decides what a failed
        // probe means.
        let pod = wait_for_pod_state(
            self.client,
            &self.poller,
            &spec.identity,
            &pod_terminated(&spec.identity.name),
            PROBE_TERMINATED,
            deadline,
        )?;

        let output = self.client.logs(&spec.identity, &spec.container, deadline)?;
        tracing::debug!(probe = %spec.identity, phase = %pod.status.phase, output = %output, "probe finished");

        Ok(ProbeRun {
            phase: pod.status.phase,
            output,
        })
    }
}
