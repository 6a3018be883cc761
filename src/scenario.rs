//! The image-build scenario.
//!
//! Builds an image with kaniko from a pinned Git revision, pushes it to a
//! registry sidecar, then checks that the TaskRun's reported results agree
//! with the source revision and with the digest the registry itself serves.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::client::{create_as, ApiError, Orchestrator};
use crate::conditions::succeed;
use crate::deadline::Deadline;
use crate::error::SettleError;
use crate::models::{
    format_timeout, Container, Identity, Kind, ObjectMeta, PipelineResource, PodPhase,
    ResourceBinding, ResourceDeclaration, ResourceRef, ResourceType, Task, TaskRef, TaskResources,
    TaskRun, TaskRunResources, TaskRunSpec, TaskSpec,
};
use crate::poll::{wait_for_task_run_state, Poller};
use crate::probe::{unique_name, ProbeRunner, ProbeSpec, DEFAULT_PROBE_IMAGE};
use crate::results::{extract, BUILD_RESULT_KEYS, COMMIT_KEY, DIGEST_KEY};
use crate::verifier::CrossVerifier;

pub const TASK_NAME: &str = "kanikotask";
pub const TASK_RUN_NAME: &str = "kanikotask-run";
pub const GIT_RESOURCE_NAME: &str = "go-example-git";
pub const IMAGE_RESOURCE_NAME: &str = "go-example-image";

/// Declared resource names inside the Task.
const GIT_INPUT: &str = "gitsource";
const IMAGE_OUTPUT: &str = "builtImage";

/// Revision the build is pinned to.
pub const DEFAULT_REVISION: &str = "a310cc6d1cd449f95cedd23393de766fdc649651";
pub const DEFAULT_GIT_URL: &str = "https://github.com/GoogleContainerTools/kaniko";
pub const DEFAULT_REPOSITORY: &str = "kanikotasktest";
pub const DEFAULT_KANIKO_IMAGE: &str = "gcr.io/kaniko-project/executor:v1.3.0";
pub const DEFAULT_REGISTRY_IMAGE: &str = "registry";
pub const DEFAULT_TASK_RUN_TIMEOUT: Duration = Duration::from_secs(120);

/// Description used while waiting for the build.
pub const TASK_RUN_COMPLETED: &str = "TaskRunCompleted";

/// Prefix of the generated digest probe pod name.
pub const PROBE_PREFIX: &str = "skopeo-jq";

/// Parameters of one scenario run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KanikoScenario {
    pub namespace: String,
    pub git_url: String,
    pub revision: String,
    /// Repository name inside the in-namespace registry.
    pub repository: String,
    pub kaniko_image: String,
    pub registry_image: String,
    pub probe_image: String,
    pub task_run_timeout: Duration,
    /// The build step runs as root; clusters that forbid it skip the run.
    pub skip_root_user_tests: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioStatus {
    Passed,
    Skipped,
}

/// When a step of the run completed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    pub step: &'static str,
    pub completed_at: DateTime<Utc>,
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioReport {
    pub status: ScenarioStatus,
    pub namespace: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub task_run: Option<Identity>,
    pub results: BTreeMap<String, String>,
    pub probe: Option<Identity>,
    pub probe_phase: Option<PodPhase>,
    pub anomalies: Vec<String>,
    pub timeline: Vec<StepRecord>,
}

impl ScenarioReport {
    fn new(namespace: &str) -> Self {
        let now = Utc::now();
        Self {
            status: ScenarioStatus::Skipped,
            namespace: namespace.to_string(),
            started_at: now,
            finished_at: now,
            task_run: None,
            results: BTreeMap::new(),
            probe: None,
            probe_phase: None,
            anomalies: Vec::new(),
            timeline: Vec::new(),
        }
    }

    fn step(&mut self, step: &'static str) {
        tracing::debug!(step, "step completed");
        self.timeline.push(StepRecord {
            step,
            completed_at: Utc::now(),
        });
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

impl KanikoScenario {
    pub fn new(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            git_url: DEFAULT_GIT_URL.to_string(),
            revision: DEFAULT_REVISION.to_string(),
            repository: DEFAULT_REPOSITORY.to_string(),
            kaniko_image: DEFAULT_KANIKO_IMAGE.to_string(),
            registry_image: DEFAULT_REGISTRY_IMAGE.to_string(),
            probe_image: DEFAULT_PROBE_IMAGE.to_string(),
            task_run_timeout: DEFAULT_TASK_RUN_TIMEOUT,
            skip_root_user_tests: false,
        }
    }

    fn registry_host(&self) -> String {
        format!("registry.{}:5000", self.namespace)
    }

    /// Image reference the build pushes to.
    pub fn image_url(&self) -> String {
        format!("{}/{}", self.registry_host(), self.repository)
    }

    fn identity(&self, name: &str) -> Result<Identity, SettleError> {
        Identity::new(self.namespace.as_str(), name).map_err(|e| {
            SettleError::Api(ApiError::InvalidObject {
                kind: Kind::TaskRun,
                message: e.to_string(),
            })
        })
    }

    fn meta(&self, name: &str) -> ObjectMeta {
        ObjectMeta {
            name: name.to_string(),
            namespace: self.namespace.clone(),
            ..Default::default()
        }
    }

    pub fn git_resource(&self) -> PipelineResource {
        PipelineResource::git(self.meta(GIT_RESOURCE_NAME), &self.git_url, &self.revision)
    }

    pub fn image_resource(&self) -> PipelineResource {
        PipelineResource::image(self.meta(IMAGE_RESOURCE_NAME), &self.image_url())
    }

    pub fn task(&self) -> Task {
        let kaniko = Container::new("kaniko", &self.kaniko_image)
            .with_args(vec![
                "--dockerfile=/workspace/gitsource/integration/dockerfiles/Dockerfile_test_label"
                    .to_string(),
                format!("--destination={}", self.image_url()),
                "--context=/workspace/gitsource".to_string(),
                "--oci-layout-path=/workspace/output/builtImage".to_string(),
                "--insecure".to_string(),
                "--insecure-pull".to_string(),
                format!("--insecure-registry={}/", self.registry_host()),
            ])
            .run_as_root();

        Task::new(
            self.meta(TASK_NAME),
            TaskSpec {
                resources: Some(TaskResources {
                    inputs: vec![ResourceDeclaration {
                        name: GIT_INPUT.to_string(),
                        resource_type: ResourceType::Git,
                    }],
                    outputs: vec![ResourceDeclaration {
                        name: IMAGE_OUTPUT.to_string(),
                        resource_type: ResourceType::Image,
                    }],
                }),
                steps: vec![kaniko],
                sidecars: vec![Container::new("registry", &self.registry_image)],
            },
        )
    }

    pub fn task_run(&self) -> TaskRun {
        let binding = |name: &str, resource: &str| ResourceBinding {
            name: name.to_string(),
            resource_ref: ResourceRef {
                name: resource.to_string(),
            },
        };

        TaskRun::new(
            self.meta(TASK_RUN_NAME),
            TaskRunSpec {
                task_ref: Some(TaskRef {
                    name: TASK_NAME.to_string(),
                }),
                timeout: Some(format_timeout(self.task_run_timeout)),
                resources: Some(TaskRunResources {
                    inputs: vec![binding(GIT_INPUT, GIT_RESOURCE_NAME)],
                    outputs: vec![binding(IMAGE_OUTPUT, IMAGE_RESOURCE_NAME)],
                }),
            },
        )
    }

    /// Every object the run creates, in creation order.
    pub fn manifests(&self) -> Result<Vec<Value>, serde_json::Error> {
        Ok(vec![
            serde_json::to_value(self.git_resource())?,
            serde_json::to_value(self.image_resource())?,
            serde_json::to_value(self.task())?,
            serde_json::to_value(self.task_run())?,
        ])
    }

    /// The digest probe for the built image, under a fresh name.
    pub fn digest_probe(&self) -> Result<ProbeSpec, SettleError> {
        let identity = self.identity(&unique_name(PROBE_PREFIX))?;
        Ok(ProbeSpec::registry_digest(
            identity,
            &self.probe_image,
            &self.image_url(),
        ))
    }

    /// Create the workload, wait for it, and verify what it reports.
    ///
    /// Extraction only happens once the TaskRun has succeeded, and the probe
    /// is only launched once the reported commit has checked out.
    pub fn run<P: ProbeRunner>(
        &self,
        client: &dyn Orchestrator,
        poller: &Poller,
        verifier: &CrossVerifier<P>,
        deadline: &Deadline,
    ) -> Result<ScenarioReport, SettleError> {
        let mut report = ScenarioReport::new(&self.namespace);

        if self.skip_root_user_tests {
            tracing::info!(namespace = %self.namespace, "skipping: build step requires running as root");
            return Ok(report);
        }

        let task_run_id = self.identity(TASK_RUN_NAME)?;
        report.task_run = Some(task_run_id.clone());

        tracing::info!(namespace = %self.namespace, name = GIT_RESOURCE_NAME, "creating git resource");
        create_as(client, &self.git_resource(), deadline)?;
        tracing::info!(namespace = %self.namespace, image = %self.image_url(), "creating image resource");
        create_as(client, &self.image_resource(), deadline)?;
        tracing::info!(namespace = %self.namespace, name = TASK_NAME, "creating task");
        create_as(client, &self.task(), deadline)?;
        tracing::info!(namespace = %self.namespace, name = TASK_RUN_NAME, "creating task run");
        create_as(client, &self.task_run(), deadline)?;
        report.step("created");

        let task_run = wait_for_task_run_state(
            client,
            poller,
            &task_run_id,
            &succeed(TASK_RUN_NAME),
            TASK_RUN_COMPLETED,
            deadline,
        )?;
        report.step("completed");

        let results = extract(&task_run, BUILD_RESULT_KEYS)?;
        results.expect(COMMIT_KEY, &self.revision)?;
        let digest = results
            .get(DIGEST_KEY)
            .ok_or_else(|| SettleError::MissingResult {
                identity: task_run_id.clone(),
                keys: vec![DIGEST_KEY.to_string()],
            })?
            .to_string();
        report.results = results.into_map();
        report.step("extracted");

        let probe = self.digest_probe()?;
        report.probe = Some(probe.identity.clone());
        let verification = verifier.verify(&digest, &probe, deadline)?;
        report.probe_phase = Some(verification.phase);
        report.anomalies = verification.anomalies;
        report.step("verified");

        report.status = ScenarioStatus::Passed;
        report.finished_at = Utc::now();
        tracing::info!(
            namespace = %self.namespace,
            digest = %digest,
            elapsed_ms = report.elapsed().num_milliseconds(),
            "scenario passed"
        );
        Ok(report)
    }
}
