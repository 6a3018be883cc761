//! Probe jobs: "launch a job, wait for it, read its log as the return value".
//!
//! A probe observes a remote system from somewhere the verifier itself can't
//! reach (e.g. a registry only resolvable inside the test namespace) and
//! prints one value. [`ProbeRunner`] hides how the job is run so the
//! verifier can be exercised against a fake.

pub mod local;
pub mod pod;

use serde::Serialize;

use crate::deadline::Deadline;
use crate::error::SettleError;
use crate::models::{Container, Identity, ObjectMeta, Pod, PodPhase, PodSpec};

pub use local::LocalProbeRunner;
pub use pod::PodProbeRunner;

/// Default image carrying `skopeo` and `jq`.
pub const DEFAULT_PROBE_IMAGE: &str = "gcr.io/tekton-releases/dogfooding/skopeo:latest";

/// Container name used for the digest probe.
pub const DIGEST_PROBE_CONTAINER: &str = "skopeo";

/// Label marking objects launched as probes.
pub const PROBE_LABEL: &str = "settle.dev/probe";

/// What to run, and where.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeSpec {
    pub identity: Identity,
    pub image: String,
    pub container: String,
    /// Shell command run with `/bin/sh -c`.
    pub command: String,
}

/// What a finished probe reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeRun {
    pub phase: PodPhase,
    pub output: String,
}

/// Capability to run a probe to completion and return its output.
pub trait ProbeRunner {
    fn run_probe(&self, spec: &ProbeSpec, deadline: &Deadline) -> Result<ProbeRun, SettleError>;
}

impl ProbeSpec {
    pub fn new(identity: Identity, image: &str, container: &str, command: String) -> Self {
        Self {
            identity,
            image: image.to_string(),
            container: container.to_string(),
            command,
        }
    }

    /// Probe printing the registry digest of `image`.
    pub fn registry_digest(identity: Identity, probe_image: &str, image: &str) -> Self {
        Self::new(
            identity,
            probe_image,
            DIGEST_PROBE_CONTAINER,
            registry_digest_command(image),
        )
    }

    /// Single-container pod that runs the command once.
    pub fn to_pod(&self) -> Pod {
        let container = Container::new(&self.container, &self.image)
            .with_command(vec!["/bin/sh".to_string(), "-c".to_string()])
            .with_args(vec![self.command.clone()]);

        Pod::new(
            ObjectMeta::for_identity(&self.identity).with_label(PROBE_LABEL, "true"),
            PodSpec {
                containers: vec![container],
                restart_policy: Some("Never".to_string()),
            },
        )
    }
}

/// A probe name unique enough to avoid collisions between concurrent runs.
pub fn unique_name(prefix: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", &suffix[..8])
}

/// Append `:latest` unless the reference already pins a tag or digest.
pub fn with_default_tag(image: &str) -> String {
    let last_segment = image.rsplit('/').next().unwrap_or(image);
    if image.contains('@') || last_segment.contains(':') {
        image.to_string()
    } else {
        format!("{image}:latest")
    }
}

/// Shell command printing the digest of `image` as reported by its registry.
///
/// `jq` prints the digest as a JSON string, quotes included; the verifier
/// strips them when normalizing.
pub fn registry_digest_command(image: &str) -> String {
    let reference = format!("docker://{}", with_default_tag(image));
    format!(
        "skopeo inspect --tls-verify=false {} | jq '.Digest'",
        shell_escape::escape(reference.into())
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_default_tag() {
        assert_eq!(
            with_default_tag("registry.ns:5000/kanikotasktest"),
            "registry.ns:5000/kanikotasktest:latest"
        );
        assert_eq!(with_default_tag("repo/app:v1"), "repo/app:v1");
        assert_eq!(with_default_tag("repo/app@sha256:abc"), "repo/app@sha256:abc");
        assert_eq!(with_default_tag("busybox"), "busybox:latest");
    }

    #[test]
    fn test_registry_digest_command() {
        let cmd = registry_digest_command("registry.ns:5000/kanikotasktest");
        assert!(cmd.starts_with("skopeo inspect --tls-verify=false "));
        assert!(cmd.contains("docker://registry.ns:5000/kanikotasktest:latest"));
        assert!(cmd.ends_with("| jq '.Digest'"));
    }

    #[test]
    fn test_registry_digest_command_quotes_hostile_input() {
        let cmd = registry_digest_command("repo/app; rm -rf /");
        assert!(cmd.contains("'docker://repo/app; rm -rf /:latest'"));
    }

    #[test]
    fn test_probe_pod_shape() {
        let id = Identity::new("ns", "skopeo-jq").unwrap();
        let spec = ProbeSpec::registry_digest(id, DEFAULT_PROBE_IMAGE, "registry.ns:5000/app");
        let pod = spec.to_pod();

        assert_eq!(pod.metadata.name, "skopeo-jq");
        assert_eq!(pod.metadata.labels.get(PROBE_LABEL).map(String::as_str), Some("true"));
        assert_eq!(pod.spec.restart_policy.as_deref(), Some("Never"));
        assert_eq!(pod.spec.containers.len(), 1);
        let container = &pod.spec.containers[0];
        assert_eq!(container.name, DIGEST_PROBE_CONTAINER);
        assert_eq!(container.command, vec!["/bin/sh", "-c"]);
        assert_eq!(container.args, vec![spec.command.clone()]);
    }

    #[test]
    fn test_unique_name() {
        let a = unique_name("skopeo-jq");
        let b = unique_name("skopeo-jq");
        assert_ne!(a, b);
        assert!(a.starts_with("skopeo-jq-"));
        assert_eq!(a.len(), "skopeo-jq-".len() + 8);
        assert!(crate::models::validate_name(&a).is_ok());
    }
}
