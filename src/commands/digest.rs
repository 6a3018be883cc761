//! `settle digest`: ask a registry for an image digest through a probe, and
//! optionally verify it against an expected value.

use anyhow::{Context, Result};
use colored::Colorize;

use super::CommandContext;
use crate::deadline::Deadline;
use crate::error::SettleError;
use crate::probe::{unique_name, LocalProbeRunner, PodProbeRunner, ProbeRunner, ProbeSpec};
use crate::scenario::PROBE_PREFIX;
use crate::verifier::{normalize_output, CrossVerifier};

/// What a digest probe found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestReport {
    pub digest: String,
    pub verified: bool,
    pub anomalies: Vec<String>,
}

/// Run the probe once. With `expected`, compare through the verifier;
/// without, just return the normalized output.
pub fn probe_digest<P: ProbeRunner>(
    runner: P,
    spec: &ProbeSpec,
    expected: Option<&str>,
    strict_probe: bool,
    deadline: &Deadline,
) -> Result<DigestReport, SettleError> {
    if let Some(expected) = expected {
        let verification = CrossVerifier::new(runner)
            .strict(strict_probe)
            .verify(expected, spec, deadline)?;
        return Ok(DigestReport {
            digest: verification.value,
            verified: true,
            anomalies: verification.anomalies,
        });
    }

    let run = runner.run_probe(spec, deadline)?;
    let digest = normalize_output(&run.output);
    if digest.is_empty() {
        return Err(SettleError::EmptyProbeOutput {
            probe: spec.identity.clone(),
        });
    }
    Ok(DigestReport {
        digest,
        verified: false,
        anomalies: Vec::new(),
    })
}

/// Execute `settle digest`
pub fn execute(
    ctx: &CommandContext,
    image: &str,
    namespace: Option<&str>,
    expected: Option<&str>,
    local: bool,
) -> Result<()> {
    let identity = ctx.identity(namespace, &unique_name(PROBE_PREFIX))?;
    let spec = ProbeSpec::registry_digest(identity, &ctx.config.images.probe, image);
    let strict = ctx.config.scenario.strict_probe;

    let result = if local {
        probe_digest(LocalProbeRunner::new(), &spec, expected, strict, &ctx.deadline)
    } else {
        let client = ctx.client()?;
        probe_digest(
            PodProbeRunner::new(&client, ctx.poller()),
            &spec,
            expected,
            strict,
            &ctx.deadline,
        )
    };
    let report = result.with_context(|| format!("Failed to resolve digest of {image}"))?;

    for anomaly in &report.anomalies {
        println!("{} {}", "!".yellow().bold(), anomaly.yellow());
    }
    if report.verified {
        println!("{} {} {}", "✓".green().bold(), image.bold(), report.digest);
    } else {
        println!("{}", report.digest);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Identity, PodPhase};
    use crate::probe::ProbeRun;
    use std::time::Duration;

    struct Echo(&'static str);

    impl ProbeRunner for Echo {
        fn run_probe(&self, _: &ProbeSpec, _: &Deadline) -> Result<ProbeRun, SettleError> {
            Ok(ProbeRun {
                phase: PodPhase::Succeeded,
                output: self.0.to_string(),
            })
        }
    }

    fn spec() -> ProbeSpec {
        ProbeSpec::registry_digest(Identity::new("ns", "skopeo-jq-1").unwrap(), "skopeo", "repo/app")
    }

    fn deadline() -> Deadline {
        Deadline::after(Duration::from_secs(5))
    }

    #[test]
    fn test_unverified_digest() {
        let report = probe_digest(Echo("\"sha256:abc\"\n"), &spec(), None, false, &deadline()).unwrap();
        assert_eq!(report.digest, "sha256:abc");
        assert!(!report.verified);
    }

    #[test]
    fn test_verified_digest() {
        let report =
            probe_digest(Echo("\"sha256:abc\"\n"), &spec(), Some("sha256:abc"), false, &deadline())
                .unwrap();
        assert!(report.verified);
    }

    #[test]
    fn test_empty_without_expectation() {
        let err = probe_digest(Echo("\n"), &spec(), None, false, &deadline()).unwrap_err();
        assert!(matches!(err, SettleError::EmptyProbeOutput { .. }));
    }

    #[test]
    fn test_local_runner() {
        let spec = ProbeSpec::new(
            Identity::new("local", "probe").unwrap(),
            "",
            "sh",
            "echo '\"sha256:abc\"'".to_string(),
        );
        let report = probe_digest(
            LocalProbeRunner::new(),
            &spec,
            Some("sha256:abc"),
            true,
            &deadline(),
        )
        .unwrap();
        assert_eq!(report.digest, "sha256:abc");
    }
}
