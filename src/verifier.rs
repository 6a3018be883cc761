//! Cross-system verification: compare a value reported by one system with
//! the same value observed independently through a probe.

use serde::Serialize;

use crate::deadline::Deadline;
use crate::error::SettleError;
use crate::models::{Identity, PodPhase};
use crate::probe::{ProbeRunner, ProbeSpec};

/// Strip `"` characters and surrounding whitespace from probe output.
///
/// Probes commonly print JSON strings (`"sha256:..."`) followed by a newline.
pub fn normalize_output(raw: &str) -> String {
    raw.replace('"', "").trim().to_string()
}

/// A successful verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verification {
    pub probe: Identity,
    pub value: String,
    pub phase: PodPhase,
    /// Things that looked wrong but didn't change the verdict.
    pub anomalies: Vec<String>,
}

/// Runs a probe once and compares its normalized output to an expected value.
pub struct CrossVerifier<P> {
    runner: P,
    strict_probe: bool,
}

impl<P: ProbeRunner> CrossVerifier<P> {
    pub fn new(runner: P) -> Self {
        Self {
            runner,
            strict_probe: false,
        }
    }

    /// Treat a probe that ended in `Failed` as an error instead of comparing
    /// its output anyway.
    pub fn strict(mut self, strict_probe: bool) -> Self {
        self.strict_probe = strict_probe;
        self
    }

    pub fn runner(&self) -> &P {
        &self.runner
    }

    pub fn verify(
        &self,
        expected: &str,
        spec: &ProbeSpec,
        deadline: &Deadline,
    ) -> Result<Verification, SettleError> {
        let run = self.runner.run_probe(spec, deadline)?;
        let mut anomalies = Vec::new();

        if run.phase == PodPhase::Failed {
            if self.strict_probe {
                return Err(SettleError::ProbeFailed {
                    probe: spec.identity.clone(),
                    output: run.output,
                });
            }
            tracing::warn!(
                probe = %spec.identity,
                phase = %run.phase,
                "probe terminated unsuccessfully, comparing its output anyway"
            );
            anomalies.push(format!("probe {} terminated in phase {}", spec.identity, run.phase));
        }

        let actual = normalize_output(&run.output);
        if actual.is_empty() {
            return Err(SettleError::EmptyProbeOutput {
                probe: spec.identity.clone(),
            });
        }

        if actual != expected {
            tracing::warn!(probe = %spec.identity, expected, actual = %actual, "values disagree");
            return Err(SettleError::VerificationMismatch {
                expected: expected.to_string(),
                actual,
            });
        }

        tracing::info!(probe = %spec.identity, value = %actual, "verified");
        Ok(Verification {
            probe: spec.identity.clone(),
            value: actual,
            phase: run.phase,
            anomalies,
        })
    }
}
