//! `settle run`: the full image-build scenario.

use anyhow::{Context, Result};
use colored::Colorize;
use serde_json::Value;

use super::CommandContext;
use crate::probe::PodProbeRunner;
use crate::scenario::{KanikoScenario, ScenarioReport, ScenarioStatus};
use crate::verifier::CrossVerifier;

/// Execute `settle run`
pub fn execute(ctx: &CommandContext, namespace: Option<&str>, json: bool, dry_run: bool) -> Result<()> {
    let scenario = ctx.config.scenario(namespace);

    if dry_run {
        print!("{}", render_plan(&scenario)?);
        return Ok(());
    }

    let client = ctx.client()?;
    let poller = ctx.poller();
    let verifier = CrossVerifier::new(PodProbeRunner::new(&client, poller.clone()))
        .strict(ctx.config.scenario.strict_probe);

    let report = scenario
        .run(&client, &poller, &verifier, &ctx.deadline)
        .with_context(|| format!("Scenario failed in namespace {}", scenario.namespace))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

/// Every manifest the run would create, as a multi-document YAML stream.
/// The probe pod gets its final name only at run time.
pub fn render_plan(scenario: &KanikoScenario) -> Result<String> {
    let mut manifests = scenario
        .manifests()
        .context("Failed to encode scenario manifests")?;
    let probe = scenario.digest_probe()?.to_pod();
    manifests.push(serde_json::to_value(probe).context("Failed to encode probe pod")?);
    render_yaml(&manifests)
}

fn render_yaml(manifests: &[Value]) -> Result<String> {
    let mut out = String::new();
    for manifest in manifests {
        out.push_str("---\n");
        out.push_str(&serde_yaml::to_string(manifest).context("Failed to render YAML")?);
    }
    Ok(out)
}

fn print_report(report: &ScenarioReport) {
    match report.status {
        ScenarioStatus::Skipped => {
            println!(
                "{} skipped in {}: build step requires running as root",
                "○".yellow().bold(),
                report.namespace
            );
            return;
        }
        ScenarioStatus::Passed => {}
    }

    println!(
        "{} scenario passed in {} ({:.1}s)",
        "✓".green().bold(),
        report.namespace.bold(),
        report.elapsed().num_milliseconds() as f64 / 1000.0
    );
    for (key, value) in &report.results {
        println!("  {} {}", format!("{key}:").cyan(), value);
    }
    if let Some(probe) = &report.probe {
        let phase = report
            .probe_phase
            .map(|p| p.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        println!("  {} {} ({})", "probe:".cyan(), probe, phase.dimmed());
    }
    for anomaly in &report.anomalies {
        println!("  {} {}", "!".yellow().bold(), anomaly.yellow());
    }
}
