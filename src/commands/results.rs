//! `settle results`: print the results a TaskRun reported.

use anyhow::{Context, Result};
use colored::Colorize;

use super::CommandContext;
use crate::client::{get_as, Orchestrator};
use crate::deadline::Deadline;
use crate::models::{Identity, TaskRun};
use crate::results::{extract, ExtractedResults, BUILD_RESULT_KEYS};

/// Read the TaskRun once and extract `keys` (the build keys when empty).
pub fn fetch_results(
    client: &dyn Orchestrator,
    identity: &Identity,
    keys: &[String],
    deadline: &Deadline,
) -> Result<ExtractedResults> {
    let task_run: TaskRun = get_as(client, identity, deadline)
        .with_context(|| format!("Failed to read TaskRun {identity}"))?;

    let results = if keys.is_empty() {
        extract(&task_run, BUILD_RESULT_KEYS)
    } else {
        extract(&task_run, keys.iter().map(String::as_str))
    };
    results.with_context(|| format!("Failed to extract results from {identity}"))
}

/// Execute `settle results`
pub fn execute(
    ctx: &CommandContext,
    name: &str,
    namespace: Option<&str>,
    keys: &[String],
    json: bool,
) -> Result<()> {
    let identity = ctx.identity(namespace, name)?;
    let client = ctx.client()?;
    let results = fetch_results(&client, &identity, keys, &ctx.deadline)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    println!("{} {}", "Results of".bold(), identity.to_string().bold());
    let width = results.values.keys().map(String::len).max().unwrap_or(0);
    for (key, value) in &results.values {
        println!("  {:width$}  {}", key.cyan(), value);
    }
    Ok(())
}
