//! `settle wait`: block until a TaskRun or Pod reaches a state.

use anyhow::{Context, Result};
use clap::ValueEnum;
use colored::Colorize;

use super::CommandContext;
use crate::client::Orchestrator;
use crate::conditions::{failed, pod_running, pod_terminated, running, succeed, Condition};
use crate::deadline::Deadline;
use crate::models::{Identity, Pod, StateSummary, TaskRun};
use crate::poll::{wait_for_pod_state, wait_for_task_run_state, Poller};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TaskRunState {
    /// Finished successfully
    Succeed,
    /// Started and not yet finished
    Running,
    /// Finished unsuccessfully
    Failed,
}

impl TaskRunState {
    pub fn condition(self, name: &str) -> Condition<TaskRun> {
        match self {
            TaskRunState::Succeed => succeed(name),
            TaskRunState::Running => running(name),
            TaskRunState::Failed => failed(name),
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            TaskRunState::Succeed => "TaskRunCompleted",
            TaskRunState::Running => "TaskRunRunning",
            TaskRunState::Failed => "TaskRunFailed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PodState {
    /// All containers exited, successfully or not
    Terminated,
    Running,
}

impl PodState {
    pub fn condition(self, name: &str) -> Condition<Pod> {
        match self {
            PodState::Terminated => pod_terminated(name),
            PodState::Running => pod_running(name),
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            PodState::Terminated => "PodContainersTerminated",
            PodState::Running => "PodRunning",
        }
    }
}

pub fn wait_task_run(
    client: &dyn Orchestrator,
    poller: &Poller,
    identity: &Identity,
    state: TaskRunState,
    deadline: &Deadline,
) -> Result<TaskRun> {
    let condition = state.condition(&identity.name);
    wait_for_task_run_state(client, poller, identity, &condition, state.description(), deadline)
        .with_context(|| format!("Failed waiting for TaskRun {identity}"))
}

pub fn wait_pod(
    client: &dyn Orchestrator,
    poller: &Poller,
    identity: &Identity,
    state: PodState,
    deadline: &Deadline,
) -> Result<Pod> {
    let condition = state.condition(&identity.name);
    wait_for_pod_state(client, poller, identity, &condition, state.description(), deadline)
        .with_context(|| format!("Failed waiting for Pod {identity}"))
}

/// Execute `settle wait task-run`
pub fn task_run(
    ctx: &CommandContext,
    name: &str,
    namespace: Option<&str>,
    state: TaskRunState,
) -> Result<()> {
    let identity = ctx.identity(namespace, name)?;
    let client = ctx.client()?;
    let tr = wait_task_run(&client, &ctx.poller(), &identity, state, &ctx.deadline)?;
    print_settled(&identity, state.description(), &tr);
    Ok(())
}

/// Execute `settle wait pod`
pub fn pod(ctx: &CommandContext, name: &str, namespace: Option<&str>, state: PodState) -> Result<()> {
    let identity = ctx.identity(namespace, name)?;
    let client = ctx.client()?;
    let pod = wait_pod(&client, &ctx.poller(), &identity, state, &ctx.deadline)?;
    print_settled(&identity, state.description(), &pod);
    Ok(())
}

fn print_settled(identity: &Identity, description: &str, snapshot: &impl StateSummary) {
    println!(
        "{} {} {} ({})",
        "✓".green().bold(),
        identity.to_string().bold(),
        description,
        snapshot.state_summary().dimmed()
    );
}
