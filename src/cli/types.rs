use clap::{Parser, Subcommand};
use settle::commands::wait::{PodState, TaskRunState};
use settle::models::clap_name_validator;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "settle")]
#[command(about = "Wait for workloads to settle and cross-check what they report", long_about = None)]
#[command(version)]
#[command(subcommand_help_heading = "Commands")]
pub struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/settle/settle.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Namespace to operate in (overrides config and SETTLE_NAMESPACE)
    #[arg(short, long, global = true, value_parser = clap_name_validator)]
    pub namespace: Option<String>,

    /// More log output (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build an image with kaniko and verify its digest against the registry
    Run {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Print the manifests that would be created and exit
        #[arg(long)]
        dry_run: bool,
    },

    /// Wait for an object to reach a state
    Wait {
        #[command(subcommand)]
        command: WaitCommands,
    },

    /// Print the results a TaskRun reported
    Results {
        /// TaskRun name
        #[arg(value_parser = clap_name_validator)]
        task_run: String,

        /// Result keys to require (default: digest, commit, url)
        #[arg(short, long = "key")]
        keys: Vec<String>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve an image digest from its registry
    Digest {
        /// Image reference (":latest" is assumed without a tag)
        image: String,

        /// Fail unless the registry reports this digest
        #[arg(long)]
        expected: Option<String>,

        /// Run the probe on this host instead of in a pod
        #[arg(long)]
        local: bool,
    },
}

#[derive(Subcommand)]
pub enum WaitCommands {
    /// Wait for a TaskRun
    TaskRun {
        #[arg(value_parser = clap_name_validator)]
        name: String,

        #[arg(long = "for", value_enum, default_value_t = TaskRunState::Succeed)]
        state: TaskRunState,
    },

    /// Wait for a Pod
    Pod {
        #[arg(value_parser = clap_name_validator)]
        name: String,

        #[arg(long = "for", value_enum, default_value_t = PodState::Terminated)]
        state: PodState,
    },
}
