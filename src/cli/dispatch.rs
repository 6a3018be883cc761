use anyhow::Result;
use settle::commands::{digest, results, run, wait, CommandContext};
use settle::config::Config;
use settle::deadline::CancelToken;

use super::types::{Cli, Commands, WaitCommands};

pub fn dispatch(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;

    let token = CancelToken::new();
    token.cancel_on_interrupt()?;
    let ctx = CommandContext::new(config, token);
    let namespace = cli.namespace.as_deref();

    match cli.command {
        Commands::Run { json, dry_run } => run::execute(&ctx, namespace, json, dry_run),
        Commands::Wait { command } => match command {
            WaitCommands::TaskRun { name, state } => wait::task_run(&ctx, &name, namespace, state),
            WaitCommands::Pod { name, state } => wait::pod(&ctx, &name, namespace, state),
        },
        Commands::Results {
            task_run,
            keys,
            json,
        } => results::execute(&ctx, &task_run, namespace, &keys, json),
        Commands::Digest {
            image,
            expected,
            local,
        } => digest::execute(&ctx, &image, namespace, expected.as_deref(), local),
    }
}
