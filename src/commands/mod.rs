//! Implementations of the CLI subcommands.
//!
//! Each command takes a [`CommandContext`] carrying the loaded config and
//! the run-wide deadline, and reports to the terminal. The pieces that talk
//! to the cluster accept any [`Orchestrator`](crate::client::Orchestrator)
//! so they can run against the in-memory cluster too.

mod context;
pub mod digest;
pub mod results;
pub mod run;
pub mod wait;

pub use context::CommandContext;
