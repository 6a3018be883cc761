pub mod client;
pub mod commands;
pub mod conditions;
pub mod config;
pub mod deadline;
pub mod error;
pub mod logging;
pub mod models;
pub mod poll;
pub mod probe;
pub mod results;
pub mod scenario;
pub mod verifier;

pub use error::SettleError;
