//! End-to-end tests for settle
//!
//! Drive the full create → wait → extract → probe → compare flow against a
//! scripted in-memory cluster.

pub mod cancellation;
pub mod fixtures;
pub mod helpers;
pub mod poller;
pub mod scenario;

pub use fixtures::*;
pub use helpers::*;
