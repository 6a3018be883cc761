//! Poll engine: read an object until a condition settles it.
//!
//! State machine for one wait:
//!
//! - `Pending` → `Pending` (condition not satisfied yet, time remains)
//! - `Pending` → `Satisfied` (condition satisfied), terminal
//! - `Pending` → `Failed` (condition reports terminal failure), terminal
//! - `Pending` → `TimedOut` / `Cancelled` (deadline elapsed or cancelled), terminal
//!
//! Guarantees:
//! - no read is issued after a terminal outcome;
//! - no outcome is derived from a snapshot that arrived after the deadline;
//! - the loop sleeps between reads and wakes immediately on cancellation.

pub mod backoff;

use std::time::{Duration, Instant};

use crate::client::{get_as, ApiError, Orchestrator};
use crate::conditions::{Condition, Verdict};
use crate::deadline::Deadline;
use crate::error::SettleError;
use crate::models::{Identity, Object, StateSummary};

pub use backoff::{calculate_backoff, MIN_INTERVAL};

/// Default delay before the second read.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Default cap on the delay between reads.
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(5);

/// Interval policy for the poller.
#[derive(Debug, Clone)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_interval: Duration,
    /// Per-wait limit, applied on top of the caller's deadline.
    pub timeout: Option<Duration>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            max_interval: DEFAULT_MAX_INTERVAL,
            timeout: None,
        }
    }
}

impl PollConfig {
    /// Fixed interval, no growth.
    pub fn fixed(interval: Duration) -> Self {
        Self {
            interval,
            max_interval: interval,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Terminal outcome of a wait.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Satisfied(T),
    Failed { reason: String, last: Option<T> },
    TimedOut { last: Option<T> },
    Cancelled { last: Option<T> },
}

impl<T> Outcome<T> {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Outcome::Satisfied(_))
    }

    /// Short name of the outcome for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Satisfied(_) => "satisfied",
            Outcome::Failed { .. } => "failed",
            Outcome::TimedOut { .. } => "timed-out",
            Outcome::Cancelled { .. } => "cancelled",
        }
    }
}

/// An outcome plus the bookkeeping of how it was reached.
#[derive(Debug, Clone)]
pub struct Polled<T> {
    pub outcome: Outcome<T>,
    pub attempts: u32,
    pub elapsed: Duration,
}

impl<T: StateSummary> Polled<T> {
    /// Convert into a result, attaching identity and description to errors.
    pub fn into_result(self, identity: &Identity, description: &str) -> Result<T, SettleError> {
        match self.outcome {
            Outcome::Satisfied(snapshot) => Ok(snapshot),
            Outcome::Failed { reason, .. } => Err(SettleError::ConditionFailed {
                identity: identity.clone(),
                description: description.to_string(),
                reason,
            }),
            Outcome::TimedOut { last } => Err(SettleError::Timeout {
                identity: identity.clone(),
                description: description.to_string(),
                last_state: last
                    .map(|s| s.state_summary())
                    .unwrap_or_else(|| "never observed".to_string()),
                attempts: self.attempts,
            }),
            Outcome::Cancelled { .. } => Err(SettleError::Cancelled {
                identity: identity.clone(),
                description: description.to_string(),
            }),
        }
    }
}

/// Repeatedly fetches a snapshot and applies a condition to it.
#[derive(Debug, Clone, Default)]
pub struct Poller {
    config: PollConfig,
}

impl Poller {
    pub fn new(config: PollConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Poll `fetch` until `condition` settles or `deadline` runs out.
    ///
    /// `NotFound` reads count as "not yet satisfied". `Gone` reads end the
    /// wait as `Failed`. Any other API error is returned as-is.
    pub fn poll<T, F>(
        &self,
        mut fetch: F,
        condition: &Condition<T>,
        deadline: &Deadline,
    ) -> Result<Polled<T>, ApiError>
    where
        T: StateSummary,
        F: FnMut(&Deadline) -> Result<T, ApiError>,
    {
        let deadline = match self.config.timeout {
            Some(timeout) => deadline.child(timeout),
            None => deadline.clone(),
        };
        let start = Instant::now();
        let mut attempts: u32 = 0;
        let mut last: Option<T> = None;

        let finish = |outcome: Outcome<T>, attempts: u32| Polled {
            outcome,
            attempts,
            elapsed: start.elapsed(),
        };

        loop {
            if deadline.is_done() {
                return Ok(finish(expired(&deadline, last), attempts));
            }

            attempts += 1;
            let fetched = fetch(&deadline);

            // A snapshot that arrives after the deadline settles nothing.
            if deadline.is_done() {
                return Ok(finish(expired(&deadline, last), attempts));
            }

            match fetched {
                Ok(snapshot) => match condition.check(&snapshot) {
                    Verdict::Satisfied => {
                        return Ok(finish(Outcome::Satisfied(snapshot), attempts));
                    }
                    Verdict::Failed(reason) => {
                        return Ok(finish(
                            Outcome::Failed {
                                reason,
                                last: Some(snapshot),
                            },
                            attempts,
                        ));
                    }
                    Verdict::Pending => {
                        tracing::debug!(
                            condition = condition.name(),
                            attempt = attempts,
                            state = %snapshot.state_summary(),
                            "not yet satisfied"
                        );
                        last = Some(snapshot);
                    }
                },
                Err(e) if e.is_not_found() => {
                    tracing::debug!(
                        condition = condition.name(),
                        attempt = attempts,
                        "object not visible yet"
                    );
                }
                Err(e) if e.is_gone() => {
                    return Ok(finish(
                        Outcome::Failed {
                            reason: e.to_string(),
                            last,
                        },
                        attempts,
                    ));
                }
                Err(e) => return Err(e),
            }

            let delay = calculate_backoff(attempts, self.config.interval, self.config.max_interval);
            if !deadline.sleep(delay) {
                return Ok(finish(expired(&deadline, last), attempts));
            }
        }
    }
}

fn expired<T>(deadline: &Deadline, last: Option<T>) -> Outcome<T> {
    if deadline.is_cancelled() {
        Outcome::Cancelled { last }
    } else {
        Outcome::TimedOut { last }
    }
}

/// Wait for a typed object to satisfy a condition.
///
/// `description` names what is being waited for in logs and errors
/// (e.g. `TaskRunCompleted`).
pub fn wait_for<T>(
    client: &dyn Orchestrator,
    poller: &Poller,
    identity: &Identity,
    condition: &Condition<T>,
    description: &str,
    deadline: &Deadline,
) -> Result<T, SettleError>
where
    T: Object + StateSummary,
{
    tracing::info!(
        kind = %T::KIND,
        identity = %identity,
        condition = condition.name(),
        "waiting for {description}"
    );

    let polled = poller.poll(|d| get_as::<T>(client, identity, d), condition, deadline)?;

    match &polled.outcome {
        Outcome::Satisfied(_) => tracing::info!(
            identity = %identity,
            attempts = polled.attempts,
            elapsed_ms = polled.elapsed.as_millis() as u64,
            "{description} satisfied"
        ),
        other => tracing::warn!(
            identity = %identity,
            attempts = polled.attempts,
            outcome = other.label(),
            "{description} not satisfied"
        ),
    }

    polled.into_result(identity, description)
}

/// Wait for a TaskRun to satisfy a condition.
pub fn wait_for_task_run_state(
    client: &dyn Orchestrator,
    poller: &Poller,
    identity: &Identity,
    condition: &Condition<crate::models::TaskRun>,
    description: &str,
    deadline: &Deadline,
) -> Result<crate::models::TaskRun, SettleError> {
    wait_for(client, poller, identity, condition, description, deadline)
}

/// Wait for a Pod to satisfy a condition.
pub fn wait_for_pod_state(
    client: &dyn Orchestrator,
    poller: &Poller,
    identity: &Identity,
    condition: &Condition<crate::models::Pod>,
    description: &str,
    deadline: &Deadline,
) -> Result<crate::models::Pod, SettleError> {
    wait_for(client, poller, identity, condition, description, deadline)
}
