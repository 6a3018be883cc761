//! Condition predicates evaluated by the poller on every snapshot.
//!
//! A condition is a pure function of one snapshot. It holds no state between
//! polls, so the same condition can be reused across waits.

use crate::models::{ConditionStatus, Pod, PodPhase, TaskRun};

/// Reason the controller reports while a TaskRun is executing.
pub const REASON_RUNNING: &str = "Running";

/// Reason the controller reports before the TaskRun's pod starts.
pub const REASON_PENDING: &str = "Pending";

/// Result of evaluating a condition against one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Not there yet; keep polling.
    Pending,
    /// The condition holds; stop polling.
    Satisfied,
    /// The object reached a state from which the condition can never hold.
    Failed(String),
}

/// A named predicate over snapshots of type `T`.
pub struct Condition<T> {
    name: String,
    check: Box<dyn Fn(&T) -> Verdict + Send + Sync>,
}

impl<T> Condition<T> {
    pub fn new(
        name: impl Into<String>,
        check: impl Fn(&T) -> Verdict + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            check: Box::new(check),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn check(&self, snapshot: &T) -> Verdict {
        (self.check)(snapshot)
    }
}

impl<T> std::fmt::Debug for Condition<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Condition").field("name", &self.name).finish()
    }
}

fn reason_suffix(tr: &TaskRun) -> String {
    let Some(cond) = tr.succeeded_condition() else {
        return String::new();
    };
    match (&cond.reason, &cond.message) {
        (Some(reason), Some(message)) => format!(": {reason}: {message}"),
        (Some(reason), None) => format!(": {reason}"),
        (None, Some(message)) => format!(": {message}"),
        (None, None) => String::new(),
    }
}

/// The TaskRun finished successfully. Terminal failure if it failed.
pub fn succeed(name: &str) -> Condition<TaskRun> {
    let name = name.to_string();
    Condition::new(format!("Succeed({name})"), move |tr: &TaskRun| {
        match tr.succeeded_condition().map(|c| c.status) {
            Some(ConditionStatus::True) => Verdict::Satisfied,
            Some(ConditionStatus::False) => {
                Verdict::Failed(format!("{name:?} failed{}", reason_suffix(tr)))
            }
            _ => Verdict::Pending,
        }
    })
}

/// The TaskRun has started. Terminal failure if it already finished.
pub fn running(name: &str) -> Condition<TaskRun> {
    let name = name.to_string();
    Condition::new(format!("Running({name})"), move |tr: &TaskRun| {
        let Some(cond) = tr.succeeded_condition() else {
            return Verdict::Pending;
        };
        match cond.status {
            ConditionStatus::True | ConditionStatus::False => {
                Verdict::Failed(format!("{name:?} already finished"))
            }
            ConditionStatus::Unknown => match cond.reason.as_deref() {
                Some(REASON_RUNNING) | Some(REASON_PENDING) => Verdict::Satisfied,
                _ => Verdict::Pending,
            },
        }
    })
}

/// The TaskRun failed. Terminal failure if it unexpectedly succeeded.
pub fn failed(name: &str) -> Condition<TaskRun> {
    let name = name.to_string();
    Condition::new(format!("Failed({name})"), move |tr: &TaskRun| {
        match tr.succeeded_condition().map(|c| c.status) {
            Some(ConditionStatus::False) => Verdict::Satisfied,
            Some(ConditionStatus::True) => Verdict::Failed(format!("{name:?} succeeded")),
            _ => Verdict::Pending,
        }
    })
}

/// The TaskRun failed with a specific reason.
pub fn failed_with_reason(reason: &str, name: &str) -> Condition<TaskRun> {
    let name = name.to_string();
    let reason = reason.to_string();
    Condition::new(
        format!("FailedWithReason({reason}, {name})"),
        move |tr: &TaskRun| {
            let Some(cond) = tr.succeeded_condition() else {
                return Verdict::Pending;
            };
            match cond.status {
                ConditionStatus::False if cond.reason.as_deref() == Some(reason.as_str()) => {
                    Verdict::Satisfied
                }
                ConditionStatus::False => Verdict::Failed(format!(
                    "{name:?} failed with reason {:?}, expected {reason:?}",
                    cond.reason.as_deref().unwrap_or_default()
                )),
                ConditionStatus::True => Verdict::Failed(format!("{name:?} succeeded")),
                ConditionStatus::Unknown => Verdict::Pending,
            }
        },
    )
}

/// Every container in the pod exited, successfully or not.
///
/// A `Failed` phase still satisfies this condition: callers that read the
/// pod's output inspect it regardless of exit status.
pub fn pod_terminated(name: &str) -> Condition<Pod> {
    Condition::new(format!("PodTerminated({name})"), |pod: &Pod| {
        if pod.status.phase.is_terminal() {
            Verdict::Satisfied
        } else {
            Verdict::Pending
        }
    })
}

/// The pod is running. Terminal failure if it already exited.
pub fn pod_running(name: &str) -> Condition<Pod> {
    let name = name.to_string();
    Condition::new(format!("PodRunning({name})"), move |pod: &Pod| {
        match pod.status.phase {
            PodPhase::Running => Verdict::Satisfied,
            PodPhase::Succeeded | PodPhase::Failed => Verdict::Failed(format!(
                "pod {name:?} already finished with phase {}",
                pod.status.phase
            )),
            PodPhase::Pending | PodPhase::Unknown => Verdict::Pending,
        }
    })
}
