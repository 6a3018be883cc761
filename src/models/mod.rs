pub mod identity;
pub mod kind;
pub mod meta;
pub mod pod;
pub mod task;
pub mod task_run;

use serde::de::DeserializeOwned;
use serde::Serialize;

pub use identity::{clap_name_validator, validate_name, Identity};
pub use kind::Kind;
pub use meta::{ConditionStatus, ObjectMeta, StatusCondition, CONDITION_SUCCEEDED};
pub use pod::{Container, Pod, PodPhase, PodSpec, PodStatus};
pub use task::{PipelineResource, ResourceDeclaration, ResourceType, Task, TaskResources, TaskSpec};
pub use task_run::{
    format_timeout, ResourceBinding, ResourceRef, ResultEntry, TaskRef, TaskRun, TaskRunResources,
    TaskRunSpec, TaskRunStatus,
};

/// A typed API object with a fixed kind.
pub trait Object: Serialize + DeserializeOwned {
    const KIND: Kind;

    fn metadata(&self) -> &ObjectMeta;
}

/// One-line description of an object's observed state, used in timeout
/// diagnostics so callers don't have to re-query the cluster.
pub trait StateSummary {
    fn state_summary(&self) -> String;
}
