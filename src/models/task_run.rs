//! TaskRun objects: the primary workload whose outcome gets verified.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::kind::Kind;
use super::meta::{find_condition, ObjectMeta, StatusCondition, CONDITION_SUCCEEDED};
use super::{Object, StateSummary};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRun {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: TaskRunSpec,
    #[serde(default)]
    pub status: TaskRunStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRunSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_ref: Option<TaskRef>,
    /// Go duration string, e.g. `120s`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<TaskRunResources>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskRef {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskRunResources {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<ResourceBinding>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<ResourceBinding>,
}

/// Binds a Task's declared resource name to a concrete PipelineResource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceBinding {
    pub name: String,
    pub resource_ref: ResourceRef,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRunStatus {
    #[serde(default)]
    pub conditions: Vec<StatusCondition>,
    #[serde(default)]
    pub resources_result: Vec<ResultEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_name: Option<String>,
}

/// A key/value fact reported by a completed TaskRun, attributed to the
/// resource that produced it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultEntry {
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_ref: Option<ResourceRef>,
}

impl ResultEntry {
    pub fn new(key: &str, value: &str, resource: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
            resource_ref: Some(ResourceRef {
                name: resource.to_string(),
            }),
        }
    }

    /// Name of the referenced resource, if one is set and non-empty.
    pub fn reference(&self) -> Option<&str> {
        self.resource_ref
            .as_ref()
            .map(|r| r.name.as_str())
            .filter(|name| !name.is_empty())
    }
}

impl TaskRun {
    pub fn new(metadata: ObjectMeta, spec: TaskRunSpec) -> Self {
        Self {
            api_version: Kind::TaskRun.api_version().to_string(),
            kind: Kind::TaskRun.to_string(),
            metadata,
            spec,
            status: TaskRunStatus::default(),
        }
    }

    /// The `Succeeded` condition, if the controller has reported one.
    pub fn succeeded_condition(&self) -> Option<&StatusCondition> {
        find_condition(&self.status.conditions, CONDITION_SUCCEEDED)
    }
}

impl Object for TaskRun {
    const KIND: Kind = Kind::TaskRun;

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }
}

impl StateSummary for TaskRun {
    fn state_summary(&self) -> String {
        match self.succeeded_condition() {
            Some(cond) => {
                let mut summary = format!("Succeeded={:?}", cond.status);
                if let Some(reason) = &cond.reason {
                    summary.push_str(&format!(" reason={reason}"));
                }
                if let Some(message) = &cond.message {
                    summary.push_str(&format!(" message={message:?}"));
                }
                summary
            }
            None => "no Succeeded condition reported".to_string(),
        }
    }
}

/// Format a duration the way the API server's duration fields accept it.
pub fn format_timeout(timeout: Duration) -> String {
    format!("{}s", timeout.as_secs())
}
