//! Task and PipelineResource definitions consumed by the build workload.

use serde::{Deserialize, Serialize};

use super::kind::Kind;
use super::meta::ObjectMeta;
use super::pod::Container;
use super::Object;

/// Type of a declarative input/output resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Git,
    Image,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceParam {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResourceSpec {
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    #[serde(default)]
    pub params: Vec<ResourceParam>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResource {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: PipelineResourceSpec,
}

impl PipelineResource {
    fn new(metadata: ObjectMeta, resource_type: ResourceType, params: &[(&str, &str)]) -> Self {
        Self {
            api_version: Kind::PipelineResource.api_version().to_string(),
            kind: Kind::PipelineResource.to_string(),
            metadata,
            spec: PipelineResourceSpec {
                resource_type,
                params: params
                    .iter()
                    .map(|(name, value)| ResourceParam {
                        name: name.to_string(),
                        value: value.to_string(),
                    })
                    .collect(),
            },
        }
    }

    /// A Git source pinned to a revision.
    pub fn git(metadata: ObjectMeta, url: &str, revision: &str) -> Self {
        Self::new(
            metadata,
            ResourceType::Git,
            &[("Url", url), ("Revision", revision)],
        )
    }

    /// An image destination.
    pub fn image(metadata: ObjectMeta, url: &str) -> Self {
        Self::new(metadata, ResourceType::Image, &[("url", url)])
    }

    /// Look up a param by name, case-insensitively (the API accepts both
    /// `Url` and `url`).
    pub fn param(&self, name: &str) -> Option<&str> {
        self.spec
            .params
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| p.value.as_str())
    }
}

impl Object for PipelineResource {
    const KIND: Kind = Kind::PipelineResource;

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }
}

/// A declared input or output slot of a Task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDeclaration {
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskResources {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<ResourceDeclaration>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<ResourceDeclaration>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<TaskResources>,
    /// Executed in order.
    #[serde(default)]
    pub steps: Vec<Container>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sidecars: Vec<Container>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: TaskSpec,
}

impl Task {
    pub fn new(metadata: ObjectMeta, spec: TaskSpec) -> Self {
        Self {
            api_version: Kind::Task.api_version().to_string(),
            kind: Kind::Task.to_string(),
            metadata,
            spec,
        }
    }
}

impl Object for Task {
    const KIND: Kind = Kind::Task;

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }
}
