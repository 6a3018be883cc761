use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::identity::Identity;

/// Standard object metadata. Only the fields the verifier reads or sets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

impl ObjectMeta {
    pub fn for_identity(identity: &Identity) -> Self {
        Self {
            name: identity.name.clone(),
            namespace: identity.namespace.clone(),
            ..Default::default()
        }
    }

    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }

    pub fn identity(&self) -> anyhow::Result<Identity> {
        Identity::new(self.namespace.clone(), self.name.clone())
    }
}

/// Tri-state status of a knative-style condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

/// A knative-style status condition (`type`, `status`, `reason`, `message`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCondition {
    #[serde(rename = "type")]
    pub condition_type: String,
    #[serde(default)]
    pub status: ConditionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Type of the condition that reports overall completion.
pub const CONDITION_SUCCEEDED: &str = "Succeeded";

/// Find a condition by type.
pub fn find_condition<'a>(
    conditions: &'a [StatusCondition],
    condition_type: &str,
) -> Option<&'a StatusCondition> {
    conditions
        .iter()
        .find(|c| c.condition_type == condition_type)
}
