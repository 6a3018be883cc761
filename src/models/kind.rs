use serde::{Deserialize, Serialize};

/// Object kinds the verifier creates or reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Kind {
    PipelineResource,
    Task,
    TaskRun,
    Pod,
}

impl Kind {
    /// API group path, relative to the server root.
    pub fn api_path(&self) -> &'static str {
        match self {
            Kind::PipelineResource => "apis/tekton.dev/v1alpha1",
            Kind::Task | Kind::TaskRun => "apis/tekton.dev/v1beta1",
            Kind::Pod => "api/v1",
        }
    }

    /// Value of the `apiVersion` field for objects of this kind.
    pub fn api_version(&self) -> &'static str {
        match self {
            Kind::PipelineResource => "tekton.dev/v1alpha1",
            Kind::Task | Kind::TaskRun => "tekton.dev/v1beta1",
            Kind::Pod => "v1",
        }
    }

    /// Lowercase plural used in REST paths.
    pub fn plural(&self) -> &'static str {
        match self {
            Kind::PipelineResource => "pipelineresources",
            Kind::Task => "tasks",
            Kind::TaskRun => "taskruns",
            Kind::Pod => "pods",
        }
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Kind::PipelineResource => write!(f, "PipelineResource"),
            Kind::Task => write!(f, "Task"),
            Kind::TaskRun => write!(f, "TaskRun"),
            Kind::Pod => write!(f, "Pod"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_paths() {
        assert_eq!(Kind::TaskRun.api_path(), "apis/tekton.dev/v1beta1");
        assert_eq!(Kind::TaskRun.plural(), "taskruns");
        assert_eq!(Kind::Pod.api_path(), "api/v1");
        assert_eq!(Kind::PipelineResource.api_version(), "tekton.dev/v1alpha1");
    }
}
