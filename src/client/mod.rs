//! Orchestration API collaborator.
//!
//! The verifier only ever creates objects, reads them back, and fetches pod
//! logs. [`Orchestrator`] captures exactly that surface so the poller and the
//! verifier can run against the real API server ([`KubeClient`]) or a
//! scripted fake ([`InMemoryCluster`]).

pub mod kube;
pub mod memory;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::deadline::Deadline;
use crate::models::{Identity, Kind, Object};

pub use kube::{ClusterConfig, KubeClient};
pub use memory::InMemoryCluster;

/// Errors returned by the orchestration API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The object does not exist (yet).
    #[error("{kind} {identity} not found")]
    NotFound { kind: Kind, identity: Identity },

    /// The object, or its namespace, is gone and will not come back.
    #[error("{kind} {identity} is gone: {message}")]
    Gone {
        kind: Kind,
        identity: Identity,
        message: String,
    },

    /// The server answered with a non-success status other than 404/410.
    #[error("{method} {url} returned {code}: {body}")]
    Status {
        method: &'static str,
        url: String,
        code: u16,
        body: String,
    },

    /// The request never got a response.
    #[error("{method} {url} failed: {message}")]
    Transport {
        method: &'static str,
        url: String,
        message: String,
    },

    /// The response body did not have the expected shape.
    #[error("failed to decode {kind} {identity}: {source}")]
    Decode {
        kind: Kind,
        identity: Identity,
        #[source]
        source: serde_json::Error,
    },

    /// The object handed to `create` cannot be submitted.
    #[error("cannot create {kind}: {message}")]
    InvalidObject { kind: Kind, message: String },

    /// An object with this identity already exists.
    #[error("{kind} {identity} already exists")]
    AlreadyExists { kind: Kind, identity: Identity },

    /// The deadline ran out, or was cancelled, before the call completed.
    #[error("{kind} {operation} for {identity} interrupted: {}", interruption(.cancelled))]
    Interrupted {
        operation: &'static str,
        kind: Kind,
        identity: Identity,
        cancelled: bool,
    },
}

fn interruption(cancelled: &bool) -> &'static str {
    if *cancelled {
        "cancelled"
    } else {
        "deadline exceeded"
    }
}

impl ApiError {
    /// Transient "not yet visible" errors that polling should ride out.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }

    /// Errors meaning the object will never appear.
    pub fn is_gone(&self) -> bool {
        matches!(self, ApiError::Gone { .. })
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, ApiError::Interrupted { .. })
    }

    /// The error for a call cut short by `deadline`.
    pub fn interrupted(
        operation: &'static str,
        kind: Kind,
        identity: &Identity,
        deadline: &Deadline,
    ) -> Self {
        ApiError::Interrupted {
            operation,
            kind,
            identity: identity.clone(),
            cancelled: deadline.is_cancelled(),
        }
    }
}

/// Operation names carried by [`ApiError::Interrupted`].
pub const OP_CREATE: &str = "creation";
pub const OP_READ: &str = "read";
pub const OP_LOGS: &str = "log retrieval";

/// Fail fast when `deadline` is already done, before issuing a call.
pub fn ensure_live(
    operation: &'static str,
    kind: Kind,
    identity: &Identity,
    deadline: &Deadline,
) -> Result<(), ApiError> {
    if deadline.is_done() {
        return Err(ApiError::interrupted(operation, kind, identity, deadline));
    }
    Ok(())
}

/// The subset of the orchestration API the verifier consumes.
pub trait Orchestrator: Send + Sync {
    /// Create an object and return the server's view of it.
    fn create(&self, kind: Kind, object: &Value, deadline: &Deadline) -> Result<Value, ApiError>;

    /// Read the current snapshot of an object.
    fn get(&self, kind: Kind, identity: &Identity, deadline: &Deadline)
        -> Result<Value, ApiError>;

    /// Read the log of one container in a pod.
    fn logs(
        &self,
        pod: &Identity,
        container: &str,
        deadline: &Deadline,
    ) -> Result<String, ApiError>;
}

/// Read an object and decode it into its typed form.
pub fn get_as<T: Object>(
    client: &dyn Orchestrator,
    identity: &Identity,
    deadline: &Deadline,
) -> Result<T, ApiError> {
    let value = client.get(T::KIND, identity, deadline)?;
    decode(T::KIND, identity, value)
}

/// Encode and create a typed object.
pub fn create_as<T: Object>(
    client: &dyn Orchestrator,
    object: &T,
    deadline: &Deadline,
) -> Result<T, ApiError> {
    let identity = object
        .metadata()
        .identity()
        .map_err(|e| ApiError::InvalidObject {
            kind: T::KIND,
            message: e.to_string(),
        })?;
    let body = serde_json::to_value(object).map_err(|e| ApiError::InvalidObject {
        kind: T::KIND,
        message: e.to_string(),
    })?;
    let created = client.create(T::KIND, &body, deadline)?;
    decode(T::KIND, &identity, created)
}

fn decode<T: DeserializeOwned>(kind: Kind, identity: &Identity, value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|source| ApiError::Decode {
        kind,
        identity: identity.clone(),
        source,
    })
}
