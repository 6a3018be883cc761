//! Errors surfaced to callers of the verifier.
//!
//! "Not ready yet" never appears here: the poller absorbs it. Everything
//! else propagates unmodified, carrying enough context (identity, condition
//! description, last observed state) to diagnose without re-querying.

use thiserror::Error;

use crate::client::ApiError;
use crate::models::Identity;

#[derive(Debug, Error)]
pub enum SettleError {
    /// The watched object reached a terminal failure state.
    #[error("{identity}: {description}: {reason}")]
    ConditionFailed {
        identity: Identity,
        description: String,
        reason: String,
    },

    /// The deadline passed while the object was still not ready.
    #[error("{identity}: timed out waiting for {description} after {attempts} polls (last state: {last_state})")]
    Timeout {
        identity: Identity,
        description: String,
        last_state: String,
        attempts: u32,
    },

    /// The wait was cancelled from outside.
    #[error("{identity}: cancelled while waiting for {description}")]
    Cancelled {
        identity: Identity,
        description: String,
    },

    /// Required result entries are absent from a successful workload.
    #[error("{identity}: missing result {}", keys.join(", "))]
    MissingResult { identity: Identity, keys: Vec<String> },

    /// A result entry does not say which resource produced it.
    #[error("{identity}: result {key:?} has no resource reference")]
    MissingReference { identity: Identity, key: String },

    /// Two systems disagree about a value.
    #[error("verification mismatch: expected {expected:?}, got {actual:?}")]
    VerificationMismatch { expected: String, actual: String },

    /// The probe produced nothing to compare against.
    #[error("{probe}: probe produced no output")]
    EmptyProbeOutput { probe: Identity },

    /// The probe exited unsuccessfully and strict mode is on.
    #[error("{probe}: probe failed, output: {output:?}")]
    ProbeFailed { probe: Identity, output: String },

    /// A local probe process could not be started or observed.
    #[error("{probe}: failed to run probe: {message}")]
    ProbeLaunch { probe: Identity, message: String },

    /// The orchestration API call itself failed.
    #[error(transparent)]
    Api(ApiError),
}

impl From<ApiError> for SettleError {
    /// An interrupted call is a timeout or a cancellation, never an API failure.
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Interrupted {
                operation,
                kind,
                identity,
                cancelled: true,
            } => SettleError::Cancelled {
                identity,
                description: format!("{kind} {operation}"),
            },
            ApiError::Interrupted {
                operation,
                kind,
                identity,
                cancelled: false,
            } => SettleError::Timeout {
                identity,
                description: format!("{kind} {operation}"),
                last_state: "request not completed".to_string(),
                attempts: 0,
            },
            other => SettleError::Api(other),
        }
    }
}

impl SettleError {
    /// The first missing key, for single-key diagnostics.
    pub fn missing_key(&self) -> Option<&str> {
        match self {
            SettleError::MissingResult { keys, .. } => keys.first().map(String::as_str),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, SettleError::Timeout { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SettleError::Cancelled { .. })
    }
}

pub type Result<T> = std::result::Result<T, SettleError>;
