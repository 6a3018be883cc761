//! Scripted in-memory orchestrator.
//!
//! Stands in for the API server in tests and dry runs. Objects move through
//! a scripted sequence of `status` values, one per read, and stay on the last
//! one. Every read is counted so callers can assert that polling stopped.

use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use super::{ensure_live, ApiError, Orchestrator, OP_CREATE, OP_LOGS, OP_READ};
use crate::deadline::Deadline;
use crate::models::{Identity, Kind};

#[derive(Debug)]
struct Stored {
    object: Value,
    statuses: Vec<Value>,
    cursor: usize,
    hidden_reads: usize,
}

impl Stored {
    fn next_snapshot(&mut self) -> Value {
        let mut snapshot = self.object.clone();
        if !self.statuses.is_empty() {
            let index = self.cursor.min(self.statuses.len() - 1);
            snapshot["status"] = self.statuses[index].clone();
            self.cursor += 1;
        }
        snapshot
    }
}

#[derive(Debug, Default)]
struct ClusterState {
    objects: BTreeMap<(Kind, Identity), Stored>,
    pending_scripts: HashMap<(Kind, Identity), Vec<Value>>,
    kind_scripts: HashMap<Kind, Vec<Value>>,
    hidden_after_create: HashMap<Kind, usize>,
    failing_kinds: HashMap<Kind, u16>,
    pod_logs: HashMap<(Identity, String), String>,
    container_logs: HashMap<String, String>,
    terminating: HashSet<String>,
    reads: HashMap<(Kind, Identity), usize>,
    created: Vec<(Kind, Identity)>,
    log_reads: usize,
    read_delay: Duration,
}

/// In-memory [`Orchestrator`] with scripted status progressions.
#[derive(Debug, Default)]
pub struct InMemoryCluster {
    state: Mutex<ClusterState>,
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ClusterState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Store an object as if it had been created earlier.
    pub fn insert(&self, kind: Kind, identity: &Identity, object: Value) {
        let mut state = self.state();
        let statuses = state
            .pending_scripts
            .remove(&(kind, identity.clone()))
            .unwrap_or_default();
        state.objects.insert(
            (kind, identity.clone()),
            Stored {
                object,
                statuses,
                cursor: 0,
                hidden_reads: 0,
            },
        );
    }

    /// Script the `status` values returned by successive reads of one object.
    ///
    /// Applies to an existing object, or to the object once it is created.
    pub fn script_status(&self, kind: Kind, identity: &Identity, statuses: Vec<Value>) {
        let mut state = self.state();
        match state.objects.get_mut(&(kind, identity.clone())) {
            Some(stored) => {
                stored.statuses = statuses;
                stored.cursor = 0;
            }
            None => {
                state
                    .pending_scripts
                    .insert((kind, identity.clone()), statuses);
            }
        }
    }

    /// Script the `status` progression of every object of `kind` created
    /// without a per-object script. Used for objects with generated names.
    pub fn script_created(&self, kind: Kind, statuses: Vec<Value>) {
        self.state().kind_scripts.insert(kind, statuses);
    }

    /// Report newly created objects of `kind` as not found for `reads` reads.
    pub fn hide_after_create(&self, kind: Kind, reads: usize) {
        self.state().hidden_after_create.insert(kind, reads);
    }

    /// Answer every read of `kind` with the given HTTP status.
    pub fn fail_reads(&self, kind: Kind, code: u16) {
        self.state().failing_kinds.insert(kind, code);
    }

    /// Mark a namespace as terminating: nothing in it will ever appear.
    pub fn terminate_namespace(&self, namespace: &str) {
        self.state().terminating.insert(namespace.to_string());
    }

    /// Make every read take this long, like a slow API server.
    pub fn set_read_delay(&self, delay: Duration) {
        self.state().read_delay = delay;
    }

    /// Log text for one container of one pod.
    pub fn set_pod_logs(&self, pod: &Identity, container: &str, text: &str) {
        self.state()
            .pod_logs
            .insert((pod.clone(), container.to_string()), text.to_string());
    }

    /// Log text for a container name in any pod.
    pub fn set_container_logs(&self, container: &str, text: &str) {
        self.state()
            .container_logs
            .insert(container.to_string(), text.to_string());
    }

    /// Number of reads issued for one object.
    pub fn reads(&self, kind: Kind, identity: &Identity) -> usize {
        self.state()
            .reads
            .get(&(kind, identity.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// Number of reads issued for all objects of a kind.
    pub fn total_reads(&self, kind: Kind) -> usize {
        self.state()
            .reads
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|(_, n)| n)
            .sum()
    }

    pub fn log_reads(&self) -> usize {
        self.state().log_reads
    }

    /// Identities created so far, in creation order.
    pub fn created(&self, kind: Kind) -> Vec<Identity> {
        self.state()
            .created
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, id)| id.clone())
            .collect()
    }

    /// Kinds created so far, in creation order.
    pub fn creation_order(&self) -> Vec<Kind> {
        self.state().created.iter().map(|(k, _)| *k).collect()
    }

    /// The stored object as created, without scripted status.
    pub fn object(&self, kind: Kind, identity: &Identity) -> Option<Value> {
        self.state()
            .objects
            .get(&(kind, identity.clone()))
            .map(|s| s.object.clone())
    }
}

fn identity_of(kind: Kind, object: &Value) -> Result<Identity, ApiError> {
    let namespace = object["metadata"]["namespace"].as_str().unwrap_or_default();
    let name = object["metadata"]["name"].as_str().unwrap_or_default();
    Identity::new(namespace, name).map_err(|e| ApiError::InvalidObject {
        kind,
        message: e.to_string(),
    })
}

impl Orchestrator for InMemoryCluster {
    fn create(&self, kind: Kind, object: &Value, deadline: &Deadline) -> Result<Value, ApiError> {
        let identity = identity_of(kind, object)?;
        ensure_live(OP_CREATE, kind, &identity, deadline)?;
        let mut state = self.state();

        if state.terminating.contains(&identity.namespace) {
            return Err(ApiError::Gone {
                message: format!(
                    "unable to create new content in namespace {} because it is being terminated",
                    identity.namespace
                ),
                kind,
                identity,
            });
        }
        let key = (kind, identity.clone());
        if state.objects.contains_key(&key) {
            return Err(ApiError::AlreadyExists { kind, identity });
        }

        let mut stored = object.clone();
        stored["metadata"]["uid"] = Value::String(uuid::Uuid::new_v4().to_string());

        let scripted = state.pending_scripts.remove(&key);
        let statuses = match scripted {
            Some(statuses) => statuses,
            None => state.kind_scripts.get(&kind).cloned().unwrap_or_default(),
        };
        let hidden_reads = state.hidden_after_create.get(&kind).copied().unwrap_or(0);

        state.objects.insert(
            key,
            Stored {
                object: stored.clone(),
                statuses,
                cursor: 0,
                hidden_reads,
            },
        );
        state.created.push((kind, identity));

        Ok(stored)
    }

    fn get(
        &self,
        kind: Kind,
        identity: &Identity,
        deadline: &Deadline,
    ) -> Result<Value, ApiError> {
        let delay = {
            let mut state = self.state();
            *state.reads.entry((kind, identity.clone())).or_insert(0) += 1;
            state.read_delay
        };

        if !delay.is_zero() {
            if delay > deadline.remaining() {
                deadline.sleep(deadline.remaining());
                return Err(ApiError::interrupted(OP_READ, kind, identity, deadline));
            }
            thread::sleep(delay);
        }

        let mut state = self.state();

        if let Some(code) = state.failing_kinds.get(&kind) {
            return Err(ApiError::Status {
                method: "GET",
                url: format!("memory://{kind}/{identity}"),
                code: *code,
                body: "injected failure".to_string(),
            });
        }
        if state.terminating.contains(&identity.namespace) {
            return Err(ApiError::Gone {
                kind,
                identity: identity.clone(),
                message: format!("namespace {} is terminating", identity.namespace),
            });
        }

        match state.objects.get_mut(&(kind, identity.clone())) {
            Some(stored) if stored.hidden_reads > 0 => {
                stored.hidden_reads -= 1;
                Err(ApiError::NotFound {
                    kind,
                    identity: identity.clone(),
                })
            }
            Some(stored) => Ok(stored.next_snapshot()),
            None => Err(ApiError::NotFound {
                kind,
                identity: identity.clone(),
            }),
        }
    }

    fn logs(
        &self,
        pod: &Identity,
        container: &str,
        deadline: &Deadline,
    ) -> Result<String, ApiError> {
        ensure_live(OP_LOGS, Kind::Pod, pod, deadline)?;
        let mut state = self.state();
        state.log_reads += 1;

        if !state.objects.contains_key(&(Kind::Pod, pod.clone())) {
            return Err(ApiError::NotFound {
                kind: Kind::Pod,
                identity: pod.clone(),
            });
        }

        let text = state
            .pod_logs
            .get(&(pod.clone(), container.to_string()))
            .or_else(|| state.container_logs.get(container))
            .cloned()
            .unwrap_or_default();
        Ok(text)
    }
}
