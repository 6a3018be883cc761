//! Orchestrator backed by the Kubernetes REST API.

use anyhow::{Context, Result};
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

use super::{ensure_live, ApiError, Orchestrator, OP_CREATE, OP_LOGS, OP_READ};
use crate::deadline::Deadline;
use crate::models::{Identity, Kind};

/// Default API server address when running inside a cluster.
pub const IN_CLUSTER_SERVER: &str = "https://kubernetes.default.svc";

/// Service account token mounted into every pod.
pub const IN_CLUSTER_TOKEN_FILE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// Service account CA bundle mounted into every pod.
pub const IN_CLUSTER_CA_FILE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";

/// Connection settings for the API server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub server: String,
    pub token_file: Option<PathBuf>,
    /// Inline bearer token; takes precedence over `token_file`.
    #[serde(skip_serializing)]
    pub token: Option<String>,
    pub ca_file: Option<PathBuf>,
    /// Skip TLS verification (local test clusters only).
    pub insecure: bool,
    /// Upper bound for a single request. Always clamped to the deadline.
    pub request_timeout_secs: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            server: IN_CLUSTER_SERVER.to_string(),
            token_file: Some(PathBuf::from(IN_CLUSTER_TOKEN_FILE)),
            token: None,
            ca_file: Some(PathBuf::from(IN_CLUSTER_CA_FILE)),
            insecure: false,
            request_timeout_secs: 30,
        }
    }
}

/// Blocking Kubernetes API client.
pub struct KubeClient {
    http: Client,
    server: String,
    token: Option<String>,
    request_timeout: Duration,
}

impl KubeClient {
    pub fn new(config: &ClusterConfig) -> Result<Self> {
        let mut builder = Client::builder().danger_accept_invalid_certs(config.insecure);

        if let Some(ca_file) = config.ca_file.as_ref().filter(|p| p.exists()) {
            let pem = std::fs::read(ca_file)
                .with_context(|| format!("Failed to read CA bundle: {}", ca_file.display()))?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .with_context(|| format!("Invalid CA bundle: {}", ca_file.display()))?;
            builder = builder.add_root_certificate(cert);
        }

        let token = match (&config.token, &config.token_file) {
            (Some(token), _) => Some(token.trim().to_string()),
            (None, Some(path)) if path.exists() => Some(
                std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read token file: {}", path.display()))?
                    .trim()
                    .to_string(),
            ),
            _ => None,
        };

        let http = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            server: config.server.trim_end_matches('/').to_string(),
            token,
            request_timeout: Duration::from_secs(config.request_timeout_secs.max(1)),
        })
    }

    fn collection_url(&self, kind: Kind, namespace: &str) -> String {
        format!(
            "{}/{}/namespaces/{}/{}",
            self.server,
            kind.api_path(),
            namespace,
            kind.plural()
        )
    }

    fn object_url(&self, kind: Kind, identity: &Identity) -> String {
        format!(
            "{}/{}",
            self.collection_url(kind, &identity.namespace),
            identity.name
        )
    }

    fn log_url(&self, pod: &Identity, container: &str) -> Result<String, ApiError> {
        let base = format!("{}/log", self.object_url(Kind::Pod, pod));
        let mut url = reqwest::Url::parse(&base).map_err(|e| ApiError::Transport {
            method: "GET",
            url: base.clone(),
            message: e.to_string(),
        })?;
        url.query_pairs_mut().append_pair("container", container);
        Ok(url.into())
    }

    fn send(
        &self,
        method: &'static str,
        url: &str,
        target: (&'static str, Kind, &Identity),
        request: RequestBuilder,
        deadline: &Deadline,
    ) -> Result<Response, ApiError> {
        let (operation, kind, identity) = target;
        ensure_live(operation, kind, identity, deadline)?;
        let timeout = deadline.remaining().min(self.request_timeout);

        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        tracing::trace!(method, url, "api request");

        request.timeout(timeout).send().map_err(|e| {
            if deadline.is_done() {
                ApiError::interrupted(operation, kind, identity, deadline)
            } else {
                ApiError::Transport {
                    method,
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        })
    }

    /// Turn a response into its body, mapping error statuses.
    fn check(
        method: &'static str,
        url: &str,
        kind: Kind,
        identity: &Identity,
        response: Response,
    ) -> Result<Response, ApiError> {
        let code = response.status().as_u16();
        if response.status().is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(classify_status(method, url, kind, identity, code, body))
    }
}

/// Map a non-success HTTP status to an [`ApiError`].
pub(crate) fn classify_status(
    method: &'static str,
    url: &str,
    kind: Kind,
    identity: &Identity,
    code: u16,
    body: String,
) -> ApiError {
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.clone());

    match code {
        404 => ApiError::NotFound {
            kind,
            identity: identity.clone(),
        },
        409 if method == "POST" => ApiError::AlreadyExists {
            kind,
            identity: identity.clone(),
        },
        410 => ApiError::Gone {
            kind,
            identity: identity.clone(),
            message,
        },
        _ if message.contains("is being terminated") => ApiError::Gone {
            kind,
            identity: identity.clone(),
            message,
        },
        _ => ApiError::Status {
            method,
            url: url.to_string(),
            code,
            body: message,
        },
    }
}

impl Orchestrator for KubeClient {
    fn create(&self, kind: Kind, object: &Value, deadline: &Deadline) -> Result<Value, ApiError> {
        let namespace = object["metadata"]["namespace"].as_str().unwrap_or_default();
        let name = object["metadata"]["name"].as_str().unwrap_or_default();
        let identity = Identity::new(namespace, name).map_err(|e| ApiError::InvalidObject {
            kind,
            message: e.to_string(),
        })?;

        let url = self.collection_url(kind, namespace);
        let response = self.send(
            "POST",
            &url,
            (OP_CREATE, kind, &identity),
            self.http.post(&url).json(object),
            deadline,
        )?;
        let response = Self::check("POST", &url, kind, &identity, response)?;
        response.json().map_err(|e| ApiError::Transport {
            method: "POST",
            url,
            message: format!("failed to read response body: {e}"),
        })
    }

    fn get(
        &self,
        kind: Kind,
        identity: &Identity,
        deadline: &Deadline,
    ) -> Result<Value, ApiError> {
        let url = self.object_url(kind, identity);
        let response = self.send(
            "GET",
            &url,
            (OP_READ, kind, identity),
            self.http.get(&url),
            deadline,
        )?;
        let response = Self::check("GET", &url, kind, identity, response)?;
        response.json().map_err(|e| ApiError::Transport {
            method: "GET",
            url,
            message: format!("failed to read response body: {e}"),
        })
    }

    fn logs(
        &self,
        pod: &Identity,
        container: &str,
        deadline: &Deadline,
    ) -> Result<String, ApiError> {
        let url = self.log_url(pod, container)?;
        let response = self.send(
            "GET",
            &url,
            (OP_LOGS, Kind::Pod, pod),
            self.http.get(&url),
            deadline,
        )?;
        let response = Self::check("GET", &url, Kind::Pod, pod, response)?;
        response.text().map_err(|e| ApiError::Transport {
            method: "GET",
            url,
            message: format!("failed to read log body: {e}"),
        })
    }
}
