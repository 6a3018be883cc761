//! Configuration file and environment overrides.
//!
//! Loaded once by the CLI and handed to the library as plain values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::client::ClusterConfig;
use crate::models::validate_name;
use crate::poll::PollConfig;
use crate::probe::DEFAULT_PROBE_IMAGE;
use crate::scenario::{
    KanikoScenario, DEFAULT_GIT_URL, DEFAULT_KANIKO_IMAGE, DEFAULT_REGISTRY_IMAGE,
    DEFAULT_REPOSITORY, DEFAULT_REVISION, DEFAULT_TASK_RUN_TIMEOUT,
};

pub const CONFIG_FILE_NAME: &str = "settle.toml";
pub const ENV_NAMESPACE: &str = "SETTLE_NAMESPACE";
pub const ENV_TOKEN: &str = "SETTLE_TOKEN";
pub const ENV_SKIP_ROOT_USER_TESTS: &str = "SETTLE_SKIP_ROOT_USER_TESTS";

/// Namespace used when neither the file, the environment nor a flag names one.
pub const DEFAULT_NAMESPACE: &str = "default";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cluster: ClusterConfig,
    pub images: ImagesConfig,
    pub poll: PollSettings,
    pub scenario: ScenarioSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    pub kaniko: String,
    pub registry: String,
    pub probe: String,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            kaniko: DEFAULT_KANIKO_IMAGE.to_string(),
            registry: DEFAULT_REGISTRY_IMAGE.to_string(),
            probe: DEFAULT_PROBE_IMAGE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    pub interval_ms: u64,
    pub max_interval_ms: u64,
    /// Overall limit for one command, covering every wait in it.
    pub timeout_secs: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            max_interval_ms: 5000,
            timeout_secs: 600,
        }
    }
}

impl PollSettings {
    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(self.interval_ms),
            max_interval: Duration::from_millis(self.max_interval_ms),
            timeout: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioSettings {
    pub namespace: String,
    pub git_url: String,
    pub revision: String,
    pub repository: String,
    pub task_run_timeout_secs: u64,
    pub skip_root_user_tests: bool,
    pub strict_probe: bool,
}

impl Default for ScenarioSettings {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            git_url: DEFAULT_GIT_URL.to_string(),
            revision: DEFAULT_REVISION.to_string(),
            repository: DEFAULT_REPOSITORY.to_string(),
            task_run_timeout_secs: DEFAULT_TASK_RUN_TIMEOUT.as_secs(),
            skip_root_user_tests: false,
            strict_probe: false,
        }
    }
}

impl Config {
    /// `$XDG_CONFIG_HOME/settle/settle.toml`, or the platform equivalent.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("settle").join(CONFIG_FILE_NAME))
    }

    /// Load from `path`, or from the default location. A missing file
    /// yields the defaults; a malformed one is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => return Self::default().finish(),
            },
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config");
        config.finish()
    }

    fn finish(mut self) -> Result<Self> {
        self.apply_env()?;
        self.expand_paths();
        validate_name(&self.scenario.namespace)
            .with_context(|| format!("Invalid namespace {:?}", self.scenario.namespace))?;
        Ok(self)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(namespace) = env::var(ENV_NAMESPACE) {
            if !namespace.is_empty() {
                self.scenario.namespace = namespace;
            }
        }
        if let Ok(token) = env::var(ENV_TOKEN) {
            if !token.is_empty() {
                self.cluster.token = Some(token);
            }
        }
        if let Ok(value) = env::var(ENV_SKIP_ROOT_USER_TESTS) {
            self.scenario.skip_root_user_tests = parse_bool(&value)
                .with_context(|| format!("Invalid value for {ENV_SKIP_ROOT_USER_TESTS}: {value:?}"))?;
        }
        Ok(())
    }

    fn expand_paths(&mut self) {
        for path in [&mut self.cluster.token_file, &mut self.cluster.ca_file]
            .into_iter()
            .flatten()
        {
            *path = PathBuf::from(expand_env_vars(&expand_tilde(&path.to_string_lossy())));
        }
    }

    /// Scenario parameters for `namespace` (or the configured one).
    pub fn scenario(&self, namespace: Option<&str>) -> KanikoScenario {
        let mut scenario =
            KanikoScenario::new(namespace.unwrap_or(self.scenario.namespace.as_str()));
        scenario.git_url = self.scenario.git_url.clone();
        scenario.revision = self.scenario.revision.clone();
        scenario.repository = self.scenario.repository.clone();
        scenario.kaniko_image = self.images.kaniko.clone();
        scenario.registry_image = self.images.registry.clone();
        scenario.probe_image = self.images.probe.clone();
        scenario.task_run_timeout = Duration::from_secs(self.scenario.task_run_timeout_secs);
        scenario.skip_root_user_tests = self.scenario.skip_root_user_tests;
        scenario
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("expected a boolean, got {other:?}"),
    }
}

/// Expand a leading `~/` to the home directory.
pub fn expand_tilde(path: &str) -> String {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest).to_string_lossy().into_owned(),
        _ => path.to_string(),
    }
}

/// Expand `${VAR}` and `$VAR`. Unset variables are left as written.
pub fn expand_env_vars(s: &str) -> String {
    let Ok(re) = regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
    else {
        return s.to_string();
    };

    re.replace_all(s, |caps: &regex::Captures| {
        let name = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str());
        match name.and_then(|name| env::var(name).ok()) {
            Some(value) => value,
            None => caps[0].to_string(),
        }
    })
    .into_owned()
}
