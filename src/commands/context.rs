use anyhow::{Context, Result};

use crate::client::KubeClient;
use crate::config::Config;
use crate::deadline::{CancelToken, Deadline};
use crate::models::Identity;
use crate::poll::Poller;

/// State shared by every command of one invocation.
pub struct CommandContext {
    pub config: Config,
    pub deadline: Deadline,
}

impl CommandContext {
    /// The deadline covers the whole command and is cancelled through `token`.
    pub fn new(config: Config, token: CancelToken) -> Self {
        let deadline = Deadline::with_token(config.poll.timeout(), token);
        Self { config, deadline }
    }

    pub fn poller(&self) -> Poller {
        Poller::new(self.config.poll.poll_config())
    }

    pub fn client(&self) -> Result<KubeClient> {
        KubeClient::new(&self.config.cluster)
            .with_context(|| format!("Failed to set up client for {}", self.config.cluster.server))
    }

    /// `namespace`, or the configured one.
    pub fn namespace<'a>(&'a self, namespace: Option<&'a str>) -> &'a str {
        namespace.unwrap_or(self.config.scenario.namespace.as_str())
    }

    pub fn identity(&self, namespace: Option<&str>, name: &str) -> Result<Identity> {
        Identity::new(self.namespace(namespace), name)
    }
}
