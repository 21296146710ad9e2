//! Client configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ClientError, ClientResult};
use crate::servers::ServerList;
use crate::store::FingerprintAlgorithm;

const ENV_PREFIX: &str = "CONFSYNC_";

/// Configuration for the confsync client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Application id registered with the configuration service.
    pub app_id: String,
    /// Application secret, sent as the password half of Basic auth.
    pub secret: String,
    /// Comma-separated list of server base URLs.
    pub server_nodes: String,
    /// Environment name (e.g. "DEV", "PROD"); upper-cased before use.
    pub env: String,
    /// Client name reported on the push channel.
    pub name: String,
    /// Client tag reported on the push channel.
    pub tag: String,
    /// Directory for the local cache file. Probed automatically when unset.
    pub cache_dir: Option<PathBuf>,
    /// Reconnect supervision interval in seconds (default: 10)
    pub reconnect_interval_secs: u64,
    /// Heartbeat interval in seconds (default: 30)
    pub heartbeat_interval_secs: u64,
    /// Timeout for a single full-pull request in seconds (default: 30)
    pub http_timeout_secs: u64,
    /// Digest used for version fingerprints.
    pub fingerprint: FingerprintAlgorithm,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            secret: String::new(),
            server_nodes: String::new(),
            env: String::new(),
            name: String::new(),
            tag: String::new(),
            cache_dir: None,
            reconnect_interval_secs: 10,
            heartbeat_interval_secs: 30,
            http_timeout_secs: 30,
            fingerprint: FingerprintAlgorithm::default(),
        }
    }
}

impl ClientConfig {
    pub fn new(
        app_id: impl Into<String>,
        secret: impl Into<String>,
        server_nodes: impl Into<String>,
        env: impl Into<String>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            secret: secret.into(),
            server_nodes: server_nodes.into(),
            env: env.into(),
            ..Default::default()
        }
    }

    /// Defaults overlaid with `CONFSYNC_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        let var = |name: &str| std::env::var(format!("{ENV_PREFIX}{name}")).ok();

        if let Some(v) = var("APP_ID") {
            config.app_id = v;
        }
        if let Some(v) = var("SECRET") {
            config.secret = v;
        }
        if let Some(v) = var("SERVER_NODES") {
            config.server_nodes = v;
        }
        if let Some(v) = var("ENV") {
            config.env = v;
        }
        if let Some(v) = var("NAME") {
            config.name = v;
        }
        if let Some(v) = var("TAG") {
            config.tag = v;
        }
        if let Some(v) = var("CACHE_DIR") {
            config.cache_dir = Some(PathBuf::from(v));
        }
        config
    }

    /// Check the fields construction depends on and parse the server list.
    pub fn validate(&self) -> ClientResult<ServerList> {
        if self.app_id.trim().is_empty() {
            return Err(ClientError::Configuration("app_id must not be empty".to_string()));
        }
        ServerList::parse(&self.server_nodes)
    }

    /// Environment name as sent on the wire.
    pub fn normalized_env(&self) -> String {
        self.env.trim().to_uppercase()
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_secs(self.reconnect_interval_secs.max(1))
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }
}
