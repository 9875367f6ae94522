use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_CONFIG_FILE: &str = "hsync.toml";
pub const DEFAULT_QUEUE_CAPACITY: usize = 100; // pending broadcasts before producers wait
pub const DEFAULT_CONNECTION_BUFFER: usize = 64; // frames buffered per streaming client
pub const DEFAULT_KEEPALIVE_SECS: u64 = 15;
pub const MAX_ORIGINATOR_LEN: usize = 128;

/// Top-level config (hsync.toml + HSYNC_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HsyncConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub hub: HubConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub experiments: ExperimentsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory served under `/static`.
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            static_dir: default_static_dir(),
        }
    }
}

/// What `broadcast` does when the pending-event queue is full.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum QueuePolicy {
    /// Wait for capacity. Slow consumption backs up producers.
    #[default]
    Block,
    /// Fail immediately with a queue-full error.
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default)]
    pub full_policy: QueuePolicy,
    #[serde(default = "default_connection_buffer")]
    pub connection_buffer: usize,
    /// Interval for `: keep-alive` comments on idle streams. 0 disables them.
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            full_policy: QueuePolicy::default(),
            connection_buffer: default_connection_buffer(),
            keepalive_secs: default_keepalive_secs(),
        }
    }
}

/// Token-bucket limits applied per client address to mutation routes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    /// Tokens refilled per second.
    #[serde(default = "default_per_second")]
    pub per_second: u32,
    /// Bucket size; the largest burst a client may send at once.
    #[serde(default = "default_burst")]
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            per_second: default_per_second(),
            burst: default_burst(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentsConfig {
    #[serde(default = "default_checkbox_count")]
    pub checkbox_count: usize,
    #[serde(default = "default_canvas_width")]
    pub canvas_width: u32,
    #[serde(default = "default_canvas_height")]
    pub canvas_height: u32,
}

impl Default for ExperimentsConfig {
    fn default() -> Self {
        Self {
            checkbox_count: default_checkbox_count(),
            canvas_width: default_canvas_width(),
            canvas_height: default_canvas_height(),
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_static_dir() -> String {
    "static".to_string()
}
fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}
fn default_connection_buffer() -> usize {
    DEFAULT_CONNECTION_BUFFER
}
fn default_keepalive_secs() -> u64 {
    DEFAULT_KEEPALIVE_SECS
}
fn default_per_second() -> u32 {
    20
}
fn default_burst() -> u32 {
    40
}
fn default_checkbox_count() -> usize {
    10_000
}
fn default_canvas_width() -> u32 {
    1200
}
fn default_canvas_height() -> u32 {
    800
}

impl HsyncConfig {
    /// Load config from a TOML file with HSYNC_* env var overrides.
    ///
    /// The file is optional; missing keys fall back to defaults. Nested keys
    /// in env vars are separated by a double underscore, e.g.
    /// `HSYNC_HUB__QUEUE_CAPACITY=500`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path.unwrap_or(DEFAULT_CONFIG_FILE);
        tracing::debug!(%path, "loading configuration");

        let config: HsyncConfig = Figment::from(Serialized::defaults(HsyncConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("HSYNC_").split("__"))
            .extract()
            .map_err(|e| crate::error::SyncError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the server cannot run with.
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::SyncError;

        if self.hub.queue_capacity == 0 {
            return Err(SyncError::Config("hub.queue_capacity must be at least 1".into()));
        }
        if self.hub.connection_buffer == 0 {
            return Err(SyncError::Config("hub.connection_buffer must be at least 1".into()));
        }
        if self.rate_limit.enabled && (self.rate_limit.per_second == 0 || self.rate_limit.burst == 0) {
            return Err(SyncError::Config(
                "rate_limit.per_second and rate_limit.burst must be positive".into(),
            ));
        }
        if self.experiments.checkbox_count == 0 {
            return Err(SyncError::Config("experiments.checkbox_count must be at least 1".into()));
        }
        Ok(())
    }
}
