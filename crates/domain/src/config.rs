//! Layered configuration: built-in defaults, overlaid by an optional
//! TOML file, overlaid by a handful of environment variables for
//! secrets that should never live in a committed file.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub turn_processor: TurnProcessorConfig,
    #[serde(default)]
    pub moderation: ModerationConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

impl Config {
    /// Load from `path` if it exists, falling back to built-in
    /// defaults, then apply environment overrides for secrets.
    pub fn load(path: &std::path::Path) -> crate::Result<Self> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            toml::from_str(&raw).map_err(|e| crate::Error::Internal(format!("config: {e}")))?
        } else {
            Config::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(secret) = std::env::var("DR_AUTH_SECRET") {
            self.auth.hmac_secret = secret;
        }
        if let Ok(key) = std::env::var("DR_SERVICE_KEY") {
            self.auth.service_key = key;
        }
        if let Ok(url) = std::env::var("DR_AGENT_URL") {
            self.turn_processor.agent_url = url;
        }
        if let Ok(port) = std::env::var("DR_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
    }

    /// A copy suitable for `config show` — secrets replaced by a
    /// fixed placeholder so they never reach a log or terminal.
    pub fn redacted(&self) -> Self {
        let mut c = self.clone();
        if !c.auth.hmac_secret.is_empty() {
            c.auth.hmac_secret = "<redacted>".into();
        }
        if !c.auth.service_key.is_empty() {
            c.auth.service_key = "<redacted>".into();
        }
        c
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_port")]
    pub port: u16,
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default = "d_max_concurrent")]
    pub max_concurrent_requests: usize,
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: d_port(),
            host: d_host(),
            cors: CorsConfig::default(),
            max_concurrent_requests: d_max_concurrent(),
            rate_limit: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Origins allowed for CORS. Use `["*"]` for permissive (not
    /// recommended outside local development).
    #[serde(default = "d_cors_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: d_cors_origins(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "d_burst")]
    pub burst_size: u32,
    #[serde(default = "d_per_second")]
    pub per_second: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnProcessorConfig {
    #[serde(default = "d_agent_url")]
    pub agent_url: String,
    #[serde(default = "d_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "d_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for TurnProcessorConfig {
    fn default() -> Self {
        Self {
            agent_url: d_agent_url(),
            poll_interval_ms: d_poll_interval_ms(),
            request_timeout_secs: d_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationConfig {
    #[serde(default = "d_banned_keywords")]
    pub banned_keywords: Vec<String>,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            banned_keywords: d_banned_keywords(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC-SHA256 signing secret for session tokens. Empty by
    /// default; production deployments must set `DR_AUTH_SECRET`.
    #[serde(default)]
    pub hmac_secret: String,
    /// Shared secret compared in constant time for the internal
    /// event-tail route.
    #[serde(default)]
    pub service_key: String,
    #[serde(default = "d_token_ttl_secs")]
    pub default_token_ttl_secs: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            hmac_secret: String::new(),
            service_key: String::new(),
            default_token_ttl_secs: d_token_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the JSON snapshot file. `None` disables persistence
    /// entirely (in-memory only, used by most tests).
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
    #[serde(default = "d_true")]
    pub snapshot_on_commit: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            snapshot_path: None,
            snapshot_on_commit: d_true(),
        }
    }
}

fn d_port() -> u16 {
    8080
}
fn d_host() -> String {
    "127.0.0.1".into()
}
fn d_max_concurrent() -> usize {
    512
}
fn d_cors_origins() -> Vec<String> {
    vec!["http://localhost:5173".into()]
}
fn d_burst() -> u32 {
    30
}
fn d_per_second() -> u64 {
    10
}
fn d_agent_url() -> String {
    "http://127.0.0.1:9000".into()
}
fn d_poll_interval_ms() -> u64 {
    500
}
fn d_request_timeout_secs() -> u64 {
    10
}
fn d_banned_keywords() -> Vec<String> {
    ["violence", "blood", "weapon", "scary", "alcohol"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn d_token_ttl_secs() -> i64 {
    3600
}
fn d_true() -> bool {
    true
}
