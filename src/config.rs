//! Global configuration parsing, validation, and credential loading.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::{AppError, Result};

/// Keychain service name for runtime credentials.
const KEYCHAIN_SERVICE: &str = "agent-exchange";

/// Development fallback secret used when no credential source provides one.
const DEV_SECRET: &str = "development-secret-key-change-in-production";

/// Admission and request-size ceilings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct LimitsConfig {
    /// Requests per client allowed in the 60-second window.
    #[serde(default = "default_rate_limit_rpm")]
    pub rate_limit_rpm: u32,
    /// Requests per client allowed in the 10-second burst window.
    #[serde(default = "default_rate_limit_burst")]
    pub rate_limit_burst: u32,
    /// Maximum accepted request body size in bytes.
    #[serde(default = "default_max_request_size")]
    pub max_request_size: u64,
}

fn default_rate_limit_rpm() -> u32 {
    100
}

fn default_rate_limit_burst() -> u32 {
    20
}

fn default_max_request_size() -> u64 {
    10 * 1024 * 1024
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            rate_limit_rpm: default_rate_limit_rpm(),
            rate_limit_burst: default_rate_limit_burst(),
            max_request_size: default_max_request_size(),
        }
    }
}

/// Configurable timeout values (seconds) for request handling.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TimeoutConfig {
    /// Deadline for one agent invocation (sync or streaming).
    #[serde(default = "default_agent_seconds")]
    pub agent_seconds: u64,
    /// Keep-alive comment cadence on quiet event streams.
    #[serde(default = "default_keepalive_seconds")]
    pub stream_keepalive_seconds: u64,
    /// Threshold above which a request is logged as slow (milliseconds).
    #[serde(default = "default_slow_request_millis")]
    pub slow_request_millis: u64,
}

fn default_agent_seconds() -> u64 {
    300
}

fn default_keepalive_seconds() -> u64 {
    15
}

fn default_slow_request_millis() -> u64 {
    1000
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            agent_seconds: default_agent_seconds(),
            stream_keepalive_seconds: default_keepalive_seconds(),
            slow_request_millis: default_slow_request_millis(),
        }
    }
}

/// Retention windows for background sweeps.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct RetentionConfig {
    /// Seconds a terminal task entry may linger before the sweep evicts it.
    #[serde(default = "default_task_grace_seconds")]
    pub task_grace_seconds: u64,
    /// Seconds of client inactivity before its rate window is evicted.
    #[serde(default = "default_client_idle_seconds")]
    pub client_idle_seconds: u64,
}

fn default_task_grace_seconds() -> u64 {
    300
}

fn default_client_idle_seconds() -> u64 {
    3600
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            task_grace_seconds: default_task_grace_seconds(),
            client_idle_seconds: default_client_idle_seconds(),
        }
    }
}

/// Bearer-token authentication settings.
///
/// The signing secret is loaded at runtime via OS keychain or environment
/// variable, not from the TOML config file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub struct AuthConfig {
    /// Whether requests to the RPC endpoint must present a valid token.
    #[serde(default)]
    pub required: bool,
    /// HS256 shared secret (populated at runtime).
    #[serde(skip)]
    pub secret: String,
}

/// Global configuration parsed from `config.toml`.
///
/// Every field carries a default so the server starts with no config
/// file at all.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Display name used in the discovery document.
    #[serde(default = "default_app_name")]
    pub app_name: String,
    /// Interface the HTTP server binds to.
    #[serde(default = "default_host")]
    pub host: String,
    /// HTTP port for the RPC/SSE server.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Enables the `/debug/*` snapshot endpoints.
    #[serde(default)]
    pub debug: bool,
    /// Whether streaming is advertised and `message/stream` accepted.
    #[serde(default = "default_true")]
    pub enable_streaming: bool,
    /// Fallback agent id when content-based routing finds no match.
    #[serde(default = "default_agent_id")]
    pub default_agent: String,
    /// Allowed CORS origins; `*` allows any.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
    /// SQLite file for the optional task store; `None` disables persistence.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    /// Admission and size ceilings.
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Timeout configuration.
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// Background sweep retention windows.
    #[serde(default)]
    pub retention: RetentionConfig,
    /// Bearer authentication settings.
    #[serde(default)]
    pub auth: AuthConfig,
}

fn default_app_name() -> String {
    "Agent Exchange".into()
}

fn default_host() -> String {
    "0.0.0.0".into()
}

fn default_http_port() -> u16 {
    8000
}

fn default_true() -> bool {
    true
}

fn default_agent_id() -> String {
    "default".into()
}

fn default_allowed_origins() -> Vec<String> {
    vec!["*".into()]
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            host: default_host(),
            http_port: default_http_port(),
            debug: false,
            enable_streaming: true,
            default_agent: default_agent_id(),
            allowed_origins: default_allowed_origins(),
            db_path: None,
            limits: LimitsConfig::default(),
            timeouts: TimeoutConfig::default(),
            retention: RetentionConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the auth secret from OS keychain with env-var fallback.
    ///
    /// Tries the `agent-exchange` keyring service first, then the
    /// `JWT_SECRET_KEY` environment variable. When neither is present a
    /// development secret is used unless `auth.required` is set, in which
    /// case startup fails rather than enforcing auth with a known secret.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` when `auth.required` is set and no
    /// credential source provides a secret.
    pub async fn load_credentials(&mut self) -> Result<()> {
        match load_credential("jwt_secret_key", "JWT_SECRET_KEY").await {
            Ok(secret) => {
                self.auth.secret = secret;
            }
            Err(err) if self.auth.required => {
                return Err(AppError::Config(format!(
                    "auth.required is set but no secret is available: {err}"
                )));
            }
            Err(_) => {
                warn!("no auth secret configured; using development secret");
                self.auth.secret = DEV_SECRET.into();
            }
        }
        Ok(())
    }

    /// Socket address string the HTTP server binds to.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }

    /// Base URL advertised in the discovery document.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.http_port)
    }

    /// Deadline for one agent invocation.
    #[must_use]
    pub fn agent_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.agent_seconds)
    }

    /// Keep-alive cadence for quiet event streams.
    #[must_use]
    pub fn stream_keepalive(&self) -> Duration {
        Duration::from_secs(self.timeouts.stream_keepalive_seconds)
    }

    fn validate(&self) -> Result<()> {
        if self.limits.rate_limit_rpm == 0 {
            return Err(AppError::Config(
                "limits.rate_limit_rpm must be greater than zero".into(),
            ));
        }
        if self.limits.rate_limit_burst == 0 {
            return Err(AppError::Config(
                "limits.rate_limit_burst must be greater than zero".into(),
            ));
        }
        if self.limits.rate_limit_burst > self.limits.rate_limit_rpm {
            return Err(AppError::Config(
                "limits.rate_limit_burst must not exceed limits.rate_limit_rpm".into(),
            ));
        }
        if self.limits.max_request_size == 0 {
            return Err(AppError::Config(
                "limits.max_request_size must be greater than zero".into(),
            ));
        }
        if self.timeouts.agent_seconds == 0 {
            return Err(AppError::Config(
                "timeouts.agent_seconds must be greater than zero".into(),
            ));
        }
        if self.default_agent.trim().is_empty() {
            return Err(AppError::Config("default_agent must not be empty".into()));
        }
        if self.host.trim().is_empty() {
            return Err(AppError::Config("host must not be empty".into()));
        }
        Ok(())
    }
}

/// Load a single credential from OS keychain with env-var fallback.
async fn load_credential(keyring_key: &str, env_key: &str) -> Result<String> {
    let key = keyring_key.to_owned();

    // Try OS keychain first via spawn_blocking (keyring is synchronous I/O).
    let keychain_result = tokio::task::spawn_blocking(move || {
        keyring::Entry::new(KEYCHAIN_SERVICE, &key).and_then(|entry| entry.get_password())
    })
    .await
    .map_err(|err| AppError::Config(format!("keychain task panicked: {err}")))?;

    match keychain_result {
        Ok(value) if !value.is_empty() => return Ok(value),
        Ok(_) => {
            warn!(key = keyring_key, "keychain entry is empty, trying env var");
        }
        Err(err) => {
            warn!(
                key = keyring_key,
                ?err,
                "keychain lookup failed, trying env var"
            );
        }
    }

    // Fallback to environment variable.
    env::var(env_key).map_err(|_| {
        AppError::Config(format!(
            "credential {keyring_key} not found in keychain or {env_key} env var"
        ))
    })
}
