//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (CRAWLGATE_*)
//! 2. TOML config file (if CRAWLGATE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (CRAWLGATE_*, nested keys joined with `__`)
/// 2. TOML file from `CRAWLGATE_CONFIG_FILE` (if set)
/// 3. Built-in defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Address the edge server binds to.
    ///
    /// Set via CRAWLGATE_LISTEN_ADDR environment variable.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Origin that renders full HTML documents for content paths.
    ///
    /// Set via CRAWLGATE_ORIGIN_BASE environment variable.
    #[serde(default = "default_origin_base")]
    pub origin_base: String,

    /// Path prefix of the content section handled by the classifier.
    ///
    /// Set via CRAWLGATE_CONTENT_PREFIX environment variable.
    #[serde(default = "default_content_prefix")]
    pub content_prefix: String,

    /// Mount point of the relay endpoint, in front of the content prefix.
    ///
    /// Set via CRAWLGATE_RELAY_PREFIX environment variable.
    #[serde(default = "default_relay_prefix")]
    pub relay_prefix: String,

    /// User-Agent forwarded upstream when the caller sent none.
    ///
    /// Set via CRAWLGATE_DEFAULT_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub default_user_agent: String,

    /// Outbound HTTP timeout in milliseconds.
    ///
    /// Set via CRAWLGATE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// HTML file served as the client application shell.
    ///
    /// Set via CRAWLGATE_APP_SHELL_PATH environment variable.
    #[serde(default)]
    pub app_shell_path: Option<PathBuf>,

    /// Offline cache agent settings.
    #[serde(default)]
    pub agent: AgentConfig,
}

/// Settings for the offline cache agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Address the local agent proxy binds to.
    #[serde(default = "default_agent_listen_addr")]
    pub listen_addr: String,

    /// Site whose responses the agent caches.
    #[serde(default = "default_upstream")]
    pub upstream: String,

    /// Path to SQLite cache database.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Current cache generation tag. Bump it whenever stored semantics change.
    #[serde(default = "default_generation")]
    pub generation: String,

    /// Resources stored eagerly at install time.
    #[serde(default = "default_manifest")]
    pub manifest: Vec<String>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".into()
}

fn default_origin_base() -> String {
    "https://origin.example.com".into()
}

fn default_content_prefix() -> String {
    "/news".into()
}

fn default_relay_prefix() -> String {
    "/api".into()
}

fn default_user_agent() -> String {
    "crawlgate/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_agent_listen_addr() -> String {
    "127.0.0.1:8787".into()
}

fn default_upstream() -> String {
    "http://127.0.0.1:8080".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./crawlgate-cache.sqlite")
}

fn default_generation() -> String {
    "crawlgate-v1".into()
}

fn default_manifest() -> Vec<String> {
    ["/", "/favicon.ico", "/icons/icon-192.png", "/icons/icon-512.png", "/manifest.json"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_agent_listen_addr(),
            upstream: default_upstream(),
            db_path: default_db_path(),
            generation: default_generation(),
            manifest: default_manifest(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            origin_base: default_origin_base(),
            content_prefix: default_content_prefix(),
            relay_prefix: default_relay_prefix(),
            default_user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            app_shell_path: None,
            agent: AgentConfig::default(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Route pattern the relay is mounted on, e.g. `/api/news`.
    pub fn relay_mount(&self) -> String {
        format!("{}{}", self.relay_prefix.trim_end_matches('/'), self.content_prefix)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `CRAWLGATE_`
    /// 2. TOML file from `CRAWLGATE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("CRAWLGATE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment.merge(
            Env::prefixed("CRAWLGATE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        )
    }

    fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}
