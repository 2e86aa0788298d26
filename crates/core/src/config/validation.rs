//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(value).map_err(|e| invalid(field, &e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(()),
        "http" | "https" => Err(invalid(field, "must include a host")),
        _ => Err(invalid(field, "must be an http or https URL")),
    }
}

fn validate_prefix(field: &str, value: &str) -> Result<(), ConfigError> {
    if !value.starts_with('/') {
        return Err(invalid(field, "must start with '/'"));
    }
    if value.len() > 1 && value.ends_with('/') {
        return Err(invalid(field, "must not end with '/'"));
    }
    Ok(())
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `origin_base` or `agent.upstream` is not an http(s) URL
    /// - `content_prefix` or `relay_prefix` does not start with '/' or ends with '/'
    /// - `default_user_agent` is empty
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `agent.generation` is empty
    /// - an `agent.manifest` entry is not an absolute path
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_http_url("origin_base", &self.origin_base)?;
        validate_prefix("content_prefix", &self.content_prefix)?;
        if self.content_prefix == "/" {
            return Err(invalid("content_prefix", "must name a section, not the site root"));
        }
        validate_prefix("relay_prefix", &self.relay_prefix)?;

        if self.default_user_agent.trim().is_empty() {
            return Err(invalid("default_user_agent", "must not be empty"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        validate_http_url("agent.upstream", &self.agent.upstream)?;

        if self.agent.generation.trim().is_empty() {
            return Err(invalid("agent.generation", "must not be empty"));
        }

        if let Some(entry) = self.agent.manifest.iter().find(|p| !p.starts_with('/')) {
            return Err(invalid("agent.manifest", &format!("'{entry}' is not an absolute path")));
        }

        if self.agent.manifest.is_empty() {
            tracing::warn!("agent.manifest is empty; nothing will be available offline until visited");
        }

        Ok(())
    }
}
