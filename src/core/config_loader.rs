//! Configuration file loader for tao-publisher
//!
//! This module provides configuration loading, validation, merging and
//! saving. The core never reads configuration itself; the CLI does and hands
//! the resulting values down.

use super::config::*;
use crate::core::error::{PublishError, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "TAO_CONFIG";

/// Location under `$HOME` used when nothing else is given
const DEFAULT_CONFIG_FILE: &str = ".config/tao/config.yaml";

/// Configuration load options
#[derive(Debug, Clone, Default)]
pub struct ConfigLoadOptions {
    /// Explicit config file (`--config`), highest priority for the location
    pub config_path: Option<PathBuf>,

    /// Environment variables
    pub env: HashMap<String, String>,
}

impl ConfigLoadOptions {
    /// Options reading the current process environment
    pub fn from_process(config_path: Option<PathBuf>) -> Self {
        Self {
            config_path,
            env: std::env::vars().collect(),
        }
    }
}

/// Configuration validation result
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationResult {
    pub valid: bool,
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationWarning>,
}

/// Configuration validation error
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationError {
    /// Field path (e.g., "retry.maxAttempts")
    pub field: String,
    pub message: String,
}

/// Configuration validation warning
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

/// Configuration file loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Resolve the config file location
    ///
    /// Priority (high to low):
    /// 1. `--config`
    /// 2. `$TAO_CONFIG`
    /// 3. `$HOME/.config/tao/config.yaml`
    pub fn config_path(options: &ConfigLoadOptions) -> Result<PathBuf> {
        if let Some(path) = &options.config_path {
            return Ok(path.clone());
        }
        if let Some(path) = options.env.get(CONFIG_PATH_ENV).filter(|p| !p.is_empty()) {
            return Ok(PathBuf::from(path));
        }

        let home = options
            .env
            .get("HOME")
            .filter(|h| !h.is_empty())
            .ok_or_else(|| PublishError::config("HOME environment variable not set"))?;
        Ok(PathBuf::from(home).join(DEFAULT_CONFIG_FILE))
    }

    /// Load configuration from multiple sources with priority
    ///
    /// Priority (high to low):
    /// 1. Environment variables
    /// 2. Config file
    /// 3. Default values
    pub async fn load(options: &ConfigLoadOptions) -> Result<ClientConfig> {
        let mut configs = vec![ClientConfig::default()];

        let path = Self::config_path(options)?;
        if let Some(file_config) = Self::load_config_file(&path).await? {
            configs.push(file_config);
        }

        if let Some(env_config) = Self::load_env_config(&options.env)? {
            configs.push(env_config);
        }

        Ok(Self::merge_configs(configs))
    }

    /// Load configuration from a YAML file; a missing file is not an error
    pub async fn load_config_file(path: &Path) -> Result<Option<ClientConfig>> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file");
            return Ok(None);
        }

        let content = fs::read_to_string(path)
            .await
            .map_err(|e| PublishError::io(path, e))?;

        if content.trim().is_empty() {
            return Ok(Some(ClientConfig::default()));
        }

        let config = serde_yaml::from_str(&content).map_err(|e| {
            PublishError::config(format!("failed to parse {}: {}", path.display(), e))
        })?;

        debug!(path = %path.display(), "loaded config file");
        Ok(Some(config))
    }

    /// Load configuration from environment variables
    fn load_env_config(env: &HashMap<String, String>) -> Result<Option<ClientConfig>> {
        let mut config = ClientConfig::default();
        let mut has_changes = false;

        if let Some(url) = env.get("TAO_URL") {
            config.url = Some(url.clone());
            has_changes = true;
        }

        if let Some(user) = env.get("TAO_USER") {
            config.user = Some(user.clone());
            has_changes = true;
        }

        if let Some(timeout) = env.get("TAO_TIMEOUT_SECS") {
            config.timeout_secs = Some(Self::parse_env("TAO_TIMEOUT_SECS", timeout)?);
            has_changes = true;
        }

        if let Some(concurrency) = env.get("TAO_MAX_CONCURRENCY") {
            config.max_concurrency = Some(Self::parse_env("TAO_MAX_CONCURRENCY", concurrency)?);
            has_changes = true;
        }

        if has_changes { Ok(Some(config)) } else { Ok(None) }
    }

    fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
        value.trim().parse().map_err(|_| {
            PublishError::config(format!("{} must be a non-negative integer, got {:?}", name, value))
        })
    }

    /// Merge multiple configurations with priority
    pub fn merge_configs(configs: Vec<ClientConfig>) -> ClientConfig {
        let mut result = ClientConfig::default();

        for config in configs {
            Self::merge_into(&mut result, config);
        }

        result
    }

    /// Merge source config into target
    fn merge_into(target: &mut ClientConfig, source: ClientConfig) {
        if source.url.is_some() {
            target.url = source.url;
        }
        if source.user.is_some() {
            target.user = source.user;
        }

        // Token and expiry travel together
        if source.token.is_some() {
            target.token = source.token;
            target.token_expires_at = source.token_expires_at;
        }

        if source.timeout_secs.is_some() {
            target.timeout_secs = source.timeout_secs;
        }
        if source.max_concurrency.is_some() {
            target.max_concurrency = source.max_concurrency;
        }
        if source.session_ttl_secs.is_some() {
            target.session_ttl_secs = source.session_ttl_secs;
        }

        if let Some(source_retry) = source.retry {
            let target_retry = target.retry.get_or_insert_with(RetryConfig::default);

            if source_retry.max_attempts.is_some() {
                target_retry.max_attempts = source_retry.max_attempts;
            }
            if source_retry.initial_delay_ms.is_some() {
                target_retry.initial_delay_ms = source_retry.initial_delay_ms;
            }
            if source_retry.max_delay_ms.is_some() {
                target_retry.max_delay_ms = source_retry.max_delay_ms;
            }
        }
    }

    /// Validate configuration
    pub fn validate(config: &ClientConfig) -> ConfigValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if let Some(url) = &config.url {
            match reqwest::Url::parse(url) {
                Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
                Ok(parsed) => errors.push(ConfigValidationError {
                    field: "url".to_string(),
                    message: format!("unsupported scheme {:?} (expected http or https)", parsed.scheme()),
                }),
                Err(e) => errors.push(ConfigValidationError {
                    field: "url".to_string(),
                    message: format!("invalid URL: {}", e),
                }),
            }
        }

        if config.timeout_secs == Some(0) {
            errors.push(ConfigValidationError {
                field: "timeoutSecs".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        if config.max_concurrency == Some(0) {
            errors.push(ConfigValidationError {
                field: "maxConcurrency".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        if config.session_ttl_secs == Some(0) {
            errors.push(ConfigValidationError {
                field: "sessionTtlSecs".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        if let Some(retry) = &config.retry {
            if retry.max_attempts == Some(0) {
                errors.push(ConfigValidationError {
                    field: "retry.maxAttempts".to_string(),
                    message: "must be at least 1".to_string(),
                });
            }
            if let (Some(initial), Some(max)) = (retry.initial_delay_ms, retry.max_delay_ms)
                && initial > max
            {
                warnings.push(ConfigValidationWarning {
                    field: "retry.initialDelayMs".to_string(),
                    message: format!("initial delay {}ms exceeds max delay {}ms", initial, max),
                    suggestion: Some("Every retry will wait retry.maxDelayMs".to_string()),
                });
            }
        }

        if config.token.is_some()
            && let Some(expires_at) = config.token_expires_at
            && expires_at <= Utc::now()
        {
            warnings.push(ConfigValidationWarning {
                field: "tokenExpiresAt".to_string(),
                message: format!("stored session expired at {}", expires_at),
                suggestion: Some("Run `tao-publisher login`".to_string()),
            });
        }

        ConfigValidationResult {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    /// Format validation result as human-readable string
    pub fn format_validation_result(result: &ConfigValidationResult) -> String {
        let mut lines = Vec::new();

        if result.valid {
            lines.push("Configuration is valid".to_string());
        } else {
            lines.push("Configuration has errors".to_string());
        }

        for error in &result.errors {
            lines.push(format!("  error [{}] {}", error.field, error.message));
        }

        for warning in &result.warnings {
            lines.push(format!("  warning [{}] {}", warning.field, warning.message));
            if let Some(suggestion) = &warning.suggestion {
                lines.push(format!("    Suggestion: {}", suggestion));
            }
        }

        lines.join("\n")
    }

    /// Save configuration (atomic: temp file, then rename)
    pub async fn save(config: &ClientConfig, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(config)
            .map_err(|e| PublishError::config(format!("failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| PublishError::io(parent, e))?;
        }

        let temp_file = path.with_extension("yaml.tmp");
        fs::write(&temp_file, yaml)
            .await
            .map_err(|e| PublishError::io(&temp_file, e))?;
        fs::rename(&temp_file, path)
            .await
            .map_err(|e| PublishError::io(path, e))?;

        debug!(path = %path.display(), "saved config");
        Ok(())
    }
}
