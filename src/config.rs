//! Configuration loading and management.
//!
//! Loads configuration from embedded config.toml with environment variable overrides.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::http::ClientOptions;
use crate::store::TokenStoreKind;

/// Embedded configuration file content.
const CONFIG_TOML: &str = include_str!("../config.toml");

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub api: ApiConfig,
    pub retry: RetryConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub refresh_endpoint: String,
    pub dedupe: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// `memory`, `file` or `keychain`.
    pub token_store: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Config {
    /// Load configuration from embedded config.toml with environment variable overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::from_toml_str(CONFIG_TOML)?;
        config.apply_env_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config.toml")
    }

    /// Apply `IRIS_*` and `RUST_LOG` overrides read through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(base_url) = lookup("IRIS_BASE_URL") {
            self.api.base_url = base_url;
        }

        if let Some(timeout) = lookup("IRIS_TIMEOUT_SECS") {
            self.api.timeout_secs = parse_var("IRIS_TIMEOUT_SECS", &timeout)?;
        }

        if let Some(retries) = lookup("IRIS_MAX_RETRIES") {
            self.retry.max_retries = parse_var("IRIS_MAX_RETRIES", &retries)?;
        }

        if let Some(delay) = lookup("IRIS_RETRY_DELAY_MS") {
            self.retry.base_delay_ms = parse_var("IRIS_RETRY_DELAY_MS", &delay)?;
        }

        if let Some(dedupe) = lookup("IRIS_DEDUPE") {
            self.api.dedupe = parse_var("IRIS_DEDUPE", &dedupe)?;
        }

        if let Some(store) = lookup("IRIS_TOKEN_STORE") {
            self.storage.token_store = store;
        }

        if let Some(log_level) = lookup("RUST_LOG") {
            self.logging.level = log_level;
        }

        Ok(())
    }

    /// Validate that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.api.base_url)
            .with_context(|| format!("Invalid api.base_url '{}'", self.api.base_url))?;

        if self.api.timeout_secs == 0 {
            anyhow::bail!("api.timeout_secs must be greater than zero");
        }

        if !self.api.refresh_endpoint.starts_with('/') {
            anyhow::bail!(
                "api.refresh_endpoint must start with '/' (got '{}')",
                self.api.refresh_endpoint
            );
        }

        self.token_store_kind()?;
        Ok(())
    }

    pub fn token_store_kind(&self) -> Result<TokenStoreKind> {
        TokenStoreKind::from_str(&self.storage.token_store).map_err(anyhow::Error::msg)
    }

    /// Options for the HTTP client.
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            base_url: self.api.base_url.clone(),
            timeout: Duration::from_secs(self.api.timeout_secs),
            connect_timeout: Duration::from_secs(self.api.connect_timeout_secs),
            refresh_endpoint: self.api.refresh_endpoint.clone(),
            max_retries: self.retry.max_retries,
            retry_delay: Duration::from_millis(self.retry.base_delay_ms),
            dedupe: self.api.dedupe,
            ..ClientOptions::default()
        }
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid {} '{}': {}", name, value, e))
}
