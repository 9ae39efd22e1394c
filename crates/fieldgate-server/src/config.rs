// File: src/config.rs
// Purpose: Server configuration parsing from fieldgate.toml with environment overrides

use anyhow::{Context, Result};
use fieldgate_runtime::RuntimeConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub runtime: RuntimeConfig,

    #[serde(default)]
    pub messages: MessagesConfig,

    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

/// Message catalog overrides
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MessagesConfig {
    /// TOML file merged over the built-in catalog
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DatabaseConfig {
    /// SQLite URL for uniqueness lookups; in-memory lookups when unset
    #[serde(default)]
    pub url: Option<String>,
}

fn default_port() -> u16 {
    3000
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Missing or empty file means defaults
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    /// Load configuration from default path (./fieldgate.toml)
    pub fn load_default() -> Result<Self> {
        Self::load("fieldgate.toml")
    }

    /// Apply `FIELDGATE_HOST`, `FIELDGATE_PORT`, `FIELDGATE_RATE_PER_SEC`,
    /// `FIELDGATE_BURST` and `DATABASE_URL` from the process environment
    pub fn with_env_overrides(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::with_env_overrides`] with an explicit variable source.
    /// Unparsable numbers keep the configured value.
    pub fn apply_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(host) = var("FIELDGATE_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("FIELDGATE_PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }
        if let Some(rate) = var("FIELDGATE_RATE_PER_SEC").and_then(|v| v.parse().ok()) {
            self.runtime.rate_per_sec = rate;
        }
        if let Some(burst) = var("FIELDGATE_BURST").and_then(|v| v.parse().ok()) {
            self.runtime.burst = burst;
        }
        if let Some(url) = var("DATABASE_URL").filter(|v| !v.trim().is_empty()) {
            self.database.url = Some(url);
        }
        self
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.runtime.burst, 10);
        assert!(config.messages.path.is_none());
        assert!(config.database.url.is_none());
    }

    #[test]
    fn test_missing_file_returns_defaults() {
        let config = Config::load("does-not-exist.toml").unwrap();
        assert_eq!(config.address(), "127.0.0.1:3000");
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 8080

            [runtime]
            burst = 3
            cache_ttl_secs = 60

            [messages]
            path = "messages.toml"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.runtime.burst, 3);
        assert_eq!(config.runtime.cache_ttl_secs, 60);
        assert_eq!(config.runtime.rate_per_sec, 5.0);
        assert_eq!(config.messages.path.as_deref(), Some("messages.toml"));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("FIELDGATE_PORT", "9000"),
            ("FIELDGATE_BURST", "not-a-number"),
            ("DATABASE_URL", "sqlite::memory:"),
        ]
        .into_iter()
        .collect();

        let config = Config::default().apply_overrides(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.runtime.burst, 10);
        assert_eq!(config.database.url.as_deref(), Some("sqlite::memory:"));
    }
}
