//! Configuration management.

use dreambot_net::{
    BackoffRule, ClientSettings, DEFAULT_MAX_BACKOFF_SECS, DebugScopes, NetworkClient, USER_AGENT,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::persistence::{default_config_path, load_json, save_json};

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Outbound HTTP settings.
    #[serde(default)]
    pub network: NetworkConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Outbound HTTP settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkConfig {
    /// Backoff ceiling in seconds for endpoints without an explicit rule.
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// User agent override.
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Debug scopes enabled at startup.
    #[serde(default)]
    pub debug_scopes: Vec<String>,
    /// Patterns grouping several URLs under one backoff state.
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

/// A pre-registered backoff rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleConfig {
    /// Regular expression searched for in request URLs.
    pub pattern: String,
    /// Ceiling for this rule; defaults to the network-wide ceiling.
    #[serde(default)]
    pub max_backoff_secs: Option<u64>,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Default log level for the bot's own crates.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_max_backoff_secs() -> u64 {
    DEFAULT_MAX_BACKOFF_SECS
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            max_backoff_secs: default_max_backoff_secs(),
            timeout_secs: default_timeout_secs(),
            user_agent: None,
            debug_scopes: Vec::new(),
            rules: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Loads configuration from the default path.
    pub async fn load() -> Result<Self, StoreError> {
        Self::load_from(&default_config_path()).await
    }

    /// Loads and validates configuration, using defaults if the file is
    /// missing.
    pub async fn load_from(path: &Path) -> Result<Self, StoreError> {
        let config: Config = match load_json(path).await {
            Ok(config) => config,
            Err(e) if e.is_not_found() => {
                debug!(path = %path.display(), "Config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e),
        };

        config.validate()?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Saves configuration to the default path.
    pub async fn save(&self) -> Result<(), StoreError> {
        self.save_to(&default_config_path()).await
    }

    /// Saves configuration to a specific path.
    pub async fn save_to(&self, path: &Path) -> Result<(), StoreError> {
        self.validate()?;
        save_json(path, self).await?;
        info!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Checks values the network layer cannot work with.
    pub fn validate(&self) -> Result<(), StoreError> {
        let network = &self.network;

        if network.timeout_secs == 0 {
            return Err(StoreError::Config("timeout_secs must be positive".into()));
        }
        if network.max_backoff_secs == 0 {
            return Err(StoreError::Config("max_backoff_secs must be positive".into()));
        }

        for rule in &network.rules {
            if rule.max_backoff_secs == Some(0) {
                return Err(StoreError::Config(format!(
                    "rule `{}`: max_backoff_secs must be positive",
                    rule.pattern
                )));
            }
            BackoffRule::new(&rule.pattern, 1)
                .map_err(|e| StoreError::Config(e.to_string()))?;
        }

        Ok(())
    }
}

impl NetworkConfig {
    /// Client construction settings.
    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            default_max_backoff_secs: self.max_backoff_secs,
            timeout: Duration::from_secs(self.timeout_secs),
            user_agent: self
                .user_agent
                .clone()
                .unwrap_or_else(|| USER_AGENT.to_string()),
        }
    }

    /// Builds a client with the configured rules registered and debug
    /// scopes enabled on `scopes`.
    pub fn build_client(&self, scopes: &DebugScopes) -> Result<NetworkClient, StoreError> {
        let client = NetworkClient::with_settings(&self.client_settings())?
            .with_scopes(scopes.clone());
        self.apply(&client)?;

        for scope in &self.debug_scopes {
            scopes.enable(scope.as_str());
        }

        Ok(client)
    }

    /// Registers the configured rules on an existing client.
    pub fn apply(&self, client: &NetworkClient) -> Result<(), StoreError> {
        for rule in &self.rules {
            let max = rule.max_backoff_secs.unwrap_or(self.max_backoff_secs);
            client.registry().register_with_max(&rule.pattern, max)?;
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_with_rule(pattern: &str) -> Config {
        let mut config = Config::default();
        config.network.rules.push(RuleConfig {
            pattern: pattern.to_string(),
            max_backoff_secs: Some(600),
        });
        config
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.network.max_backoff_secs, 14_400);
        assert_eq!(config.network.timeout_secs, 30);
        assert_eq!(config.logging.level, "warn");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"network": {"max_backoff_secs": 240}}"#).unwrap();
        assert_eq!(config.network.max_backoff_secs, 240);
        assert_eq!(config.network.timeout_secs, 30);
        assert!(config.network.rules.is_empty());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.network.timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.network.max_backoff_secs = 0;
        assert!(config.validate().is_err());

        assert!(config_with_rule("(unclosed").validate().is_err());
        assert!(config_with_rule(r"^https://api\.example/").validate().is_ok());
    }

    #[test]
    fn test_client_settings() {
        let mut network = NetworkConfig::default();
        network.timeout_secs = 5;
        network.user_agent = Some("custom".to_string());

        let settings = network.client_settings();
        assert_eq!(settings.timeout, Duration::from_secs(5));
        assert_eq!(settings.user_agent, "custom");
        assert_eq!(settings.default_max_backoff_secs, 14_400);
    }

    #[test]
    fn test_build_client_registers_rules_and_scopes() {
        let mut config = config_with_rule(r"^https://prices\.example/");
        config.network.debug_scopes.push("network".to_string());

        let scopes = DebugScopes::new();
        let client = config.network.build_client(&scopes).unwrap();

        assert_eq!(client.registry().len(), 1);
        let rule = client.registry().rule_for("https://prices.example/item/1");
        assert_eq!(rule.state().max_backoff_secs(), 600);
        assert!(scopes.is_enabled("network"));
        assert!(client.scopes().is_enabled("network"));
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");

        let config = config_with_rule("wiki");
        config.save_to(&path).await.unwrap();

        let loaded = Config::load_from(&path).await.unwrap();
        assert_eq!(loaded, config);
    }

    #[tokio::test]
    async fn test_load_missing_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let loaded = Config::load_from(&temp_dir.path().join("none.json"))
            .await
            .unwrap();
        assert_eq!(loaded, Config::default());
    }

    #[tokio::test]
    async fn test_load_invalid_fails() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        tokio::fs::write(&path, r#"{"network": {"timeout_secs": 0}}"#)
            .await
            .unwrap();

        assert!(matches!(
            Config::load_from(&path).await,
            Err(StoreError::Config(_))
        ));
    }
}
