//! Configuration management for the relay
//!
//! This module handles loading, validation, and environment overrides of the relay configuration.

pub mod models;
pub mod validation;

pub use models::*;
pub use validation::Validate;

use crate::utils::error::{RelayError, Result};
use std::path::Path;
use tracing::{debug, info};

/// Main configuration struct for the relay
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Relay configuration
    pub relay: RelayConfig,
}

impl Config {
    /// Load configuration from a YAML file, then apply environment overrides
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {:?}", path);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| RelayError::Config(format!("Failed to read config file: {}", e)))?;

        let mut config = Self::from_yaml(&content)?;
        config.relay.apply_env_overrides();
        config.validate()?;

        debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Parse configuration from YAML without touching the environment
    pub fn from_yaml(content: &str) -> Result<Self> {
        let relay: RelayConfig = serde_yaml::from_str(content)
            .map_err(|e| RelayError::Config(format!("Failed to parse config: {}", e)))?;
        Ok(Self { relay })
    }

    /// Load configuration from defaults and environment variables
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");

        let relay = RelayConfig::from_env()?;
        let config = Self { relay };

        config.validate()?;
        Ok(config)
    }

    pub fn server(&self) -> &ServerConfig {
        &self.relay.server
    }

    pub fn queue(&self) -> &QueueConfig {
        &self.relay.queue
    }

    pub fn webhook(&self) -> &WebhookConfig {
        &self.relay.webhook
    }

    pub fn feedback(&self) -> &FeedbackConfig {
        &self.relay.feedback
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        debug!("Validating configuration");
        self.relay
            .validate()
            .map_err(|e| RelayError::Config(format!("Invalid configuration: {}", e)))
    }

    /// Convert to YAML string
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(&self.relay)
            .map_err(|e| RelayError::Config(format!("Failed to serialize config to YAML: {}", e)))
    }
}
