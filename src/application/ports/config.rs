//! Configuration storage port

use async_trait::async_trait;
use std::path::PathBuf;

use crate::domain::config::AppConfig;
use crate::domain::error::ConfigError;

/// Loads and persists [`AppConfig`]
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Read the stored config. A missing file yields an empty config.
    async fn load(&self) -> Result<AppConfig, ConfigError>;

    /// Write the config, creating parent directories as needed
    async fn save(&self, config: &AppConfig) -> Result<(), ConfigError>;

    fn path(&self) -> PathBuf;

    fn exists(&self) -> bool;

    /// Write a config populated with defaults.
    /// Returns `ConfigError::AlreadyExists` if a file is present.
    async fn init(&self) -> Result<(), ConfigError>;
}
