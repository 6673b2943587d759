//! Configuration management for the RAX network file service
//!
//! One `ServiceConfig` covers the naming server, the storage server and the
//! client gateway. Values come from built-in defaults, then an optional
//! `config.toml`, then `RAX_NFS_*` environment overrides
//! (e.g. `RAX_NFS_NAMING__PORT=5001`).

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Complete service configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ServiceConfig {
    pub naming: NamingConfig,
    pub storage: StorageConfig,
    pub gateway: GatewayConfig,
}

/// Naming server settings
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NamingConfig {
    /// IP address the naming server binds and clients dial
    pub host: String,
    pub port: u16,

    /// Connections beyond this are turned away as busy
    pub max_clients: usize,

    /// Longest accepted command line, content included
    pub max_command_length: usize,

    pub max_username_length: usize,
    pub max_path_depth: usize,

    /// Longest wait for path locks before a command fails with a conflict;
    /// 0 waits indefinitely
    pub lock_timeout_secs: u64,

    /// Largest size a file may reach through CREATE or WRITE
    pub max_file_size: u64,

    /// Snapshot of users and the namespace, reloaded at startup.
    /// Not used with memory storage.
    pub registry_file: String,
}

/// Where file bytes live
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// Files under `storage_root`, inside the naming server process
    Local,
    /// Process memory only
    Memory,
    /// A separate storage server reached at `host:port`
    Remote,
}

/// Storage server settings
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    pub host: String,
    pub port: u16,
    pub storage_root: String,
    pub mode: StorageMode,
}

/// Client gateway retry envelope
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GatewayConfig {
    pub max_retries: usize,
    pub retry_delay_ms: u64,
    pub connect_timeout_secs: u64,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            max_clients: 100,
            max_command_length: 16 * 1024 * 1024,
            max_username_length: 64,
            max_path_depth: 32,
            lock_timeout_secs: 30,
            max_file_size: 256 * 1024 * 1024,
            registry_file: "./storage_root/registry.json".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7000,
            storage_root: "./storage_root".to_string(),
            mode: StorageMode::Local,
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_delay_ms: 200,
            connect_timeout_secs: 5,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from config.toml with environment overrides
    pub fn load() -> Result<Self, config::ConfigError> {
        let defaults = Config::try_from(&ServiceConfig::default())?;

        let settings = Config::builder()
            .add_source(defaults)
            // Packaged layout first, then local development
            .add_source(File::with_name("rax-nfs/config").required(false))
            .add_source(File::with_name("config").required(false))
            .add_source(
                Environment::with_prefix("RAX_NFS")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: ServiceConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.naming.port == 0 || self.storage.port == 0 {
            return Err(config::ConfigError::Message("Ports cannot be 0".into()));
        }

        if self.naming.max_clients == 0 {
            return Err(config::ConfigError::Message(
                "max_clients must be greater than 0".into(),
            ));
        }

        if self.storage.mode == StorageMode::Local && self.storage.storage_root.is_empty() {
            return Err(config::ConfigError::Message(
                "storage_root cannot be empty".into(),
            ));
        }

        if self.naming.max_file_size == 0 {
            return Err(config::ConfigError::Message(
                "max_file_size must be greater than 0".into(),
            ));
        }

        if self.gateway.max_retries == 0 {
            return Err(config::ConfigError::Message(
                "max_retries must be greater than 0".into(),
            ));
        }

        Ok(())
    }
}

impl NamingConfig {
    /// Naming server address as `host:port`
    pub fn socket(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn lock_timeout(&self) -> Option<Duration> {
        (self.lock_timeout_secs > 0).then(|| Duration::from_secs(self.lock_timeout_secs))
    }

    pub fn registry_path(&self) -> PathBuf {
        PathBuf::from(&self.registry_file)
    }
}

impl StorageConfig {
    /// Storage server address as `host:port`
    pub fn socket(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn storage_root_path(&self) -> PathBuf {
        PathBuf::from(&self.storage_root)
    }
}

impl GatewayConfig {
    /// Delay before retry number `attempt` (1-based); grows linearly.
    pub fn backoff(&self, attempt: usize) -> Duration {
        Duration::from_millis(self.retry_delay_ms.saturating_mul(attempt as u64))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
