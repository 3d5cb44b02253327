use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use log::info;
use serde::Deserialize;

use super::types::*;
use crate::error_handling::types::{ConfigError, StorageError};
use crate::storage::database_storage::DatabaseStorage;
use crate::storage::file_storage::FileStorage;
use crate::storage::storage_trait::Storage;

/// Application configuration, read from a TOML file.
///
/// Every section and key is optional; missing values take their defaults.
///
/// # Fields Overview
///
/// - `storage`: which store gateway backend to open and where
/// - `report`: where rendered charts go and how per-target failures are handled
/// - `web`: address and port of the read-only HTTP interface
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub report: ReportConfig,
    pub web: WebConfig,
}

/// Command-line overrides applied on top of the configuration file.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Storage backend to use
    ///
    /// # Command Line
    /// Use `--backend <database|file>` to set this value from the CLI
    #[arg(long, value_enum)]
    pub backend: Option<StorageBackend>,

    /// SQLite file, or directory for the file backend
    ///
    /// # Command Line
    /// Use `--storage-path <PATH>` or the `LOGINWATCH_STORAGE_PATH` variable
    #[arg(long, env = "LOGINWATCH_STORAGE_PATH")]
    pub storage_path: Option<PathBuf>,

    /// Directory receiving rendered charts
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Port of the web interface
    #[arg(long)]
    pub port: Option<u16>,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::TomlError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply(mut self, overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        if let Some(backend) = overrides.backend {
            self.storage.backend = backend;
        }
        if let Some(ref path) = overrides.storage_path {
            self.storage.path = path.clone();
        }
        if let Some(ref dir) = overrides.output_dir {
            self.report.output_dir = dir.clone();
        }
        if let Some(port) = overrides.port {
            self.web.port = port;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.web.port == 0 {
            return Err(ConfigError::InvalidValue("web.port must be non-zero".into()));
        }
        if self.report.output_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue(
                "report.output_dir must not be empty".into(),
            ));
        }
        if self.storage.path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue("storage.path must not be empty".into()));
        }
        self.web_address()?;
        Ok(())
    }

    pub fn web_address(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self.web.bind_address.parse().map_err(|_| {
            ConfigError::InvalidValue(format!("bad web.bind_address '{}'", self.web.bind_address))
        })?;
        Ok(SocketAddr::new(ip, self.web.port))
    }

    /// Open the configured store gateway.
    pub fn open_storage(&self) -> Result<Arc<dyn Storage>, StorageError> {
        info!(
            "Opening {:?} storage at {}",
            self.storage.backend,
            self.storage.path.display()
        );
        let storage: Arc<dyn Storage> = match self.storage.backend {
            StorageBackend::Database => Arc::new(DatabaseStorage::new_file(&self.storage.path)?),
            StorageBackend::File => Arc::new(FileStorage::new(&self.storage.path)?),
        };
        Ok(storage)
    }
}
