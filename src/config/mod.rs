//! Tool configuration management for `geoconf.toml`.
//!
//! # Sections
//!
//! | Section      | Purpose                                                |
//! |--------------|--------------------------------------------------------|
//! | `[storage]`  | Base directories for rendered assets and raw uploads   |
//! | `[database]` | Path of the SQLite configuration database              |
//! | `[access]`   | Name of the distinguished public role                  |
//!
//! All relative paths are resolved against the config file's directory.
//! The loaded config is injected into the operation context per invocation;
//! it is never a process-wide mutable singleton.

mod error;

pub use error::ConfigError;

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::warn;

/// Subdirectory of the assets dir holding content-addressed style symbols.
pub const SYMBOLS_SUB_DIR: &str = "symbols";

/// Subdirectory of the assets dir holding print-layout resources.
pub const PRINT_SUB_DIR: &str = "print";

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing geoconf.toml
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Directory containing the config file (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    /// Asset and upload directories
    pub storage: StorageConfig,

    /// Configuration database settings
    pub database: DatabaseConfig,

    /// Access control settings
    pub access: AccessConfig,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::new(),
            root: PathBuf::new(),
            storage: StorageConfig::default(),
            database: DatabaseConfig::default(),
            access: AccessConfig::default(),
        }
    }
}

/// `[storage]` section: base directories for the two shared file trees.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base directory for rendered assets (symbols and print resources).
    pub assets_dir: PathBuf,

    /// Base directory for verbatim uploads.
    pub uploads_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from("assets"),
            uploads_dir: PathBuf::from("uploads"),
        }
    }
}

/// `[database]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path of the SQLite configuration database.
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("config.sqlite"),
        }
    }
}

/// `[access]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Name of the role whose grants apply to anonymous viewers.
    /// Permissions for this role get the lowest priority.
    pub public_role: String,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            public_role: "public".to_string(),
        }
    }
}

impl AdminConfig {
    /// Load configuration from a TOML file.
    ///
    /// Unknown keys are warned about, not rejected, so older configs keep
    /// working across releases.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;

        let deserializer = toml::Deserializer::new(&raw);
        let mut unknown = Vec::new();
        let mut config: Self = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            unknown.push(path.to_string());
        })?;

        for key in &unknown {
            warn!("config"; "unknown key `{}` in {}", key, path.display());
        }

        config.config_path = path.to_path_buf();
        config.root = path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

        config.validate()?;
        Ok(config)
    }

    /// Validate loaded values.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.access.public_role.trim().is_empty() {
            return Err(ConfigError::Validation(
                "access.public_role must not be empty".to_string(),
            ));
        }
        if self.storage.assets_dir == self.storage.uploads_dir {
            return Err(ConfigError::Validation(
                "storage.assets_dir and storage.uploads_dir must differ".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve a configured path against the config file's directory.
    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Directory for content-addressed style symbols.
    pub fn symbols_dir(&self) -> PathBuf {
        self.resolve(&self.storage.assets_dir).join(SYMBOLS_SUB_DIR)
    }

    /// Directory for print-layout resources.
    pub fn print_dir(&self) -> PathBuf {
        self.resolve(&self.storage.assets_dir).join(PRINT_SUB_DIR)
    }

    /// Directory for verbatim uploads.
    pub fn uploads_dir(&self) -> PathBuf {
        self.resolve(&self.storage.uploads_dir)
    }

    /// Path of the SQLite configuration database.
    pub fn db_path(&self) -> PathBuf {
        self.resolve(&self.database.path)
    }
}
