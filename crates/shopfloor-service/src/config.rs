//! # Back-Office Configuration
//!
//! Where the stores live, how their pools are sized and how much to log.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     SHOPFLOOR_DATA_DIR=/var/lib/shopfloor                              │
//! │     SHOPFLOOR_IN_MEMORY=true                                           │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     $SHOPFLOOR_CONFIG, or                                              │
//! │     ~/.config/shopfloor/shopfloor.toml (Linux)                         │
//! │     ~/Library/Application Support/com.shopfloor.shopfloor/ (macOS)     │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     ./data, control_plane, 5 connections, 10s connect timeout          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [storage]
//! data_dir = "./data"
//! control_store = "control_plane"
//! in_memory = false
//!
//! [pool]
//! max_connections = 5
//! connect_timeout_secs = 10
//! idle_timeout_secs = 600
//!
//! [logging]
//! filter = "info"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use shopfloor_core::validation::check_store_name_shape;
use shopfloor_core::DEFAULT_CONTROL_STORE;
use shopfloor_db::RouterConfig;

use crate::error::{ServiceError, ServiceResult};

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "SHOPFLOOR_CONFIG";

// =============================================================================
// Storage Settings
// =============================================================================

/// Where tenant stores and the control plane are kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Directory holding one `{store_name}.db` file per store.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Reserved store name of the control plane.
    #[serde(default = "default_control_store")]
    pub control_store: String,

    /// Keep every store in process memory (demos and tests).
    #[serde(default)]
    pub in_memory: bool,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_control_store() -> String {
    DEFAULT_CONTROL_STORE.to_string()
}

impl Default for StorageSettings {
    fn default() -> Self {
        StorageSettings {
            data_dir: default_data_dir(),
            control_store: default_control_store(),
            in_memory: false,
        }
    }
}

// =============================================================================
// Pool Settings
// =============================================================================

/// Per-store connection pool sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSettings {
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Upper bound on establishing a store connection (seconds).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle connections are closed after this long (seconds).
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    5
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_idle_timeout() -> u64 {
    600
}

impl Default for PoolSettings {
    fn default() -> Self {
        PoolSettings {
            max_connections: default_max_connections(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

// =============================================================================
// Logging Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            filter: default_filter(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete back-office configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackofficeConfig {
    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub pool: PoolSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl BackofficeConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`config_path`, else `$SHOPFLOOR_CONFIG`, else the
    ///    platform config dir)
    /// 3. Environment variables
    ///
    /// A file named explicitly (argument or `$SHOPFLOOR_CONFIG`) must exist;
    /// the platform default may be absent.
    pub fn load(config_path: Option<PathBuf>) -> ServiceResult<Self> {
        let explicit = config_path.or_else(|| std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from));

        let mut config = match explicit {
            Some(path) => {
                info!(?path, "Loading config from file");
                Self::from_file(&path)?
            }
            None => match Self::default_config_path() {
                Some(path) if path.exists() => {
                    info!(?path, "Loading config from file");
                    Self::from_file(&path)?
                }
                Some(path) => {
                    debug!(?path, "Config file not found, using defaults");
                    Self::default()
                }
                None => Self::default(),
            },
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Parses a config file.
    pub fn from_file(path: &std::path::Path) -> ServiceResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ServiceError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&contents)
    }

    /// Parses TOML text; missing sections and keys take their defaults.
    pub fn from_toml(contents: &str) -> ServiceResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ServiceResult<()> {
        if !self.storage.in_memory && self.storage.data_dir.as_os_str().is_empty() {
            return Err(ServiceError::Config("storage.data_dir must not be empty".into()));
        }

        check_store_name_shape(&self.storage.control_store).map_err(|e| {
            ServiceError::Config(format!("storage.control_store: {}", e))
        })?;

        if self.pool.max_connections == 0 {
            return Err(ServiceError::Config(
                "pool.max_connections must be greater than 0".into(),
            ));
        }

        if self.pool.connect_timeout_secs == 0 {
            return Err(ServiceError::Config(
                "pool.connect_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.logging.filter.trim().is_empty() {
            return Err(ServiceError::Config("logging.filter must not be empty".into()));
        }

        Ok(())
    }

    /// Applies `SHOPFLOOR_*` overrides read through `lookup`.
    ///
    /// Unparseable values are logged and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("SHOPFLOOR_DATA_DIR") {
            debug!(data_dir = %dir, "Overriding data dir from environment");
            self.storage.data_dir = PathBuf::from(dir);
        }

        if let Some(name) = lookup("SHOPFLOOR_CONTROL_STORE") {
            self.storage.control_store = name;
        }

        if let Some(flag) = lookup("SHOPFLOOR_IN_MEMORY") {
            match flag.to_lowercase().as_str() {
                "1" | "true" | "yes" => self.storage.in_memory = true,
                "0" | "false" | "no" => self.storage.in_memory = false,
                _ => warn!(value = %flag, "Unknown SHOPFLOOR_IN_MEMORY value"),
            }
        }

        if let Some(max) = lookup("SHOPFLOOR_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(n) => self.pool.max_connections = n,
                Err(_) => warn!(value = %max, "Ignoring non-numeric SHOPFLOOR_MAX_CONNECTIONS"),
            }
        }

        if let Some(secs) = lookup("SHOPFLOOR_CONNECT_TIMEOUT_SECS") {
            match secs.parse::<u64>() {
                Ok(n) => self.pool.connect_timeout_secs = n,
                Err(_) => warn!(value = %secs, "Ignoring non-numeric SHOPFLOOR_CONNECT_TIMEOUT_SECS"),
            }
        }

        if let Some(filter) = lookup("SHOPFLOOR_LOG") {
            self.logging.filter = filter;
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "shopfloor", "shopfloor")
            .map(|dirs| dirs.config_dir().join("shopfloor.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Router settings derived from this configuration.
    pub fn router_config(&self) -> RouterConfig {
        let base = if self.storage.in_memory {
            RouterConfig::in_memory()
        } else {
            RouterConfig::new(&self.storage.data_dir)
        };

        base.control_store(&self.storage.control_store)
            .max_connections(self.pool.max_connections)
            .connect_timeout(Duration::from_secs(self.pool.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(self.pool.idle_timeout_secs))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.pool.connect_timeout_secs)
    }
}
