//! # Costbook Configuration
//!
//! Where records are stored and who owns them.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     COSTBOOK_STORAGE_MODE=local                                        │
//! │     COSTBOOK_OWNER_ID=user-42                                          │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/costbook/costbook.toml (Linux)                           │
//! │     ~/Library/Application Support/app.costbook.costbook/costbook.toml  │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     remote storage, costbook.db, guest owner                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # costbook.toml
//! [database]
//! path = "costbook.db"
//! max_connections = 5
//! min_connections = 1
//! connect_timeout_secs = 30
//!
//! [storage]
//! mode = "remote"        # remote | local
//! local_path = "costbook-local.json"
//! coalesce_window_ms = 400
//!
//! [owner]
//! id = "guest"
//! ```
//!
//! User preferences (currency, rounding, default percentages) are not part of
//! this file; they live in the record store as `AppSettings`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::coalesce::DEFAULT_COALESCE_WINDOW_MS;
use crate::error::{DbError, DbResult};
use crate::local::GUEST_OWNER_ID;
use crate::pool::DbConfig;

// =============================================================================
// Storage Mode
// =============================================================================

/// Which record store backs the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    /// SQLite repositories, records scoped by the configured owner.
    #[default]
    Remote,

    /// A single JSON file for a signed-out guest.
    Local,
}

impl std::fmt::Display for StorageMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageMode::Remote => write!(f, "remote"),
            StorageMode::Local => write!(f, "local"),
        }
    }
}

impl std::str::FromStr for StorageMode {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "remote" | "sqlite" | "db" => Ok(StorageMode::Remote),
            "local" | "guest" | "file" => Ok(StorageMode::Local),
            other => Err(DbError::Config(format!(
                "Unknown storage mode: '{other}'. Valid options: remote, local"
            ))),
        }
    }
}

// =============================================================================
// Sections
// =============================================================================

/// `[database]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file path.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("costbook.db")
}

fn default_max_connections() -> u32 {
    5
}

fn default_min_connections() -> u32 {
    1
}

fn default_connect_timeout() -> u64 {
    30
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default)]
    pub mode: StorageMode,

    /// JSON file used in local mode.
    #[serde(default = "default_local_path")]
    pub local_path: PathBuf,

    /// How long an edit must sit untouched before it is written.
    #[serde(default = "default_coalesce_window")]
    pub coalesce_window_ms: u64,
}

fn default_local_path() -> PathBuf {
    PathBuf::from("costbook-local.json")
}

fn default_coalesce_window() -> u64 {
    DEFAULT_COALESCE_WINDOW_MS
}

impl Default for StorageSettings {
    fn default() -> Self {
        StorageSettings {
            mode: StorageMode::default(),
            local_path: default_local_path(),
            coalesce_window_ms: default_coalesce_window(),
        }
    }
}

/// `[owner]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerSettings {
    #[serde(default = "default_owner_id")]
    pub id: String,
}

fn default_owner_id() -> String {
    GUEST_OWNER_ID.to_string()
}

impl Default for OwnerSettings {
    fn default() -> Self {
        OwnerSettings {
            id: default_owner_id(),
        }
    }
}

// =============================================================================
// Costbook Config
// =============================================================================

/// Complete configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostbookConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub owner: OwnerSettings,
}

impl CostbookConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (costbook.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> DbResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading costbook config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents).map_err(|e| DbError::Config(e.to_string()))?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load costbook config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> DbResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| DbError::Config("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self).map_err(|e| DbError::Config(e.to_string()))?;
        std::fs::write(&path, contents)?;

        info!(?path, "Costbook config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> DbResult<()> {
        let db = &self.database;
        if db.max_connections == 0 {
            return Err(DbError::Config("max_connections must be greater than 0".into()));
        }
        if db.min_connections > db.max_connections {
            return Err(DbError::Config(format!(
                "min_connections ({}) exceeds max_connections ({})",
                db.min_connections, db.max_connections
            )));
        }

        if self.storage.coalesce_window_ms == 0 {
            return Err(DbError::Config(
                "coalesce_window_ms must be greater than 0".into(),
            ));
        }

        if self.owner.id.trim().is_empty() {
            return Err(DbError::Config("owner id must not be empty".into()));
        }

        Ok(())
    }

    /// Applies `COSTBOOK_*` overrides read through `lookup`.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("COSTBOOK_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(mode) = lookup("COSTBOOK_STORAGE_MODE") {
            match mode.parse() {
                Ok(parsed) => self.storage.mode = parsed,
                Err(_) => warn!(mode = %mode, "Unknown storage mode in environment"),
            }
        }

        if let Some(path) = lookup("COSTBOOK_LOCAL_PATH") {
            self.storage.local_path = PathBuf::from(path);
        }

        if let Some(window) = lookup("COSTBOOK_COALESCE_MS") {
            if let Ok(ms) = window.parse::<u64>() {
                debug!(ms, "Overriding coalesce window from environment");
                self.storage.coalesce_window_ms = ms;
            }
        }

        if let Some(id) = lookup("COSTBOOK_OWNER_ID") {
            self.owner.id = id;
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("app", "costbook", "costbook")
            .map(|dirs| dirs.config_dir().join("costbook.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Pool settings for the `[database]` section.
    pub fn to_db_config(&self) -> DbConfig {
        DbConfig::new(self.database.path.clone())
            .max_connections(self.database.max_connections)
            .min_connections(self.database.min_connections)
            .connect_timeout(Duration::from_secs(self.database.connect_timeout_secs))
    }

    pub fn coalesce_window(&self) -> Duration {
        Duration::from_millis(self.storage.coalesce_window_ms)
    }

    pub fn owner_id(&self) -> &str {
        &self.owner.id
    }

    pub fn mode(&self) -> StorageMode {
        self.storage.mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_storage_mode_parsing() {
        assert_eq!("remote".parse::<StorageMode>().unwrap(), StorageMode::Remote);
        assert_eq!("LOCAL".parse::<StorageMode>().unwrap(), StorageMode::Local);
        assert_eq!("guest".parse::<StorageMode>().unwrap(), StorageMode::Local);
        assert!("cloud".parse::<StorageMode>().is_err());
    }

    #[test]
    fn test_default_config() {
        let config = CostbookConfig::default();
        assert_eq!(config.mode(), StorageMode::Remote);
        assert_eq!(config.owner_id(), GUEST_OWNER_ID);
        assert_eq!(config.coalesce_window(), Duration::from_millis(400));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = CostbookConfig::default();

        config.database.max_connections = 0;
        assert!(config.validate().is_err());

        config.database.max_connections = 2;
        config.database.min_connections = 3;
        assert!(config.validate().is_err());

        config.database.min_connections = 1;
        config.storage.coalesce_window_ms = 0;
        assert!(config.validate().is_err());

        config.storage.coalesce_window_ms = 50;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("COSTBOOK_STORAGE_MODE", "local"),
            ("COSTBOOK_LOCAL_PATH", "/tmp/guest.json"),
            ("COSTBOOK_COALESCE_MS", "not-a-number"),
            ("COSTBOOK_OWNER_ID", "user-42"),
        ]);

        let mut config = CostbookConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.mode(), StorageMode::Local);
        assert_eq!(config.storage.local_path, PathBuf::from("/tmp/guest.json"));
        assert_eq!(config.storage.coalesce_window_ms, 400);
        assert_eq!(config.owner_id(), "user-42");
        assert_eq!(config.database.path, PathBuf::from("costbook.db"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: CostbookConfig = toml::from_str(
            r#"
            [storage]
            mode = "local"
            "#,
        )
        .unwrap();

        assert_eq!(config.mode(), StorageMode::Local);
        assert_eq!(config.storage.coalesce_window_ms, 400);
        assert_eq!(config.database.max_connections, 5);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("costbook.toml");

        let mut config = CostbookConfig::default();
        config.owner.id = "user-7".into();
        config.storage.coalesce_window_ms = 250;
        config.save(Some(path.clone())).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[database]"));
        assert!(contents.contains("[storage]"));

        let loaded: CostbookConfig = toml::from_str(&contents).unwrap();
        assert_eq!(loaded.owner_id(), "user-7");
        assert_eq!(loaded.storage.coalesce_window_ms, 250);
    }

    #[test]
    fn test_to_db_config() {
        let mut config = CostbookConfig::default();
        config.database.max_connections = 8;
        let db = config.to_db_config();
        assert_eq!(db.max_connections, 8);
        assert_eq!(db.database_path, PathBuf::from("costbook.db"));
    }
}
