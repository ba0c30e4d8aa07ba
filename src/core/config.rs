//! Configuration management with layered hierarchy

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::error::{StoreError, StoreResult};
use crate::core::mapping::MappingOverrides;
use crate::core::store::DEFAULT_BUSY_TIMEOUT;

/// File name of the per-directory config
pub const LOCAL_CONFIG_FILE: &str = "reptracker.yaml";

/// Database used when nothing else is configured
pub const DEFAULT_DATABASE: &str = "reptracker.db";

/// Tracker configuration with layered hierarchy
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path of the SQLite database file
    pub database: Option<PathBuf>,

    /// Tracing filter directive (e.g. `info`, `reptracker=debug`)
    pub log_level: Option<String>,

    /// How long a writer waits on a locked database
    pub busy_timeout_ms: Option<u64>,

    /// Logical-to-physical column overrides, per table
    pub mappings: MappingOverrides,
}

impl Config {
    /// Load configuration from all sources, merging in priority order
    pub fn load() -> StoreResult<Self> {
        let mut config = Config::default();

        // 1. Built-in defaults (already in Default impl)

        // 2. Global user config (~/.config/reptracker/config.yaml)
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                config.merge(Self::read_file(&global_path)?);
            }
        }

        // 3. Local config (./reptracker.yaml)
        let local_path = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_path.exists() {
            config.merge(Self::read_file(&local_path)?);
        }

        // 4. Environment variables
        config.apply_env(|key| std::env::var(key).ok());

        Ok(config)
    }

    /// Parse one YAML config file
    pub fn read_file(path: &Path) -> StoreResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            StoreError::Configuration(format!("cannot read '{}': {}", path.display(), e))
        })?;
        serde_yml::from_str::<Config>(&contents).map_err(|e| {
            StoreError::Configuration(format!("cannot parse '{}': {}", path.display(), e))
        })
    }

    /// Get the path to the global config file
    fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "reptracker")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Apply `REPTRACKER_DB` and `REPTRACKER_LOG` from `lookup`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(db) = lookup("REPTRACKER_DB").filter(|v| !v.is_empty()) {
            self.database = Some(PathBuf::from(db));
        }
        if let Some(level) = lookup("REPTRACKER_LOG").filter(|v| !v.is_empty()) {
            self.log_level = Some(level);
        }
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: Config) {
        if other.database.is_some() {
            self.database = other.database;
        }
        if other.log_level.is_some() {
            self.log_level = other.log_level;
        }
        if other.busy_timeout_ms.is_some() {
            self.busy_timeout_ms = other.busy_timeout_ms;
        }
        for (table, columns) in other.mappings {
            self.mappings.entry(table).or_default().extend(columns);
        }
    }

    /// Database path, falling back to `reptracker.db` in the working directory
    pub fn database(&self) -> PathBuf {
        self.database
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE))
    }

    pub fn busy_timeout(&self) -> Duration {
        self.busy_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_BUSY_TIMEOUT)
    }
}
