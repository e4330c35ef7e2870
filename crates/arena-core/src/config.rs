//! Configuration resolution for Arena.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/arena/settings.json)
//! 3. Environment variables (highest priority)
//!
//! Bonus values configured here are *fallback defaults*; the live values
//! are read from the persisted `settings` table, which the core never
//! writes.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Complete Arena configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub bonus: BonusConfig,
}

/// Database and logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
    pub log_level: String,
    pub log_json: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

/// Fallback defaults for the promotional bonuses.
///
/// Amounts are in minor currency units. `referral_bonus_percent` is the
/// percentage of a referred user's first approved deposit credited to the
/// referrer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BonusConfig {
    pub signup_bonus: i64,
    pub referral_bonus_percent: i64,
}

impl Default for BonusConfig {
    fn default() -> Self {
        Self {
            signup_bonus: 0,
            referral_bonus_percent: 5,
        }
    }
}

/// Load configuration with hierarchical resolution.
pub fn load_config() -> Result<Config> {
    let mut config = Config::default();

    // Load global config
    if let Some(global_path) = global_config_path() {
        if global_path.exists() {
            let global = load_config_file(&global_path)?;
            merge_config(&mut config, global);
        }
    }

    // Apply environment overrides
    apply_env_overrides(&mut config);

    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .ok()
            .map(|h| PathBuf::from(h).join(".arena").join("settings.json"))
    }
    #[cfg(target_os = "macos")]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join("Library/Application Support/arena/settings.json"))
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".config")))
            .map(|p| p.join("arena").join("settings.json"))
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        None
    }
}

fn load_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

fn merge_config(base: &mut Config, overlay: Config) {
    if overlay.database.path.is_some() {
        base.database.path = overlay.database.path;
    }
    base.database.log_level = overlay.database.log_level;
    base.database.log_json = overlay.database.log_json;
    base.bonus = overlay.bonus;
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(val) = std::env::var("ARENA_DATABASE_PATH") {
        config.database.path = Some(PathBuf::from(val));
    }
    if let Ok(val) = std::env::var("ARENA_LOG_LEVEL") {
        config.database.log_level = val;
    }
    if let Ok(val) = std::env::var("ARENA_SIGNUP_BONUS") {
        if let Ok(n) = val.parse() {
            config.bonus.signup_bonus = n;
        }
    }
    if let Ok(val) = std::env::var("ARENA_REFERRAL_BONUS_PERCENT") {
        if let Ok(n) = val.parse() {
            config.bonus.referral_bonus_percent = n;
        }
    }
}
