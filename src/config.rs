//! Coordinator configuration and application paths.
//!
//! Thresholds and policies are configuration, not constants: the
//! drag-dismiss distance/velocity and the autoplay policy differ per product
//! surface. Everything has a documented default, and a missing file means
//! defaults.
//!
//! # Path priority
//!
//! 1. CLI `--config-dir`
//! 2. `ONEPLAY_CONFIG_DIR` environment variable
//! 3. Local folder IF config files exist there (oneplay.json, oneplay.log)
//! 4. Platform directory from dirs-next

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::drag::DragConfig;

pub const CONFIG_FILE: &str = "oneplay.json";
pub const LOG_FILE: &str = "oneplay.log";
const APP_DIR: &str = "oneplay";

/// Coordinator policies.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Period of the progress observer.
    pub tick_interval_ms: u64,
    /// Start playing as soon as preparation succeeds.
    pub autoplay: bool,
    /// Step for skip forward/backward.
    pub skip_seconds: f64,
    /// Resume on foreground when backgrounding paused a playing session.
    pub resume_on_foreground: bool,
    /// New sessions keep the previous session's mute setting.
    pub inherit_mute: bool,
    pub drag: DragConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            autoplay: true,
            skip_seconds: 10.0,
            resume_on_foreground: true,
            inherit_mute: true,
            drag: DragConfig::default(),
        }
    }
}

impl CoordinatorConfig {
    /// Load from a JSON file. A missing file yields defaults; unreadable or
    /// malformed files are errors.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, raw)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }
}

/// Configuration for overriding default application paths
#[derive(Debug, Clone)]
pub struct PathConfig {
    /// Custom config directory (from CLI or ENV)
    pub config_dir: Option<PathBuf>,
}

impl PathConfig {
    /// Priority: CLI args → ENV var (ONEPLAY_CONFIG_DIR) → None (use defaults)
    pub fn from_env_and_cli(cli_dir: Option<PathBuf>) -> Self {
        let config_dir = cli_dir.or_else(|| {
            std::env::var("ONEPLAY_CONFIG_DIR")
                .ok()
                .map(PathBuf::from)
        });

        Self { config_dir }
    }
}

/// Path to a configuration file
///
/// Platform paths:
/// - Linux: ~/.config/oneplay/{name}
/// - macOS: ~/Library/Application Support/oneplay/{name}
/// - Windows: %APPDATA%\oneplay\{name}
pub fn config_file(name: &str, config: &PathConfig) -> PathBuf {
    get_dir(config, dirs_next::config_dir()).join(name)
}

/// Path to a data file (logs)
///
/// - Linux: ~/.local/share/oneplay/{name}
pub fn data_file(name: &str, config: &PathConfig) -> PathBuf {
    get_dir(config, dirs_next::data_dir()).join(name)
}

/// Ensure that configuration and data directories exist
pub fn ensure_dirs(config: &PathConfig) -> Result<()> {
    let config_dir = get_dir(config, dirs_next::config_dir());
    let data_dir = get_dir(config, dirs_next::data_dir());

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)
            .with_context(|| format!("Failed to create config directory: {}", config_dir.display()))?;
    }

    if data_dir != config_dir && !data_dir.exists() {
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
    }

    Ok(())
}

fn has_local_config_files(dir: &Path) -> bool {
    [CONFIG_FILE, LOG_FILE].iter().any(|f| dir.join(f).exists())
}

fn get_dir(config: &PathConfig, platform: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = &config.config_dir {
        return dir.clone();
    }

    if let Ok(current_dir) = std::env::current_dir() {
        if has_local_config_files(&current_dir) {
            return current_dir;
        }
    }

    if let Some(dir) = platform {
        return dir.join(APP_DIR);
    }

    PathBuf::from(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_file_with_custom_dir() {
        let config = PathConfig {
            config_dir: Some(PathBuf::from("/custom")),
        };

        assert_eq!(config_file("test.json", &config), PathBuf::from("/custom/test.json"));
        assert_eq!(data_file("oneplay.log", &config), PathBuf::from("/custom/oneplay.log"));
    }

    #[test]
    fn test_cli_dir_beats_env() {
        let config = PathConfig::from_env_and_cli(Some(PathBuf::from("/from-cli")));
        assert_eq!(config.config_dir, Some(PathBuf::from("/from-cli")));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = CoordinatorConfig::load(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(cfg, CoordinatorConfig::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, r#"{ "autoplay": false, "drag": { "dismiss_velocity": 500.0 } }"#).unwrap();

        let cfg = CoordinatorConfig::load(&path).unwrap();
        assert!(!cfg.autoplay);
        assert_eq!(cfg.tick_interval_ms, 100);
        assert_eq!(cfg.drag.dismiss_velocity, 500.0);
        assert_eq!(cfg.drag.travel_range, 250.0);
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "{ not json").unwrap();

        let err = CoordinatorConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let cfg = CoordinatorConfig {
            skip_seconds: 15.0,
            ..CoordinatorConfig::default()
        };
        cfg.save(&path).unwrap();
        assert_eq!(CoordinatorConfig::load(&path).unwrap(), cfg);
    }
}
