use anyhow::{Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub general: GeneralConfig,
}

#[derive(Debug, Deserialize)]
pub struct GeneralConfig {
    /// Absolute path to known_audio_plugins.json. Empty means auto-detect
    /// from the MuseScore 4 data directory for this OS.
    pub registry_path: String,
}

impl AppConfig {
    /// Load configuration with layering: defaults → user config.
    pub fn load() -> Result<Self> {
        let defaults = include_str!("../../config/default.toml");
        let mut config: AppConfig = toml::from_str(defaults)?;

        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "vstman") {
            let config_path = proj_dirs.config_dir().join("config.toml");
            if config_path.exists() {
                let user_str = fs::read_to_string(&config_path)?;
                config = toml::from_str(&user_str)?;
            }
        }

        Ok(config)
    }

    /// Resolve the registry file location: the configured path when one
    /// is set (with `~` expansion), otherwise the MuseScore 4 per-user
    /// data directory — %LOCALAPPDATA% on Windows, ~/Library/Application
    /// Support on macOS, ~/.local/share on Linux.
    pub fn registry_path(&self) -> Result<PathBuf> {
        let configured = self.general.registry_path.trim();
        if !configured.is_empty() {
            return expand_tilde(configured);
        }

        directories::BaseDirs::new()
            .map(|dirs| {
                dirs.data_local_dir()
                    .join("MuseScore")
                    .join("MuseScore4")
                    .join("known_audio_plugins.json")
            })
            .ok_or_else(|| anyhow!("cannot determine the MuseScore data directory"))
    }
}

fn expand_tilde(path: &str) -> Result<PathBuf> {
    if !path.starts_with('~') {
        return Ok(PathBuf::from(path));
    }

    let home = directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().to_path_buf())
        .ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(PathBuf::from(
        path.replacen('~', &home.to_string_lossy(), 1),
    ))
}
