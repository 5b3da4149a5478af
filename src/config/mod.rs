// Configuration management for Encore
// Handles loading/saving settings, with sensible defaults when config is missing

use anyhow::Result;
use dirs::{config_dir, data_dir};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::library::SaveMode;
use crate::playback::RepeatMode;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub library: LibraryConfig,
    pub playback: PlaybackConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    pub path: PathBuf,
    pub save_mode: SaveMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub tick_interval_ms: u64,
    pub fallback_song_secs: u64,
    pub rotation_degrees_per_second: f64,
    pub repeat: RepeatMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub directory: PathBuf,
}

fn app_dir(base: Option<PathBuf>) -> PathBuf {
    base.unwrap_or_else(|| PathBuf::from(".")).join("encore")
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            path: app_dir(data_dir()).join("library.json"),
            save_mode: SaveMode::Immediate,
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 50,
            fallback_song_secs: 180,
            rotation_degrees_per_second: 90.0,
            repeat: RepeatMode::Off,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: app_dir(data_dir()).join("logs"),
        }
    }
}

impl Config {
    /// Load from the user config directory, writing defaults on first run.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;

        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let dir = config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?
            .join("encore");

        Ok(dir.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::EngineSettings;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_first_load_writes_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("encore").join("config.toml");

        let config = Config::load_from(&path).unwrap();

        assert_eq!(config, Config::default());
        assert!(path.exists());
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[playback]\ntick_interval_ms = 20\nrepeat = \"all\"\n\n[library]\nsave_mode = \"manual\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();

        assert_eq!(config.playback.tick_interval_ms, 20);
        assert_eq!(config.playback.repeat, RepeatMode::All);
        assert_eq!(config.playback.fallback_song_secs, 180);
        assert_eq!(config.library.save_mode, SaveMode::Manual);
        assert_eq!(config.library.path, LibraryConfig::default().path);
    }

    #[test]
    fn test_engine_settings_from_config() {
        let playback = PlaybackConfig {
            tick_interval_ms: 0,
            fallback_song_secs: 60,
            rotation_degrees_per_second: 45.0,
            repeat: RepeatMode::One,
        };
        let settings = EngineSettings::from(&playback);

        assert_eq!(settings.tick_interval, Duration::from_millis(1));
        assert_eq!(settings.fallback_song_length, Duration::from_secs(60));
        assert_eq!(settings.rotation_degrees_per_second, 45.0);
        assert_eq!(settings.repeat, RepeatMode::One);
    }
}
