use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use dirs;
use crate::errors::{AppError, Result};
use crate::media::{OutputFormat, QualityTier};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub output_folder: Option<PathBuf>,
    pub last_format: OutputFormat,
    pub last_quality: QualityTier,
    pub last_enhancement: String,
    pub keep_metadata: bool,
    pub separate_stems: bool,
    pub watch_folder: Option<PathBuf>,
    pub stems: StemsConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StemsConfig {
    pub command: String,
    pub model: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            output_folder: None,
            last_format: OutputFormat::Mp3,
            last_quality: QualityTier::High,
            last_enhancement: "None".to_string(),
            keep_metadata: true,
            separate_stems: false,
            watch_folder: None,
            stems: StemsConfig::default(),
        }
    }
}

impl Default for StemsConfig {
    fn default() -> Self {
        Self {
            command: "spleeter".to_string(),
            model: "spleeter:2stems".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: AppConfig = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            let config = AppConfig::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| AppError::Validation("Config path has no parent".to_string()))?;

        if !config_dir.exists() {
            std::fs::create_dir_all(config_dir)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            AppError::Config(config::ConfigError::Message(
                "Could not find config directory".to_string(),
            ))
        })?;

        Ok(config_dir.join("ffx-convert").join("config.json"))
    }

    /// Effective ffmpeg path: the configured one wins, PATH is the fallback.
    pub fn resolve_ffmpeg(&self) -> Option<PathBuf> {
        self.ffmpeg_path
            .clone()
            .filter(|p| p.exists())
            .or_else(crate::media::find_ffmpeg)
    }
}
