// Configuration module
// Centralized management of application configuration

use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};
use crate::text::DEFAULT_MAX_CHUNK_LENGTH;

pub mod layout;
pub mod persona;

pub use layout::DataLayout;
pub use persona::{Persona, PersonaCatalog};

/// Имя необязательного файла конфигурации в корне данных
pub const CONFIG_FILE_NAME: &str = "vidstories.json";

/// Модели, доступные для генерации текста
pub const AVAILABLE_MODELS: [&str; 3] = ["gpt-4o-mini", "gpt-4-turbo", "gpt-4o"];

/// Формат итогового аудио
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Mp3,
    Wav,
}

impl AudioFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub default_model: String,
    pub max_tokens: u32,
    /// База хоста TTS, к ней добавляется домен голоса (`co.uk`, `com`)
    pub tts_host_base: String,
    pub tts_language: String,
    pub image_base_url: String,
    pub root_dir: PathBuf,
    pub max_chunk_length: usize,
    pub video_fps: u32,
    pub max_workers: usize,
    pub image_concurrency: usize,
    pub request_timeout_secs: u64,
    pub audio_format: AudioFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            default_model: "gpt-4-turbo".to_string(),
            max_tokens: 2000,
            tts_host_base: "https://translate.google".to_string(),
            tts_language: "en".to_string(),
            image_base_url: "https://image.pollinations.ai/prompt/".to_string(),
            root_dir: PathBuf::from("."),
            max_chunk_length: DEFAULT_MAX_CHUNK_LENGTH,
            video_fps: 24,
            max_workers: 4,
            image_concurrency: 1,
            request_timeout_secs: 120,
            audio_format: AudioFormat::default(),
        }
    }
}

impl AppConfig {
    /// Загрузка конфигурации: файл в корне данных (если есть) + переменные окружения
    pub fn load(root_dir: Option<&Path>) -> AppResult<Self> {
        let root = root_dir
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("VIDSTORIES_ROOT").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("."));

        let config_path = root.join(CONFIG_FILE_NAME);
        let mut config = if config_path.exists() {
            info!("Загрузка конфигурации из {}", config_path.display());
            Self::from_file(&config_path)?
        } else {
            Self::default()
        };
        config.root_dir = root;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| {
            AppError::Configuration(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            self.openai_api_key = key;
        }
        if let Ok(model) = std::env::var("VIDSTORIES_MODEL") {
            self.default_model = model;
        }
        if let Ok(workers) = std::env::var("VIDSTORIES_WORKERS") {
            match workers.parse::<usize>() {
                Ok(n) => self.max_workers = n,
                Err(_) => warn!("VIDSTORIES_WORKERS is not a number: {}", workers),
            }
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.max_chunk_length == 0 {
            return Err(AppError::Configuration("max_chunk_length must be positive".into()));
        }
        if self.video_fps == 0 {
            return Err(AppError::Configuration("video_fps must be positive".into()));
        }
        if self.max_workers == 0 || self.image_concurrency == 0 {
            return Err(AppError::Configuration(
                "max_workers and image_concurrency must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn layout(&self) -> DataLayout {
        DataLayout::new(&self.root_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.max_tokens, 2000);
        assert_eq!(config.max_chunk_length, 500);
        assert_eq!(config.video_fps, 24);
        assert_eq!(config.default_model, "gpt-4-turbo");
        assert!(AVAILABLE_MODELS.contains(&config.default_model.as_str()));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, r#"{"max_chunk_length": 200, "audio_format": "wav"}"#).unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.max_chunk_length, 200);
        assert_eq!(config.audio_format, AudioFormat::Wav);
        assert_eq!(config.video_fps, 24);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let config = AppConfig {
            max_chunk_length: 0,
            ..AppConfig::default()
        };
        assert!(matches!(config.validate(), Err(AppError::Configuration(_))));
    }
}
