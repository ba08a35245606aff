use std::path::Path;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};

const DEFAULT_PERSONA: &str = "I am a friendly and free-thinking AI, here to assist and converse on a wide range of topics.";
const MISSING_CUSTOM_PERSONA: &str = "Custom persona file not found. Using default.";

/// Персона, задающая системный промпт для генерации текста
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Persona {
    #[default]
    Default,
    Custom,
}

impl Persona {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "Default",
            Self::Custom => "Custom",
        }
    }
}

impl std::str::FromStr for Persona {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "custom" => Ok(Self::Custom),
            other => Err(AppError::Validation(format!("Unknown persona: {}", other))),
        }
    }
}

/// Тексты персон, загруженные при старте
#[derive(Debug, Clone)]
pub struct PersonaCatalog {
    custom: String,
}

impl PersonaCatalog {
    /// Custom-персона читается из файла; при его отсутствии используется заглушка
    pub fn load(persona_path: &Path) -> Self {
        let custom = match std::fs::read_to_string(persona_path) {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!("Persona file {} unavailable: {}", persona_path.display(), e);
                MISSING_CUSTOM_PERSONA.to_string()
            }
        };
        Self { custom }
    }

    pub fn text(&self, persona: Persona) -> &str {
        match persona {
            Persona::Default => DEFAULT_PERSONA,
            Persona::Custom => &self.custom,
        }
    }
}
