// Error handling module
// Contains the application error type and its classification for events

use serde::Serialize;
use thiserror::Error;

// Application error type
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Ошибка внешнего сервиса: {0}")]
    Service(String),

    #[error("Ошибка файловой системы: {0}")]
    FileSystem(String),

    #[error("Некорректный ввод: {0}")]
    Validation(String),

    #[error("Сервис не вернул содержимое: {0}")]
    PartialContent(String),

    #[error("Ошибка обработки аудио: {0}")]
    AudioProcessing(String),

    #[error("Ошибка конфигурации: {0}")]
    Configuration(String),

    #[error("Ошибка сериализации: {0}")]
    Serialization(String),

    #[error("Другая ошибка: {0}")]
    Other(String),
}

/// Класс ошибки, который видит потребитель событий
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Service,
    FileSystem,
    Validation,
    PartialContent,
    Configuration,
    Other,
}

impl AppError {
    /// Классификация ошибки для уведомления пользователя.
    ///
    /// Ошибки обработки аудио считаются сбоем этапа, как и сбой сервиса.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Service(_) | AppError::AudioProcessing(_) => ErrorKind::Service,
            AppError::FileSystem(_) => ErrorKind::FileSystem,
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::PartialContent(_) => ErrorKind::PartialContent,
            AppError::Configuration(_) => ErrorKind::Configuration,
            AppError::Serialization(_) | AppError::Other(_) => ErrorKind::Other,
        }
    }
}

// Реализация трейтов From для различных типов ошибок
impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Service(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::FileSystem(err.to_string())
    }
}

impl From<tempfile::PersistError> for AppError {
    fn from(err: tempfile::PersistError) -> Self {
        AppError::FileSystem(format!("Failed to persist {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<hound::Error> for AppError {
    fn from(err: hound::Error) -> Self {
        AppError::AudioProcessing(format!("WAV: {}", err))
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Other(format!("Background task failed: {}", err))
    }
}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        AppError::Other(err)
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        AppError::Other(err.to_string())
    }
}

// Result type alias for application
pub type AppResult<T> = Result<T, AppError>;
