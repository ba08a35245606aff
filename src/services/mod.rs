// Services module
// External collaborators of the pipeline: text, speech, images and video

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::audio::buffer::AudioBuffer;
use crate::audio::format::{encoder_for, AudioEncoder};
use crate::config::AppConfig;
use crate::errors::AppResult;
use crate::models::VoiceSlot;

pub mod images;
pub mod openai;
pub mod speech;
pub mod video;

pub use images::{fetch_images, PollinationsClient};
pub use openai::OpenAiChatClient;
pub use speech::GoogleTtsClient;
pub use video::{compute_timeline, FfmpegCompositor, ImageSlot, VideoPlan};

/// Запрос на генерацию текста истории
#[derive(Debug, Clone, Serialize)]
pub struct TextRequest {
    pub prompt: String,
    /// Системное сообщение персоны
    pub persona_text: String,
    pub model: String,
    pub max_tokens: u32,
}

/// Генерация текста языковой моделью
#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    /// Возвращает сгенерированный текст; `None` в ответе сервиса становится пустой строкой
    async fn generate(&self, request: &TextRequest) -> AppResult<String>;
}

/// Синтез речи для одного фрагмента текста
#[async_trait::async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice: VoiceSlot) -> AppResult<AudioBuffer>;
}

/// Источник иллюстраций
#[async_trait::async_trait]
pub trait ImageSource: Send + Sync {
    /// `Ok(None)` означает, что сервис не дал картинку и фрагмент можно пропустить
    async fn fetch(&self, prompt: &str) -> AppResult<Option<Vec<u8>>>;
}

/// Сборка видео из картинок и аудиодорожки
#[async_trait::async_trait]
pub trait VideoCompositor: Send + Sync {
    async fn compose(&self, plan: &VideoPlan) -> AppResult<PathBuf>;
}

/// Набор сервисов, с которыми работает конвейер
#[derive(Clone)]
pub struct Services {
    pub text: Arc<dyn TextGenerator>,
    pub speech: Arc<dyn SpeechSynthesizer>,
    pub images: Arc<dyn ImageSource>,
    pub video: Arc<dyn VideoCompositor>,
    pub encoder: Arc<dyn AudioEncoder>,
}

impl Services {
    /// Реальные HTTP-клиенты и FFmpeg
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let timeout = Duration::from_secs(config.request_timeout_secs);
        Ok(Self {
            text: Arc::new(OpenAiChatClient::new(
                &config.openai_api_key,
                &config.openai_base_url,
                timeout,
            )?),
            speech: Arc::new(GoogleTtsClient::new(
                &config.tts_host_base,
                &config.tts_language,
                timeout,
            )?),
            images: Arc::new(PollinationsClient::new(&config.image_base_url, timeout)?),
            video: Arc::new(FfmpegCompositor),
            encoder: Arc::from(encoder_for(config.audio_format)),
        })
    }
}

/// Имя файла без каталога, для логов и событий
pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
