use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{info, warn};
use serde::Serialize;
use tokio::sync::mpsc::Sender;

use crate::audio::buffer::AudioBuffer;
use crate::audio::effects::apply_voice_profile;
use crate::audio::format::AudioEncoder;
use crate::errors::{AppError, AppResult};
use crate::models::{VoiceProfile, VoiceSlot};
use crate::services::SpeechSynthesizer;
use crate::text::TextChunk;
use crate::utils::fs::remove_quietly;

/// Прогресс сборки: обработано фрагментов из общего числа
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AssemblyProgress {
    pub completed: usize,
    pub total: usize,
}

/// Итоговая дорожка
#[derive(Debug, Clone, Serialize)]
pub struct AssembledAudio {
    pub path: PathBuf,
    pub duration_secs: f64,
    pub chunk_count: usize,
}

/// Синтез, эффекты и склейка фрагментов в одну дорожку
pub struct AudioAssembler {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    encoder: Arc<dyn AudioEncoder>,
}

impl AudioAssembler {
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>, encoder: Arc<dyn AudioEncoder>) -> Self {
        Self {
            synthesizer,
            encoder,
        }
    }

    pub fn extension(&self) -> &'static str {
        self.encoder.extension()
    }

    /// Обрабатывает фрагменты строго по порядку и пишет дорожку в `output_path`.
    ///
    /// Ошибка любого фрагмента прерывает сборку; файл дорожки не остаётся на диске.
    pub async fn assemble(
        &self,
        chunks: &[TextChunk],
        voice: VoiceSlot,
        profile: VoiceProfile,
        output_path: &Path,
        progress_sender: Option<Sender<AssemblyProgress>>,
    ) -> AppResult<AssembledAudio> {
        if chunks.is_empty() {
            return Err(AppError::Validation("No text to voice".into()));
        }

        let total = chunks.len();
        let mut processed = Vec::with_capacity(total);

        for chunk in chunks {
            info!("Обработка фрагмента {}/{}", chunk.index + 1, total);

            let raw = self.synthesizer.synthesize(&chunk.text, voice).await?;
            let voiced =
                tokio::task::spawn_blocking(move || apply_voice_profile(&raw, &profile)).await??;
            processed.push(voiced);

            if let Some(sender) = &progress_sender {
                let update = AssemblyProgress {
                    completed: processed.len(),
                    total,
                };
                if sender.send(update).await.is_err() {
                    warn!("Получатель прогресса сборки закрыт");
                }
            }
        }

        let encoder = Arc::clone(&self.encoder);
        let path = output_path.to_path_buf();
        let encoded = tokio::task::spawn_blocking(move || -> AppResult<f64> {
            let combined = AudioBuffer::concat(&processed)?;
            encoder.encode(&combined, &path)?;
            Ok(combined.duration_secs())
        })
        .await
        .map_err(AppError::from)
        .and_then(|result| result);

        match encoded {
            Ok(duration_secs) => {
                info!(
                    "Дорожка готова: {} ({:.2}с, {} фрагментов)",
                    output_path.display(),
                    duration_secs,
                    total
                );
                Ok(AssembledAudio {
                    path: output_path.to_path_buf(),
                    duration_secs,
                    chunk_count: total,
                })
            }
            Err(e) => {
                remove_quietly(output_path);
                Err(e)
            }
        }
    }
}
