use std::path::PathBuf;

use chrono::{DateTime, Local};
use log::debug;
use serde::Serialize;
use uuid::Uuid;

use crate::config::Persona;
use crate::errors::{AppError, AppResult};
use crate::models::voice::{VoiceProfile, VoiceSlot};

/// Этап задачи генерации истории
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    Queued,
    GeneratingText,
    GeneratingImages,
    GeneratingAudio,
    CompilingVideo,
    Done,
    Failed,
}

impl JobStage {
    /// Контрольная точка прогресса при входе в этап
    pub fn milestone(&self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::GeneratingText => 10,
            Self::GeneratingImages => 30,
            Self::GeneratingAudio => 50,
            Self::CompilingVideo => 70,
            Self::Done => 100,
            // прогресс упавшей задачи не меняется
            Self::Failed => 0,
        }
    }

    fn next(&self) -> Option<JobStage> {
        match self {
            Self::Queued => Some(Self::GeneratingText),
            Self::GeneratingText => Some(Self::GeneratingImages),
            Self::GeneratingImages => Some(Self::GeneratingAudio),
            Self::GeneratingAudio => Some(Self::CompilingVideo),
            Self::CompilingVideo => Some(Self::Done),
            Self::Done | Self::Failed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// Задача генерации видео-истории
#[derive(Debug, Clone, Serialize)]
pub struct GenerationJob {
    pub id: Uuid,
    pub source_text: String,
    pub persona: Persona,
    pub model: String,
    pub voice: VoiceSlot,
    /// Снимок профиля на момент создания задачи
    pub profile: VoiceProfile,
    pub stage: JobStage,
    pub progress: u8,
    pub image_paths: Vec<PathBuf>,
    pub audio_path: Option<PathBuf>,
    pub video_path: Option<PathBuf>,
    pub project_dir: Option<PathBuf>,
    pub created_at: DateTime<Local>,
}

impl GenerationJob {
    pub fn new(
        source_text: String,
        persona: Persona,
        model: String,
        voice: VoiceSlot,
        profile: VoiceProfile,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_text,
            persona,
            model,
            voice,
            profile,
            stage: JobStage::Queued,
            progress: 0,
            image_paths: Vec::new(),
            audio_path: None,
            video_path: None,
            project_dir: None,
            created_at: Local::now(),
        }
    }

    /// Переход к следующему этапу; этапы нельзя пропускать
    pub fn advance(&mut self, to: JobStage) -> AppResult<()> {
        if self.stage.next() != Some(to) {
            return Err(AppError::Other(format!(
                "Invalid job transition {:?} -> {:?}",
                self.stage, to
            )));
        }
        debug!("Задача {}: {:?} -> {:?}", self.id, self.stage, to);
        self.stage = to;
        self.progress = to.milestone();
        Ok(())
    }

    /// Перевод в поглощающее состояние Failed из любого этапа
    pub fn fail(&mut self) {
        debug!("Задача {} завершилась ошибкой на этапе {:?}", self.id, self.stage);
        self.stage = JobStage::Failed;
    }

    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }
}
