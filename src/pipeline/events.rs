// Events module
// Typed events from background jobs to the single consumer

use std::path::PathBuf;

use log::{debug, warn};
use serde::Serialize;
use tokio::sync::mpsc::Sender;
use uuid::Uuid;

use crate::errors::{AppError, ErrorKind};
use crate::models::{JobStage, VoiceProfile, VoiceSlot};
use crate::registry::DialogFile;

/// Событие конвейера, адресованное потребителю
#[derive(Debug, Clone, Serialize)]
pub struct PipelineEvent {
    pub job_id: Uuid,
    pub kind: EventKind,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// Вход в этап истории с контрольной точкой прогресса
    Stage { stage: JobStage, progress: u8 },
    /// Обработан очередной фрагмент аудио
    Chunk { completed: usize, total: usize },
    TextReady { text: String },
    ImagesReady { paths: Vec<PathBuf> },
    AudioReady { path: PathBuf, duration_secs: f64 },
    VideoReady { path: PathBuf },
    /// Пробная озвучка готова к прослушиванию
    VoiceTestReady { voice: VoiceSlot, path: PathBuf },
    VoiceSaved { voice: VoiceSlot, path: PathBuf, files: Vec<DialogFile> },
    ProfileUpdated { voice: VoiceSlot, profile: VoiceProfile },
    Completed,
    Failed { error: ErrorKind, message: String },
}

impl EventKind {
    /// Последнее событие задачи
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventKind::Completed | EventKind::Failed { .. })
    }
}

/// Отправитель событий одной задачи
#[derive(Debug, Clone)]
pub struct EventSink {
    job_id: Uuid,
    sender: Sender<PipelineEvent>,
}

impl EventSink {
    pub fn new(job_id: Uuid, sender: Sender<PipelineEvent>) -> Self {
        Self { job_id, sender }
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub async fn emit(&self, kind: EventKind) {
        let event = PipelineEvent {
            job_id: self.job_id,
            kind,
        };
        debug!("Emitted event: {:?}", event);
        if self.sender.send(event).await.is_err() {
            warn!("Event consumer is gone, job {} continues silently", self.job_id);
        }
    }

    pub async fn stage(&self, stage: JobStage) {
        self.emit(EventKind::Stage {
            stage,
            progress: stage.milestone(),
        })
        .await;
    }

    pub async fn chunk(&self, completed: usize, total: usize) {
        self.emit(EventKind::Chunk { completed, total }).await;
    }

    pub async fn failed(&self, error: &AppError) {
        self.emit(EventKind::Failed {
            error: error.kind(),
            message: error.to_string(),
        })
        .await;
    }
}
