//! Оркестратор: истории (текст → картинки → аудио → видео) и озвучка реплик.
//!
//! Запросы проверяются до создания задачи. Профиль голоса передаётся в задачу
//! снимком, поэтому правки настроек во время работы её не затрагивают.

use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{info, warn};
use tokio::sync::mpsc::{self, Sender};
use uuid::Uuid;

use crate::audio::{AssembledAudio, AssemblyProgress, AudioAssembler};
use crate::config::{AppConfig, DataLayout, Persona, PersonaCatalog, AVAILABLE_MODELS};
use crate::errors::{AppError, AppResult};
use crate::models::{GenerationJob, JobStage, VoiceParam, VoiceProfile, VoiceSlot};
use crate::pipeline::events::{EventKind, EventSink, PipelineEvent};
use crate::pipeline::pool::{JobHandle, JobTable, WorkerPool};
use crate::registry::{FileRegistry, ScratchPad, VoiceStore};
use crate::services::{compute_timeline, fetch_images, Services, TextRequest, VideoPlan};
use crate::text::{image_fragments, project_name, split_text, TextChunk};
use crate::utils::fs::{move_file, remove_quietly};

/// Ответ модели, означающий отказ генерировать текст
pub const REFUSAL_SENTINEL: &str = "I'm sorry, but I can't assist with that.";

#[derive(Debug, Clone)]
pub struct StoryRequest {
    pub prompt: String,
    pub persona: Persona,
    /// `None` - модель из конфигурации
    pub model: Option<String>,
    pub voice: VoiceSlot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceMode {
    /// Озвучить для прослушивания; файл остаётся в `AUDIO/` до следующего запуска
    Test,
    /// Озвучить и сохранить в `DIALOGS/`
    Save,
}

#[derive(Debug, Clone)]
pub struct VoiceRequest {
    /// Весь черновой текст
    pub text: String,
    /// Выделение в символах; пустое или отсутствующее означает "весь текст"
    pub selection: Option<Range<usize>>,
    pub voice: VoiceSlot,
    pub mode: VoiceMode,
}

impl VoiceRequest {
    /// Текст для озвучки: выделение, иначе весь текст
    pub fn text_to_voice(&self) -> AppResult<String> {
        let selected = self.selection.as_ref().map(|range| {
            self.text
                .chars()
                .skip(range.start)
                .take(range.end.saturating_sub(range.start))
                .collect::<String>()
        });

        let text = match selected {
            Some(selected) if !selected.trim().is_empty() => selected.trim().to_string(),
            _ => self.text.trim().to_string(),
        };

        if text.is_empty() {
            return Err(AppError::Validation(
                "Please enter or select some text to process".into(),
            ));
        }
        Ok(text)
    }
}

/// Общие зависимости задач
#[derive(Clone)]
struct JobContext {
    config: Arc<AppConfig>,
    layout: Arc<DataLayout>,
    services: Services,
    registry: Arc<FileRegistry>,
    jobs: Arc<JobTable>,
}

impl JobContext {
    fn assembler(&self) -> AudioAssembler {
        AudioAssembler::new(
            Arc::clone(&self.services.speech),
            Arc::clone(&self.services.encoder),
        )
    }

    fn scratch_audio_path(&self, voice: VoiceSlot) -> PathBuf {
        self.layout.audio_dir.join(format!(
            "{}_{}.{}",
            voice,
            Uuid::new_v4(),
            self.services.encoder.extension()
        ))
    }

    /// Сборка дорожки; прогресс фрагментов пересылается в канал событий по порядку
    async fn assemble(
        &self,
        sink: &EventSink,
        chunks: &[TextChunk],
        voice: VoiceSlot,
        profile: VoiceProfile,
        output: &Path,
    ) -> AppResult<AssembledAudio> {
        let (progress_tx, mut progress_rx) = mpsc::channel::<AssemblyProgress>(32);
        let forward_sink = sink.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(update) = progress_rx.recv().await {
                forward_sink.chunk(update.completed, update.total).await;
            }
        });

        let result = self
            .assembler()
            .assemble(chunks, voice, profile, output, Some(progress_tx))
            .await;

        if let Err(e) = forwarder.await {
            warn!("Пересылка прогресса прервана: {}", e);
        }
        result
    }

    async fn enter(&self, sink: &EventSink, stage: JobStage) -> AppResult<()> {
        self.jobs.advance(sink.job_id(), stage)?;
        info!("Задача {}: {:?} ({}%)", sink.job_id(), stage, stage.milestone());
        sink.stage(stage).await;
        Ok(())
    }
}

/// Точка входа потребителя: хранилища, пул и запуск задач
pub struct Studio {
    context: JobContext,
    personas: PersonaCatalog,
    voices: Arc<VoiceStore>,
    scratch: ScratchPad,
    pool: WorkerPool,
    events: Sender<PipelineEvent>,
}

impl Studio {
    /// Создаёт каталоги, загружает настройки, счётчики и персоны
    pub fn open(config: AppConfig, services: Services, events: Sender<PipelineEvent>) -> AppResult<Self> {
        let layout = config.layout();
        layout.ensure()?;
        // пробные озвучки живут до следующего запуска
        layout.clear_scratch_audio()?;

        let personas = PersonaCatalog::load(&layout.persona_path);
        let voices = Arc::new(VoiceStore::load(&layout.settings_path)?);
        let registry = Arc::new(FileRegistry::open(&layout, services.encoder.extension())?);
        let scratch = ScratchPad::new(&layout.scratch_text_path);
        let jobs = Arc::new(JobTable::default());
        let pool = WorkerPool::new(config.max_workers, events.clone(), Arc::clone(&jobs));

        info!("Рабочий каталог: {}", layout.root.display());
        Ok(Self {
            context: JobContext {
                config: Arc::new(config),
                layout: Arc::new(layout),
                services,
                registry,
                jobs,
            },
            personas,
            voices,
            scratch,
            pool,
            events,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.context.config
    }

    pub fn layout(&self) -> &DataLayout {
        &self.context.layout
    }

    pub fn voices(&self) -> &VoiceStore {
        &self.voices
    }

    pub fn registry(&self) -> &FileRegistry {
        &self.context.registry
    }

    pub fn scratch(&self) -> &ScratchPad {
        &self.scratch
    }

    /// Снимок записи задачи генерации истории
    pub fn job(&self, id: Uuid) -> Option<GenerationJob> {
        self.context.jobs.get(id)
    }

    /// Запуск генерации истории; пустой запрос отклоняется без создания задачи
    pub fn submit_story(&self, request: StoryRequest) -> AppResult<JobHandle> {
        let prompt = request.prompt.trim().to_string();
        if prompt.is_empty() {
            return Err(AppError::Validation("Please enter a story concept".into()));
        }

        let model = request
            .model
            .unwrap_or_else(|| self.context.config.default_model.clone());
        if !AVAILABLE_MODELS.contains(&model.as_str()) && model != self.context.config.default_model {
            return Err(AppError::Validation(format!("Unknown model: {}", model)));
        }

        let profile = self.voices.profile(request.voice)?;
        let job = GenerationJob::new(prompt, request.persona, model, request.voice, profile);
        let id = job.id;
        let persona_text = self.personas.text(request.persona).to_string();
        self.context.jobs.insert(job.clone())?;

        info!("Новая задача истории {} ({}, {})", id, job.model, job.voice);
        let context = self.context.clone();
        Ok(self
            .pool
            .submit(id, move |sink| run_story(context, sink, job, persona_text)))
    }

    /// Запуск пробной озвучки или сохранения реплики
    pub fn submit_voice(&self, request: VoiceRequest) -> AppResult<JobHandle> {
        let text = request.text_to_voice()?;
        let profile = self.voices.profile(request.voice)?;
        let id = Uuid::new_v4();

        info!("Новая задача озвучки {} ({:?}, {})", id, request.mode, request.voice);
        let context = self.context.clone();
        let voice = request.voice;
        let mode = request.mode;
        Ok(self
            .pool
            .submit(id, move |sink| run_voice(context, sink, text, voice, profile, mode)))
    }

    /// Изменение параметра голоса; обновлённый профиль уходит в канал событий
    pub async fn set_voice_param(
        &self,
        voice: VoiceSlot,
        param: VoiceParam,
        value: f64,
    ) -> AppResult<VoiceProfile> {
        let profile = self.voices.set(voice, param, value)?;
        self.announce_profile(voice, profile).await;
        Ok(profile)
    }

    pub async fn nudge_voice_param(
        &self,
        voice: VoiceSlot,
        param: VoiceParam,
        steps: i32,
    ) -> AppResult<VoiceProfile> {
        let profile = self.voices.nudge(voice, param, steps)?;
        self.announce_profile(voice, profile).await;
        Ok(profile)
    }

    async fn announce_profile(&self, voice: VoiceSlot, profile: VoiceProfile) {
        EventSink::new(Uuid::nil(), self.events.clone())
            .emit(EventKind::ProfileUpdated { voice, profile })
            .await;
    }
}

async fn run_story(
    ctx: JobContext,
    sink: EventSink,
    job: GenerationJob,
    persona_text: String,
) -> AppResult<()> {
    let id = job.id;

    ctx.enter(&sink, JobStage::GeneratingText).await?;
    let request = TextRequest {
        prompt: job.source_text.clone(),
        persona_text,
        model: job.model.clone(),
        max_tokens: ctx.config.max_tokens,
    };
    let content = ctx.services.text.generate(&request).await?;
    if content.trim().is_empty() {
        return Err(AppError::PartialContent("The model returned no text".into()));
    }
    if content.contains(REFUSAL_SENTINEL) {
        return Err(AppError::PartialContent(
            "The model refused to generate the requested content".into(),
        ));
    }
    sink.emit(EventKind::TextReady {
        text: content.clone(),
    })
    .await;

    let short_id = id.simple().to_string();
    let project_dir = ctx
        .layout
        .projects_dir
        .join(project_name(&content, &short_id[..8]));
    tokio::fs::create_dir_all(&project_dir).await?;
    ctx.jobs.update(id, |job| {
        job.project_dir = Some(project_dir.clone());
        Ok(())
    })?;

    ctx.enter(&sink, JobStage::GeneratingImages).await?;
    let fragments = image_fragments(&content);
    let images = fetch_images(
        Arc::clone(&ctx.services.images),
        &fragments,
        &ctx.layout.images_dir,
        ctx.config.image_concurrency,
    )
    .await?;
    ctx.jobs.update(id, |job| {
        job.image_paths = images.clone();
        Ok(())
    })?;
    sink.emit(EventKind::ImagesReady {
        paths: images.clone(),
    })
    .await;

    ctx.enter(&sink, JobStage::GeneratingAudio).await?;
    let chunks = split_text(&content, ctx.config.max_chunk_length);
    let scratch_audio = ctx.scratch_audio_path(job.voice);
    let assembled = ctx
        .assemble(&sink, &chunks, job.voice, job.profile, &scratch_audio)
        .await?;

    let file_name = scratch_audio
        .file_name()
        .ok_or_else(|| AppError::FileSystem("Audio file has no name".into()))?;
    let audio_path = project_dir.join(file_name);
    if let Err(e) = move_file(&scratch_audio, &audio_path) {
        remove_quietly(&scratch_audio);
        return Err(e);
    }
    ctx.jobs.update(id, |job| {
        job.audio_path = Some(audio_path.clone());
        Ok(())
    })?;
    sink.emit(EventKind::AudioReady {
        path: audio_path.clone(),
        duration_secs: assembled.duration_secs,
    })
    .await;

    ctx.enter(&sink, JobStage::CompilingVideo).await?;
    let project = project_dir
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    let plan = VideoPlan {
        timeline: compute_timeline(&images, assembled.duration_secs)?,
        audio_path: audio_path.clone(),
        output_path: project_dir.join(format!("final_video_{}.mp4", project)),
        fps: ctx.config.video_fps,
    };
    let video_path = ctx.services.video.compose(&plan).await?;
    ctx.jobs.update(id, |job| {
        job.video_path = Some(video_path.clone());
        Ok(())
    })?;
    sink.emit(EventKind::VideoReady { path: video_path }).await;

    ctx.enter(&sink, JobStage::Done).await?;
    Ok(())
}

async fn run_voice(
    ctx: JobContext,
    sink: EventSink,
    text: String,
    voice: VoiceSlot,
    profile: VoiceProfile,
    mode: VoiceMode,
) -> AppResult<()> {
    let chunks = split_text(&text, ctx.config.max_chunk_length);
    let scratch_audio = ctx.scratch_audio_path(voice);
    ctx.assemble(&sink, &chunks, voice, profile, &scratch_audio)
        .await?;

    match mode {
        VoiceMode::Test => {
            sink.emit(EventKind::VoiceTestReady {
                voice,
                path: scratch_audio,
            })
            .await;
        }
        VoiceMode::Save => {
            let saved = match ctx.registry.save_dialogue(voice, &scratch_audio) {
                Ok(path) => path,
                Err(e) => {
                    remove_quietly(&scratch_audio);
                    return Err(e);
                }
            };
            let files = ctx.registry.list_files()?;
            sink.emit(EventKind::VoiceSaved {
                voice,
                path: saved,
                files,
            })
            .await;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(text: &str, selection: Option<Range<usize>>) -> VoiceRequest {
        VoiceRequest {
            text: text.to_string(),
            selection,
            voice: VoiceSlot::Voice1,
            mode: VoiceMode::Test,
        }
    }

    #[test]
    fn test_selection_preferred() {
        let req = request("Hello there. General Kenobi.", Some(13..28));
        assert_eq!(req.text_to_voice().unwrap(), "General Kenobi.");
    }

    #[test]
    fn test_empty_selection_falls_back_to_whole_text() {
        let req = request("  Whole text.  ", Some(3..3));
        assert_eq!(req.text_to_voice().unwrap(), "Whole text.");
        assert_eq!(request("Whole text.", None).text_to_voice().unwrap(), "Whole text.");
    }

    #[test]
    fn test_nothing_to_voice() {
        assert!(matches!(
            request("   \n", None).text_to_voice(),
            Err(AppError::Validation(_))
        ));
    }
}
