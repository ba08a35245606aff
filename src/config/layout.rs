use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::errors::AppResult;

/// Раскладка каталогов и файлов состояния в корне данных
#[derive(Debug, Clone)]
pub struct DataLayout {
    pub root: PathBuf,
    /// Временные файлы синтеза речи
    pub audio_dir: PathBuf,
    /// Скачанные иллюстрации
    pub images_dir: PathBuf,
    /// Папки историй с итоговым аудио и видео
    pub projects_dir: PathBuf,
    /// Сохранённые реплики голосов
    pub dialogs_dir: PathBuf,
    pub backups_dir: PathBuf,
    pub settings_path: PathBuf,
    pub counters_path: PathBuf,
    pub scratch_text_path: PathBuf,
    pub persona_path: PathBuf,
}

impl DataLayout {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            audio_dir: root.join("AUDIO"),
            images_dir: root.join("IMAGES"),
            projects_dir: root.join("PROJECTS"),
            dialogs_dir: root.join("DIALOGS"),
            backups_dir: root.join("BACKUPS"),
            settings_path: root.join("voice_settings.json"),
            counters_path: root.join("voice_counters.json"),
            scratch_text_path: root.join("text_input.txt"),
            persona_path: root.join("Persona.txt"),
        }
    }

    /// Создаёт все каталоги; повторный вызов безопасен
    pub fn ensure(&self) -> AppResult<()> {
        for dir in [
            &self.audio_dir,
            &self.images_dir,
            &self.projects_dir,
            &self.dialogs_dir,
            &self.backups_dir,
        ] {
            fs::create_dir_all(dir)?;
            debug!("Каталог готов: {}", dir.display());
        }
        Ok(())
    }

    /// Удаляет файлы, оставшиеся в `AUDIO/` от прошлых запусков (пробные озвучки).
    /// Возвращает число удалённых файлов.
    pub fn clear_scratch_audio(&self) -> AppResult<usize> {
        if !self.audio_dir.is_dir() {
            return Ok(0);
        }
        let mut removed = 0;
        for entry in fs::read_dir(&self.audio_dir)? {
            let path = entry?.path();
            if path.is_file() {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        if removed > 0 {
            info!("Удалено {} временных аудиофайлов из {}", removed, self.audio_dir.display());
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_ensure_is_idempotent() {
        let dir = tempdir().unwrap();
        let layout = DataLayout::new(dir.path());

        layout.ensure().unwrap();
        layout.ensure().unwrap();

        for sub in ["AUDIO", "IMAGES", "PROJECTS", "DIALOGS", "BACKUPS"] {
            assert!(dir.path().join(sub).is_dir(), "{} missing", sub);
        }
    }

    #[test]
    fn test_clear_scratch_audio_keeps_other_dirs() {
        let dir = tempdir().unwrap();
        let layout = DataLayout::new(dir.path());
        layout.ensure().unwrap();
        fs::write(layout.audio_dir.join("Voice 1_old.wav"), b"x").unwrap();
        fs::write(layout.audio_dir.join("Voice 2_old.mp3"), b"x").unwrap();
        fs::write(layout.dialogs_dir.join("Voice 1_AUDIO_00001.mp3"), b"x").unwrap();

        assert_eq!(layout.clear_scratch_audio().unwrap(), 2);
        assert_eq!(fs::read_dir(&layout.audio_dir).unwrap().count(), 0);
        assert!(layout.dialogs_dir.join("Voice 1_AUDIO_00001.mp3").exists());
        assert_eq!(layout.clear_scratch_audio().unwrap(), 0);
    }
}
