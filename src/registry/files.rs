//! Реестр сохранённых реплик: счётчики имён по голосам и операции с файлами.
//!
//! Все изменения счётчиков и каталога `DIALOGS/` выполняются под одной блокировкой.
//! Счётчик записывается на диск сразу после увеличения, атомарно.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::SystemTime;

use chrono::{DateTime, Local};
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::config::DataLayout;
use crate::errors::{AppError, AppResult};
use crate::models::VoiceSlot;
use crate::utils::fs::{move_file, write_atomic};

const INITIAL_COUNTER: u32 = 1;

static VOICE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Voice (\d+)").expect("voice prefix pattern is valid"));
static AUDIO_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_AUDIO_(\d+)").expect("audio number pattern is valid"));
static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("digits pattern is valid"));

/// Строка списка сохранённых реплик
#[derive(Debug, Clone, Serialize)]
pub struct DialogFile {
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub size_label: String,
    pub created: String,
}

pub struct FileRegistry {
    dialogs_dir: PathBuf,
    counters_path: PathBuf,
    extension: String,
    counters: Mutex<BTreeMap<VoiceSlot, u32>>,
}

impl FileRegistry {
    /// Загружает счётчики и поднимает их выше уже существующих номеров в `DIALOGS/`
    pub fn open(layout: &DataLayout, extension: &str) -> AppResult<Self> {
        let mut counters = load_counters(&layout.counters_path)?;
        let reconciled = reconcile_with_disk(&mut counters, &layout.dialogs_dir)?;

        let registry = Self {
            dialogs_dir: layout.dialogs_dir.clone(),
            counters_path: layout.counters_path.clone(),
            extension: extension.to_string(),
            counters: Mutex::new(counters),
        };

        if reconciled || !layout.counters_path.exists() {
            let guard = registry.lock()?;
            registry.persist(&guard)?;
        }
        Ok(registry)
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, BTreeMap<VoiceSlot, u32>>> {
        self.counters
            .lock()
            .map_err(|_| AppError::Other("File registry lock poisoned".into()))
    }

    fn persist(&self, counters: &BTreeMap<VoiceSlot, u32>) -> AppResult<()> {
        let document: BTreeMap<&str, u32> =
            counters.iter().map(|(voice, n)| (voice.as_str(), *n)).collect();
        write_atomic(&self.counters_path, &serde_json::to_vec_pretty(&document)?)?;
        debug!("Счётчики сохранены: {:?}", document);
        Ok(())
    }

    pub fn counter(&self, voice: VoiceSlot) -> AppResult<u32> {
        let counters = self.lock()?;
        Ok(counter_of(&counters, voice))
    }
    /// Свободное имя для следующей реплики; счётчик не расходуется
    pub fn next_filename(&self, voice: VoiceSlot) -> AppResult<PathBuf> {
        let counters = self.lock()?;
        Ok(self.unique_path(voice, counter_of(&counters, voice)))
    }

    fn unique_path(&self, voice: VoiceSlot, counter: u32) -> PathBuf {
        let stem = format!("{}_AUDIO_{:05}", voice, counter);
        let candidate = self.dialogs_dir.join(format!("{}.{}", stem, self.extension));
        if !candidate.exists() {
            return candidate;
        }
        (1..)
            .map(|n| self.dialogs_dir.join(format!("{}_{}.{}", stem, n, self.extension)))
            .find(|path| !path.exists())
            .unwrap_or(candidate)
    }

    /// Подтверждение успешного сохранения: счётчик увеличивается и сразу пишется на диск
    pub fn confirm_saved(&self, voice: VoiceSlot) -> AppResult<u32> {
        let mut counters = self.lock()?;
        self.increment(&mut counters, voice)
    }

    /// Счётчик в памяти меняется только после успешной записи документа
    fn increment(&self, counters: &mut BTreeMap<VoiceSlot, u32>, voice: VoiceSlot) -> AppResult<u32> {
        let next = counter_of(counters, voice) + 1;
        let mut updated = counters.clone();
        updated.insert(voice, next);
        self.persist(&updated)?;
        *counters = updated;
        info!("Счётчик {} увеличен до {}", voice, next);
        Ok(next)
    }

    /// Переносит готовое аудио в `DIALOGS/` под следующим именем голоса.
    ///
    /// Выбор имени, перенос и увеличение счётчика выполняются под одной блокировкой.
    /// Перенесённый файл считается сохранённым, даже если документ счётчиков
    /// записать не удалось: номер всё равно расходуется, а при следующем запуске
    /// счётчик восстанавливается по `DIALOGS/`.
    pub fn save_dialogue(&self, voice: VoiceSlot, source: &Path) -> AppResult<PathBuf> {
        let mut counters = self.lock()?;
        let counter = counter_of(&counters, voice);
        let target = self.unique_path(voice, counter);
        move_file(source, &target)?;

        if let Err(e) = self.increment(&mut counters, voice) {
            warn!("Реплика {} сохранена, но счётчик не записан: {}", target.display(), e);
            counters.insert(voice, counter + 1);
        }
        info!("Реплика сохранена как {}", target.display());
        Ok(target)
    }

    /// Аудиофайлы `DIALOGS/` в порядке `sort_key`
    pub fn list_files(&self) -> AppResult<Vec<DialogFile>> {
        let _guard = self.lock()?;
        let mut files = Vec::new();

        for entry in fs::read_dir(&self.dialogs_dir)? {
            let entry = entry?;
            let path = entry.path();
            let is_audio = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("mp3") || ext.eq_ignore_ascii_case("wav"))
                .unwrap_or(false);
            if !is_audio || !path.is_file() {
                continue;
            }

            let metadata = entry.metadata()?;
            let created = metadata
                .created()
                .or_else(|_| metadata.modified())
                .unwrap_or_else(|_| SystemTime::now());

            files.push(DialogFile {
                name: entry.file_name().to_string_lossy().to_string(),
                path,
                size_bytes: metadata.len(),
                size_label: size_label(metadata.len()),
                created: DateTime::<Local>::from(created)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string(),
            });
        }

        files.sort_by_cached_key(|file| sort_key(&file.name));
        Ok(files)
    }

    pub fn rename_file(&self, old_name: &str, new_name: &str) -> AppResult<PathBuf> {
        let _guard = self.lock()?;
        let from = self.existing(old_name)?;
        let to = self.dialogs_dir.join(validate_name(new_name)?);
        if to.exists() {
            return Err(AppError::FileSystem(format!("{} already exists", new_name)));
        }
        fs::rename(&from, &to).map_err(|e| {
            AppError::FileSystem(format!("Failed to rename {}: {}", old_name, e))
        })?;
        info!("Переименован {} -> {}", old_name, new_name);
        Ok(to)
    }

    /// Копирует реплику; если `destination` каталог, имя файла сохраняется
    pub fn copy_file(&self, name: &str, destination: &Path) -> AppResult<PathBuf> {
        let _guard = self.lock()?;
        let from = self.existing(name)?;
        let to = if destination.is_dir() {
            destination.join(name)
        } else {
            destination.to_path_buf()
        };
        fs::copy(&from, &to).map_err(|e| {
            AppError::FileSystem(format!("Failed to copy {}: {}", name, e))
        })?;
        info!("Скопирован {} -> {}", name, to.display());
        Ok(to)
    }

    pub fn delete_file(&self, name: &str) -> AppResult<()> {
        let _guard = self.lock()?;
        let path = self.existing(name)?;
        fs::remove_file(&path).map_err(|e| {
            AppError::FileSystem(format!("Failed to delete {}: {}", name, e))
        })?;
        info!("Удалён {}", name);
        Ok(())
    }

    fn existing(&self, name: &str) -> AppResult<PathBuf> {
        let path = self.dialogs_dir.join(validate_name(name)?);
        if !path.is_file() {
            return Err(AppError::FileSystem(format!("{} not found in DIALOGS", name)));
        }
        Ok(path)
    }
}

fn counter_of(counters: &BTreeMap<VoiceSlot, u32>, voice: VoiceSlot) -> u32 {
    counters.get(&voice).copied().unwrap_or(INITIAL_COUNTER)
}

fn validate_name(name: &str) -> AppResult<&str> {
    let name = name.trim();
    if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(AppError::Validation(format!("Invalid file name: {:?}", name)));
    }
    Ok(name)
}

fn load_counters(path: &Path) -> AppResult<BTreeMap<VoiceSlot, u32>> {
    let mut counters: BTreeMap<VoiceSlot, u32> =
        VoiceSlot::ALL.iter().map(|voice| (*voice, INITIAL_COUNTER)).collect();
    if !path.exists() {
        return Ok(counters);
    }

    let document: BTreeMap<String, u32> = serde_json::from_str(&fs::read_to_string(path)?)?;
    for (key, value) in document {
        match key.parse::<VoiceSlot>() {
            Ok(voice) => {
                counters.insert(voice, value);
            }
            Err(_) => warn!("Неизвестный голос в {}: {}", path.display(), key),
        }
    }
    Ok(counters)
}

/// Поднимает счётчики выше наибольшего номера в каталоге; true, если что-то изменилось
fn reconcile_with_disk(counters: &mut BTreeMap<VoiceSlot, u32>, dialogs_dir: &Path) -> AppResult<bool> {
    if !dialogs_dir.is_dir() {
        return Ok(false);
    }

    let mut changed = false;
    for entry in fs::read_dir(dialogs_dir)? {
        let name = entry?.file_name().to_string_lossy().to_string();
        for voice in VoiceSlot::ALL {
            let prefix = format!("{}_AUDIO_", voice);
            let Some(rest) = name.strip_prefix(&prefix) else {
                continue;
            };
            let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
            if let Ok(number) = digits.parse::<u32>() {
                let counter = counters.entry(voice).or_insert(INITIAL_COUNTER);
                if number >= *counter {
                    warn!("Счётчик {} отстал от файла {}, исправляем", voice, name);
                    *counter = number + 1;
                    changed = true;
                }
            }
        }
    }
    Ok(changed)
}

/// Ключ сортировки списка: голос (1, 2, прочие), номер реплики, имя
pub fn sort_key(filename: &str) -> (u8, u64, String) {
    let basename = Path::new(filename)
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| filename.to_string());

    let voice_rank = match VOICE_PREFIX
        .captures(&basename)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
    {
        Some("1") => 0,
        Some("2") => 1,
        _ => 2,
    };

    let stem = Path::new(&basename)
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| basename.clone());

    let number = AUDIO_NUMBER
        .captures(&stem)
        .and_then(|caps| caps.get(1))
        .or_else(|| DIGITS.find_iter(&stem).last())
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .unwrap_or(0);

    (voice_rank, number, basename)
}

/// Размер для списка файлов: B, KB или MB с одним знаком
pub fn size_label(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
