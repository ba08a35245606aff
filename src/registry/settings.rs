//! Профили голосов и черновой текст: хранилища с атомарной записью на диск.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use log::{debug, info, warn};

use crate::errors::{AppError, AppResult};
use crate::models::{VoiceParam, VoiceProfile, VoiceSlot};
use crate::utils::fs::write_atomic;

/// Потокобезопасное хранилище профилей голосов
pub struct VoiceStore {
    path: PathBuf,
    profiles: Mutex<BTreeMap<VoiceSlot, VoiceProfile>>,
}

impl VoiceStore {
    /// Загружает профили; недостающие голоса получают профиль по умолчанию.
    /// Документ сразу перезаписывается в полном виде.
    pub fn load(path: &Path) -> AppResult<Self> {
        let mut profiles: BTreeMap<VoiceSlot, VoiceProfile> = VoiceSlot::ALL
            .iter()
            .map(|voice| (*voice, VoiceProfile::default()))
            .collect();

        if path.exists() {
            let raw = fs::read_to_string(path)?;
            let document: BTreeMap<String, VoiceProfile> = serde_json::from_str(&raw)?;
            for (key, profile) in document {
                match key.parse::<VoiceSlot>() {
                    Ok(voice) => {
                        let clamped = profile.clamped();
                        if clamped != profile {
                            warn!("Профиль {} вне допустимых диапазонов, исправлен: {:?}", voice, clamped);
                        }
                        profiles.insert(voice, clamped);
                    }
                    Err(_) => warn!("Неизвестный голос в {}: {}", path.display(), key),
                }
            }
            info!("Загружены настройки голосов из {}", path.display());
        }

        let store = Self {
            path: path.to_path_buf(),
            profiles: Mutex::new(profiles),
        };
        {
            let guard = store.lock()?;
            store.persist(&guard)?;
        }
        Ok(store)
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, BTreeMap<VoiceSlot, VoiceProfile>>> {
        self.profiles
            .lock()
            .map_err(|_| AppError::Other("Voice store lock poisoned".into()))
    }

    fn persist(&self, profiles: &BTreeMap<VoiceSlot, VoiceProfile>) -> AppResult<()> {
        let document: BTreeMap<&str, &VoiceProfile> =
            profiles.iter().map(|(voice, p)| (voice.as_str(), p)).collect();
        write_atomic(&self.path, &serde_json::to_vec_pretty(&document)?)
    }

    /// Снимок профиля для передачи в задачу по значению
    pub fn profile(&self, voice: VoiceSlot) -> AppResult<VoiceProfile> {
        Ok(self.lock()?.get(&voice).copied().unwrap_or_default())
    }

    pub fn all(&self) -> AppResult<BTreeMap<VoiceSlot, VoiceProfile>> {
        Ok(self.lock()?.clone())
    }

    /// Устанавливает параметр (с ограничением диапазоном) и сразу сохраняет
    pub fn set(&self, voice: VoiceSlot, param: VoiceParam, value: f64) -> AppResult<VoiceProfile> {
        if !value.is_finite() {
            return Err(AppError::Validation(format!("{} must be a number", param)));
        }
        let mut profiles = self.lock()?;
        let clamped = param.clamp(value);
        let updated = profiles
            .get(&voice)
            .copied()
            .unwrap_or_default()
            .with(param, clamped);
        profiles.insert(voice, updated);
        self.persist(&profiles)?;

        debug!("{} {} = {}", voice, param, clamped);
        Ok(updated)
    }

    /// Кнопки +/-: сдвиг на `steps` шагов параметра
    pub fn nudge(&self, voice: VoiceSlot, param: VoiceParam, steps: i32) -> AppResult<VoiceProfile> {
        let current = self.profile(voice)?.get(param);
        let step = param.step();
        let target = ((current + steps as f64 * step) / step).round() * step;
        self.set(voice, param, target)
    }
}

/// Черновой текст для озвучки; перезаписывается при каждой правке
pub struct ScratchPad {
    path: PathBuf,
}

impl ScratchPad {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn load(&self) -> AppResult<String> {
        if !self.path.exists() {
            return Ok(String::new());
        }
        Ok(fs::read_to_string(&self.path)?)
    }

    pub fn save(&self, text: &str) -> AppResult<()> {
        write_atomic(&self.path, text.as_bytes())
    }

    pub fn clear(&self) -> AppResult<()> {
        self.save("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_written_on_first_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("voice_settings.json");

        let store = VoiceStore::load(&path).unwrap();
        assert_eq!(store.profile(VoiceSlot::Voice1).unwrap(), VoiceProfile::default());

        let document: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(document["Voice 2"]["speed"], 1.0);
        assert_eq!(document["Voice 2"]["low_pass"], 0.0);
    }

    #[test]
    fn test_all_zero_document_is_clamped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("voice_settings.json");
        let zeros = r#"{"pitch": 0, "speed": 0, "low_pass": 0, "high_pass": 0, "bass_boost": 0, "formant_shift": 0}"#;
        fs::write(&path, format!(r#"{{"Voice 1": {zeros}, "Voice 2": {zeros}}}"#)).unwrap();

        let store = VoiceStore::load(&path).unwrap();
        let profile = store.profile(VoiceSlot::Voice1).unwrap();
        assert_eq!(profile.speed, 0.5);
        assert_eq!(profile.low_pass, None);
        assert_eq!(profile.pitch, 0.0);

        let all = store.all().unwrap();
        assert!(all.values().all(|p| p.speed > 0.0));

        let document: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(document["Voice 2"]["speed"], 0.5);
    }

    #[test]
    fn test_set_clamps_and_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("voice_settings.json");
        let store = VoiceStore::load(&path).unwrap();

        let profile = store.set(VoiceSlot::Voice1, VoiceParam::BassBoost, 35.0).unwrap();
        assert_eq!(profile.bass_boost, 20.0);
        store.set(VoiceSlot::Voice1, VoiceParam::LowPass, 3000.0).unwrap();

        let reloaded = VoiceStore::load(&path).unwrap();
        let profile = reloaded.profile(VoiceSlot::Voice1).unwrap();
        assert_eq!(profile.bass_boost, 20.0);
        assert_eq!(profile.low_pass, Some(3000.0));
        assert_eq!(reloaded.profile(VoiceSlot::Voice2).unwrap(), VoiceProfile::default());
    }

    #[test]
    fn test_nudge_steps() {
        let dir = tempdir().unwrap();
        let store = VoiceStore::load(&dir.path().join("voice_settings.json")).unwrap();

        let profile = store.nudge(VoiceSlot::Voice2, VoiceParam::Speed, 3).unwrap();
        assert!((profile.speed - 1.03).abs() < 1e-9);

        let profile = store.nudge(VoiceSlot::Voice2, VoiceParam::HighPass, -1).unwrap();
        assert_eq!(profile.high_pass, None);

        store.nudge(VoiceSlot::Voice2, VoiceParam::HighPass, 2).unwrap();
        assert_eq!(store.profile(VoiceSlot::Voice2).unwrap().high_pass, Some(100.0));
    }

    #[test]
    fn test_non_finite_rejected() {
        let dir = tempdir().unwrap();
        let store = VoiceStore::load(&dir.path().join("voice_settings.json")).unwrap();
        assert!(matches!(
            store.set(VoiceSlot::Voice1, VoiceParam::Pitch, f64::NAN),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_scratch_pad() {
        let dir = tempdir().unwrap();
        let pad = ScratchPad::new(&dir.path().join("text_input.txt"));

        assert_eq!(pad.load().unwrap(), "");
        pad.save("Once upon a time.").unwrap();
        assert_eq!(pad.load().unwrap(), "Once upon a time.");
        pad.clear().unwrap();
        assert_eq!(pad.load().unwrap(), "");
    }
}
