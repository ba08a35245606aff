use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::{AppError, AppResult};

/// Именованный слот голоса
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VoiceSlot {
    #[serde(rename = "Voice 1")]
    Voice1,
    #[serde(rename = "Voice 2")]
    Voice2,
}

impl VoiceSlot {
    pub const ALL: [VoiceSlot; 2] = [VoiceSlot::Voice1, VoiceSlot::Voice2];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Voice1 => "Voice 1",
            Self::Voice2 => "Voice 2",
        }
    }

    /// Региональный домен TTS, задающий акцент голоса
    pub fn tld(&self) -> &'static str {
        match self {
            Self::Voice1 => "co.uk",
            Self::Voice2 => "com",
        }
    }
}

impl fmt::Display for VoiceSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoiceSlot {
    type Err = AppError;

    /// Принимает "Voice 1", "voice1", "1"
    fn from_str(s: &str) -> AppResult<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "voice1" | "1" => Ok(Self::Voice1),
            "voice2" | "2" => Ok(Self::Voice2),
            _ => Err(AppError::Validation(format!("Unknown voice: {}", s))),
        }
    }
}

/// Настраиваемый параметр голоса
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceParam {
    Pitch,
    Speed,
    LowPass,
    HighPass,
    BassBoost,
    FormantShift,
}

impl VoiceParam {
    pub const ALL: [VoiceParam; 6] = [
        VoiceParam::Pitch,
        VoiceParam::Speed,
        VoiceParam::LowPass,
        VoiceParam::HighPass,
        VoiceParam::BassBoost,
        VoiceParam::FormantShift,
    ];

    /// Ключ в сохранённом документе настроек
    pub fn key(&self) -> &'static str {
        match self {
            Self::Pitch => "pitch",
            Self::Speed => "speed",
            Self::LowPass => "low_pass",
            Self::HighPass => "high_pass",
            Self::BassBoost => "bass_boost",
            Self::FormantShift => "formant_shift",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pitch => "Pitch",
            Self::Speed => "Speed",
            Self::LowPass => "Low Pass",
            Self::HighPass => "High Pass",
            Self::BassBoost => "Bass Boost",
            Self::FormantShift => "Formant Shift",
        }
    }

    pub fn range(&self) -> RangeInclusive<f64> {
        match self {
            Self::Pitch => -5.0..=5.0,
            Self::Speed => 0.5..=1.5,
            Self::LowPass => 0.0..=5000.0,
            Self::HighPass => 0.0..=1000.0,
            Self::BassBoost => 0.0..=20.0,
            Self::FormantShift => -5.0..=5.0,
        }
    }

    /// Шаг кнопок +/-
    pub fn step(&self) -> f64 {
        match self {
            Self::Pitch => 0.1,
            Self::Speed => 0.01,
            Self::LowPass => 100.0,
            Self::HighPass => 50.0,
            Self::BassBoost => 1.0,
            Self::FormantShift => 0.1,
        }
    }

    pub fn clamp(&self, value: f64) -> f64 {
        let range = self.range();
        value.clamp(*range.start(), *range.end())
    }
}

impl fmt::Display for VoiceParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for VoiceParam {
    type Err = AppError;

    /// Принимает ключ ("low_pass") или подпись ("Low Pass")
    fn from_str(s: &str) -> AppResult<Self> {
        let key = s.trim().to_lowercase().replace([' ', '-'], "_");
        VoiceParam::ALL
            .into_iter()
            .find(|param| param.key() == key)
            .ok_or_else(|| AppError::Validation(format!("Unknown voice parameter: {}", s)))
    }
}

/// Набор параметров эффектов одного голоса
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiceProfile {
    /// Сдвиг высоты в полутонах
    #[serde(default)]
    pub pitch: f64,
    /// Множитель скорости
    #[serde(default = "default_speed")]
    pub speed: f64,
    /// Частота среза ФНЧ; 0 в документе означает "не задано"
    #[serde(default, with = "cutoff")]
    pub low_pass: Option<f64>,
    #[serde(default, with = "cutoff")]
    pub high_pass: Option<f64>,
    /// Усиление баса в дБ
    #[serde(default)]
    pub bass_boost: f64,
    #[serde(default)]
    pub formant_shift: f64,
}

fn default_speed() -> f64 {
    1.0
}

impl Default for VoiceProfile {
    fn default() -> Self {
        Self {
            pitch: 0.0,
            speed: 1.0,
            low_pass: None,
            high_pass: None,
            bass_boost: 0.0,
            formant_shift: 0.0,
        }
    }
}

impl VoiceProfile {
    pub fn get(&self, param: VoiceParam) -> f64 {
        match param {
            VoiceParam::Pitch => self.pitch,
            VoiceParam::Speed => self.speed,
            VoiceParam::LowPass => self.low_pass.unwrap_or(0.0),
            VoiceParam::HighPass => self.high_pass.unwrap_or(0.0),
            VoiceParam::BassBoost => self.bass_boost,
            VoiceParam::FormantShift => self.formant_shift,
        }
    }

    /// Копия профиля с новым значением параметра (без ограничения диапазоном)
    pub fn with(mut self, param: VoiceParam, value: f64) -> Self {
        match param {
            VoiceParam::Pitch => self.pitch = value,
            VoiceParam::Speed => self.speed = value,
            VoiceParam::LowPass => self.low_pass = cutoff::from_value(value),
            VoiceParam::HighPass => self.high_pass = cutoff::from_value(value),
            VoiceParam::BassBoost => self.bass_boost = value,
            VoiceParam::FormantShift => self.formant_shift = value,
        }
        self
    }

    /// Все параметры приведены к диапазонам `VoiceParam`
    pub fn clamped(self) -> Self {
        VoiceParam::ALL
            .into_iter()
            .fold(self, |profile, param| profile.with(param, param.clamp(profile.get(param))))
    }

    pub fn is_neutral(&self) -> bool {
        *self == Self::default()
    }
}

mod cutoff {
    use super::*;

    pub fn from_value(value: f64) -> Option<f64> {
        if value > 0.0 { Some(value) } else { None }
    }

    pub fn serialize<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.unwrap_or(0.0))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        let raw = Option::<f64>::deserialize(deserializer)?;
        Ok(raw.and_then(from_value))
    }
}
