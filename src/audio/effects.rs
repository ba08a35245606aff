//! Цепочка эффектов голоса.
//!
//! Порядок фиксирован: скорость, высота, ФНЧ, ФВЧ, усиление баса, сдвиг форманты.
//! Скорость и высота меняют только заявленную частоту дискретизации, поэтому
//! обе влияют и на темп, и на тон. Результат зависит только от входа и профиля.

use std::f64::consts::PI;

use log::debug;

use crate::audio::buffer::AudioBuffer;
use crate::errors::AppResult;
use crate::models::VoiceProfile;

/// Частота среза, выделяющая бас для усиления
const BASS_CUTOFF_HZ: f64 = 200.0;

/// Применяет профиль голоса к буферу
pub fn apply_voice_profile(input: &AudioBuffer, profile: &VoiceProfile) -> AppResult<AudioBuffer> {
    // Скорость применяется всегда, в том числе при множителе 1
    let speed_rate = (input.sample_rate() as f64 * profile.speed) as u32;
    let mut audio = input.with_sample_rate(speed_rate)?;

    if profile.pitch != 0.0 {
        let rate = (audio.sample_rate() as f64 * semitones_to_ratio(profile.pitch)) as u32;
        audio = audio.with_sample_rate(rate)?;
    }

    if let Some(cutoff) = profile.low_pass {
        audio = low_pass_filter(&audio, cutoff)?;
    }

    if let Some(cutoff) = profile.high_pass {
        audio = high_pass_filter(&audio, cutoff)?;
    }

    if profile.bass_boost > 0.0 {
        let bass = apply_gain(&low_pass_filter(&audio, BASS_CUTOFF_HZ)?, profile.bass_boost)?;
        audio = overlay(&audio, &bass)?;
    }

    if profile.formant_shift != 0.0 {
        audio = formant_shift(&audio, profile.formant_shift)?;
    }

    debug!(
        "Эффекты применены: {} Гц -> {} Гц, {:.2}с",
        input.sample_rate(),
        audio.sample_rate(),
        audio.duration_secs()
    );
    Ok(audio)
}

pub fn semitones_to_ratio(semitones: f64) -> f64 {
    2f64.powf(semitones / 12.0)
}

/// RC-фильтр нижних частот первого порядка
pub fn low_pass_filter(audio: &AudioBuffer, cutoff: f64) -> AppResult<AudioBuffer> {
    let rc = 1.0 / (cutoff * 2.0 * PI);
    let dt = 1.0 / audio.sample_rate() as f64;
    let alpha = dt / (rc + dt);

    let channels = audio.channels() as usize;
    let original = audio.samples();
    let mut filtered = original.to_vec();
    if original.is_empty() {
        return audio.with_samples(filtered);
    }

    // Первый кадр копируется как есть
    let mut last: Vec<f64> = original[..channels].iter().map(|&s| s as f64).collect();
    for frame in 1..audio.frame_count() {
        for ch in 0..channels {
            let offset = frame * channels + ch;
            last[ch] += alpha * (original[offset] as f64 - last[ch]);
            filtered[offset] = last[ch] as i16;
        }
    }
    audio.with_samples(filtered)
}

/// RC-фильтр верхних частот первого порядка
pub fn high_pass_filter(audio: &AudioBuffer, cutoff: f64) -> AppResult<AudioBuffer> {
    let rc = 1.0 / (cutoff * 2.0 * PI);
    let dt = 1.0 / audio.sample_rate() as f64;
    let alpha = rc / (rc + dt);

    let channels = audio.channels() as usize;
    let original = audio.samples();
    let mut filtered = original.to_vec();
    if original.is_empty() {
        return audio.with_samples(filtered);
    }

    let mut last: Vec<f64> = original[..channels].iter().map(|&s| s as f64).collect();
    for frame in 1..audio.frame_count() {
        for ch in 0..channels {
            let offset = frame * channels + ch;
            let prev = offset - channels;
            last[ch] = alpha * (last[ch] + original[offset] as f64 - original[prev] as f64);
            filtered[offset] = last[ch].clamp(i16::MIN as f64, i16::MAX as f64) as i16;
        }
    }
    audio.with_samples(filtered)
}

/// Изменение громкости на `db` децибел с ограничением по разрядности
pub fn apply_gain(audio: &AudioBuffer, db: f64) -> AppResult<AudioBuffer> {
    let factor = 10f64.powf(db / 20.0);
    let samples = audio
        .samples()
        .iter()
        .map(|&s| (s as f64 * factor).floor().clamp(i16::MIN as f64, i16::MAX as f64) as i16)
        .collect();
    audio.with_samples(samples)
}

/// Наложение `top` на `base`: сумма с насыщением, длина и формат берутся от `base`
pub fn overlay(base: &AudioBuffer, top: &AudioBuffer) -> AppResult<AudioBuffer> {
    let top = top.with_channels(base.channels())?.resample(base.sample_rate())?;
    let mut mixed = base.samples().to_vec();
    for (out, &add) in mixed.iter_mut().zip(top.samples()) {
        *out = out.saturating_add(add);
    }
    base.with_samples(mixed)
}

/// Повышение частоты на коэффициент и возврат к исходной.
///
/// Пара взаимно обратных шагов: частота и длительность не меняются.
pub fn formant_shift(audio: &AudioBuffer, semitones: f64) -> AppResult<AudioBuffer> {
    let original_rate = audio.sample_rate();
    let shifted_rate = (original_rate as f64 * semitones_to_ratio(semitones)) as u32;
    let shifted = audio.with_sample_rate(shifted_rate)?;
    shifted.with_sample_rate(original_rate)
}
