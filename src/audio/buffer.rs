//! Неизменяемый PCM-буфер.
//!
//! Каждое преобразование возвращает новый буфер; семплы разделяются через `Arc`,
//! поэтому смена только частоты дискретизации не копирует данные.

use std::sync::Arc;

use crate::errors::{AppError, AppResult};

/// 16-битный interleaved PCM с частотой и числом каналов
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Arc<[i16]>,
    sample_rate: u32,
    channels: u16,
}

impl AudioBuffer {
    pub fn new(samples: Vec<i16>, sample_rate: u32, channels: u16) -> AppResult<Self> {
        if sample_rate == 0 {
            return Err(AppError::AudioProcessing("Sample rate must be positive".into()));
        }
        if channels == 0 {
            return Err(AppError::AudioProcessing("Channel count must be positive".into()));
        }
        if samples.len() % channels as usize != 0 {
            return Err(AppError::AudioProcessing(format!(
                "{} samples do not form whole frames of {} channels",
                samples.len(),
                channels
            )));
        }
        Ok(Self {
            samples: samples.into(),
            sample_rate,
            channels,
        })
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn duration_secs(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Те же семплы с другой заявленной частотой (темп и высота меняются вместе)
    pub fn with_sample_rate(&self, sample_rate: u32) -> AppResult<Self> {
        if sample_rate == 0 {
            return Err(AppError::AudioProcessing(format!(
                "Effect produced an invalid sample rate (from {} Hz)",
                self.sample_rate
            )));
        }
        Ok(Self {
            samples: Arc::clone(&self.samples),
            sample_rate,
            channels: self.channels,
        })
    }

    /// Новые семплы в формате этого буфера
    pub fn with_samples(&self, samples: Vec<i16>) -> AppResult<Self> {
        Self::new(samples, self.sample_rate, self.channels)
    }

    /// Линейная передискретизация с сохранением длительности
    pub fn resample(&self, target_rate: u32) -> AppResult<Self> {
        if target_rate == self.sample_rate {
            return Ok(self.clone());
        }
        if target_rate == 0 {
            return Err(AppError::AudioProcessing("Target sample rate must be positive".into()));
        }

        let channels = self.channels as usize;
        let frames = self.frame_count();
        let out_frames =
            (frames as f64 * target_rate as f64 / self.sample_rate as f64).round() as usize;
        let step = self.sample_rate as f64 / target_rate as f64;

        let mut out = Vec::with_capacity(out_frames * channels);
        for i in 0..out_frames {
            let pos = i as f64 * step;
            let idx = (pos.floor() as usize).min(frames.saturating_sub(1));
            let next = (idx + 1).min(frames.saturating_sub(1));
            let frac = pos - idx as f64;
            for ch in 0..channels {
                let a = self.samples[idx * channels + ch] as f64;
                let b = self.samples[next * channels + ch] as f64;
                out.push((a + (b - a) * frac).round() as i16);
            }
        }
        Self::new(out, target_rate, self.channels)
    }

    /// Смена числа каналов: моно размножается, многоканальный сигнал усредняется в моно
    pub fn with_channels(&self, channels: u16) -> AppResult<Self> {
        if channels == self.channels {
            return Ok(self.clone());
        }
        let samples: Vec<i16> = match (self.channels, channels) {
            (1, n) => self
                .samples
                .iter()
                .flat_map(|&s| std::iter::repeat(s).take(n as usize))
                .collect(),
            (n, 1) => self
                .samples
                .chunks(n as usize)
                .map(|frame| {
                    let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                    (sum / n as i32) as i16
                })
                .collect(),
            (from, to) => {
                return Err(AppError::AudioProcessing(format!(
                    "Cannot convert {} channels to {}",
                    from, to
                )));
            }
        };
        Self::new(samples, self.sample_rate, channels)
    }

    /// Склейка по порядку; форматы приводятся к наибольшей частоте и числу каналов
    pub fn concat(buffers: &[AudioBuffer]) -> AppResult<AudioBuffer> {
        let first = buffers
            .first()
            .ok_or_else(|| AppError::AudioProcessing("Nothing to concatenate".into()))?;
        let rate = buffers.iter().map(|b| b.sample_rate).max().unwrap_or(first.sample_rate);
        let channels = buffers.iter().map(|b| b.channels).max().unwrap_or(first.channels);

        let mut samples = Vec::with_capacity(buffers.iter().map(|b| b.samples.len()).sum());
        for buffer in buffers {
            let synced = buffer.with_channels(channels)?.resample(rate)?;
            samples.extend_from_slice(synced.samples());
        }
        AudioBuffer::new(samples, rate, channels)
    }
}
