//! # Audio Format Handling
//!
//! Декодирование ответов TTS (MP3) в PCM и экспорт готовой дорожки
//! в WAV (hound) или MP3 (через FFmpeg).

use std::io::Cursor;
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};
use log::{info, warn};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::probe::Hint;
use tempfile::Builder;

use crate::audio::buffer::AudioBuffer;
use crate::config::AudioFormat;
use crate::errors::{AppError, AppResult};
use crate::utils::ffmpeg::run_ffmpeg_command;

/// Декодирует сжатое аудио (MP3, WAV) в interleaved PCM.
///
/// Битые пакеты пропускаются с предупреждением.
pub fn decode_audio(data: &[u8], extension_hint: &str) -> AppResult<AudioBuffer> {
    let cursor = Cursor::new(data.to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

    let mut hint = Hint::new();
    hint.with_extension(extension_hint);

    let format_opts = FormatOptions {
        enable_gapless: false,
        ..Default::default()
    };

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &format_opts, &Default::default())
        .map_err(|e| AppError::AudioProcessing(format!("Ошибка проверки формата: {}", e)))?;

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AppError::AudioProcessing("Не найден аудио-трек".to_string()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions { verify: false })
        .map_err(|e| AppError::AudioProcessing(format!("Не удалось создать декодер: {}", e)))?;

    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(24000);
    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(1);

    let mut pcm = Vec::new();
    while let Ok(packet) = format.next_packet() {
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate = spec.rate;
                channels = spec.channels.count() as u16;

                let mut sample_buf = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
                sample_buf.copy_interleaved_ref(decoded);
                pcm.extend_from_slice(sample_buf.samples());
            }
            Err(e) => {
                warn!("Ошибка декодирования пакета: {}", e);
                continue;
            }
        }
    }

    if pcm.is_empty() {
        return Err(AppError::AudioProcessing("Decoded audio is empty".into()));
    }

    info!("Декодировано {} семплов с частотой {}", pcm.len(), sample_rate);
    AudioBuffer::new(pcm, sample_rate, channels)
}

/// Экспорт буфера в файл
pub trait AudioEncoder: Send + Sync {
    fn extension(&self) -> &'static str;

    fn encode(&self, audio: &AudioBuffer, output_path: &Path) -> AppResult<()>;
}

/// Кодировщик для выбранного формата
pub fn encoder_for(format: AudioFormat) -> Box<dyn AudioEncoder> {
    match format {
        AudioFormat::Mp3 => Box::new(Mp3Encoder),
        AudioFormat::Wav => Box::new(WavEncoder),
    }
}

/// 16-битный PCM WAV
#[derive(Debug, Clone, Copy, Default)]
pub struct WavEncoder;

impl AudioEncoder for WavEncoder {
    fn extension(&self) -> &'static str {
        AudioFormat::Wav.extension()
    }

    fn encode(&self, audio: &AudioBuffer, output_path: &Path) -> AppResult<()> {
        let spec = WavSpec {
            channels: audio.channels(),
            sample_rate: audio.sample_rate(),
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };

        let mut writer = WavWriter::create(output_path, spec)?;
        for &sample in audio.samples() {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;

        info!(
            "Записан WAV {} ({:.2}с)",
            output_path.display(),
            audio.duration_secs()
        );
        Ok(())
    }
}

/// MP3 через промежуточный WAV и libmp3lame
#[derive(Debug, Clone, Copy, Default)]
pub struct Mp3Encoder;

impl AudioEncoder for Mp3Encoder {
    fn extension(&self) -> &'static str {
        AudioFormat::Mp3.extension()
    }

    fn encode(&self, audio: &AudioBuffer, output_path: &Path) -> AppResult<()> {
        let temp_wav = Builder::new().prefix("vidstories_").suffix(".wav").tempfile()?;
        WavEncoder.encode(audio, temp_wav.path())?;

        let input = temp_wav.path().to_string_lossy().to_string();
        let output = output_path.to_string_lossy().to_string();
        run_ffmpeg_command(&[
            "-y",
            "-i",
            &input,
            "-codec:a",
            "libmp3lame",
            "-q:a",
            "2",
            &output,
        ])?;

        info!("Записан MP3 {}", output_path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_wav_export_decodes_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let samples: Vec<i16> = (0..2400).map(|i| ((i % 100) * 100) as i16).collect();
        let audio = AudioBuffer::new(samples, 24000, 1).unwrap();

        WavEncoder.encode(&audio, &path).unwrap();

        let decoded = decode_audio(&std::fs::read(&path).unwrap(), "wav").unwrap();
        assert_eq!(decoded.sample_rate(), 24000);
        assert_eq!(decoded.channels(), 1);
        assert_eq!(decoded.frame_count(), audio.frame_count());
    }

    #[test]
    fn test_garbage_is_rejected() {
        let result = decode_audio(b"definitely not audio", "mp3");
        assert!(matches!(result, Err(AppError::AudioProcessing(_))));
    }
}
