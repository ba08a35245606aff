//! Сборка видео: картинки равной длительности поверх аудиодорожки.

use std::fmt::Write as _;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::Serialize;
use tempfile::Builder;

use crate::errors::{AppError, AppResult};
use crate::services::{display_name, VideoCompositor};
use crate::utils::ffmpeg::run_ffmpeg_command_async;
use crate::utils::fs::remove_quietly;

/// Картинка и время её показа
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageSlot {
    pub path: PathBuf,
    pub duration_secs: f64,
}

/// Что и куда собирать
#[derive(Debug, Clone, Serialize)]
pub struct VideoPlan {
    pub timeline: Vec<ImageSlot>,
    pub audio_path: PathBuf,
    pub output_path: PathBuf,
    pub fps: u32,
}

/// Делит длительность аудио поровну между картинками
pub fn compute_timeline(images: &[PathBuf], total_audio_secs: f64) -> AppResult<Vec<ImageSlot>> {
    if images.is_empty() {
        return Err(AppError::Service("No images to compile into a video".into()));
    }
    if !(total_audio_secs > 0.0) {
        return Err(AppError::Service(format!(
            "Audio track has no duration ({})",
            total_audio_secs
        )));
    }

    let per_image = total_audio_secs / images.len() as f64;
    Ok(images
        .iter()
        .map(|path| ImageSlot {
            path: path.clone(),
            duration_secs: per_image,
        })
        .collect())
}

/// Список для concat-демультиплексора FFmpeg.
///
/// Относительные пути FFmpeg ищет от каталога самого списка, поэтому
/// в список попадают абсолютные пути.
/// Последний файл повторяется без длительности, иначе его `duration` игнорируется.
pub fn concat_list(timeline: &[ImageSlot]) -> AppResult<String> {
    let mut list = String::from("ffconcat version 1.0\n");
    for slot in timeline {
        let _ = writeln!(list, "file '{}'", list_entry(&slot.path)?);
        let _ = writeln!(list, "duration {:.6}", slot.duration_secs);
    }
    if let Some(last) = timeline.last() {
        let _ = writeln!(list, "file '{}'", list_entry(&last.path)?);
    }
    Ok(list)
}

fn list_entry(path: &Path) -> AppResult<String> {
    let absolute = std::path::absolute(path).map_err(|e| {
        AppError::FileSystem(format!("Cannot resolve {}: {}", path.display(), e))
    })?;
    Ok(absolute.to_string_lossy().replace('\'', "'\\''"))
}

/// Аргументы FFmpeg: H.264 + AAC, фиксированная частота кадров
pub fn ffmpeg_args(plan: &VideoPlan, list_path: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        "0".to_string(),
        "-i".to_string(),
        list_path.to_string_lossy().to_string(),
        "-i".to_string(),
        plan.audio_path.to_string_lossy().to_string(),
        "-r".to_string(),
        plan.fps.to_string(),
        "-vf".to_string(),
        "scale=trunc(iw/2)*2:trunc(ih/2)*2".to_string(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-shortest".to_string(),
        plan.output_path.to_string_lossy().to_string(),
    ]
}

/// Сборка через FFmpeg из PATH
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegCompositor;

#[async_trait::async_trait]
impl VideoCompositor for FfmpegCompositor {
    async fn compose(&self, plan: &VideoPlan) -> AppResult<PathBuf> {
        let output_dir = plan
            .output_path
            .parent()
            .ok_or_else(|| AppError::FileSystem("Video output path has no directory".into()))?;

        let mut list_file = Builder::new()
            .prefix("concat_")
            .suffix(".txt")
            .tempfile_in(output_dir)?;
        list_file.write_all(concat_list(&plan.timeline)?.as_bytes())?;
        list_file.flush()?;

        info!(
            "Сборка видео {} из {} картинок, {} fps",
            display_name(&plan.output_path),
            plan.timeline.len(),
            plan.fps
        );

        let args = ffmpeg_args(plan, list_file.path());
        if let Err(e) = run_ffmpeg_command_async(&args).await {
            warn!("Сборка видео не удалась, удаляем {}", plan.output_path.display());
            remove_quietly(&plan.output_path);
            return Err(e);
        }

        Ok(plan.output_path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DataLayout;

    fn paths(n: usize) -> Vec<PathBuf> {
        (0..n).map(|i| PathBuf::from(format!("IMAGES/image_{}.jpg", i))).collect()
    }

    #[test]
    fn test_equal_split() {
        let total = 37.5;
        for k in [1, 3, 7] {
            let timeline = compute_timeline(&paths(k), total).unwrap();
            assert_eq!(timeline.len(), k);
            for slot in &timeline {
                assert!((slot.duration_secs - total / k as f64).abs() < 1e-9);
            }
            let sum: f64 = timeline.iter().map(|s| s.duration_secs).sum();
            assert!((sum - total).abs() < 1e-9);
        }
    }

    #[test]
    fn test_zero_images_is_service_error() {
        assert!(matches!(compute_timeline(&[], 10.0), Err(AppError::Service(_))));
    }

    fn list_files(list: &str) -> Vec<PathBuf> {
        list.lines()
            .filter_map(|line| line.strip_prefix("file '"))
            .map(|rest| PathBuf::from(rest.trim_end_matches('\'')))
            .collect()
    }

    #[test]
    fn test_concat_list_repeats_last_image() {
        let timeline = compute_timeline(&paths(2), 4.0).unwrap();
        let list = concat_list(&timeline).unwrap();
        let lines: Vec<&str> = list.lines().collect();

        assert_eq!(lines[2], "duration 2.000000");
        let files = list_files(&list);
        assert_eq!(files.len(), 3);
        assert!(files[0].ends_with("IMAGES/image_0.jpg"));
        assert_eq!(files[1], files[2]);
        assert!(files[2].ends_with("IMAGES/image_1.jpg"));
    }

    #[test]
    fn test_concat_list_entries_are_absolute_for_relative_root() {
        let layout = DataLayout::new(Path::new("."));
        let images = vec![
            layout.images_dir.join("image_a.jpg"),
            layout.images_dir.join("image_b.jpg"),
        ];
        let timeline = compute_timeline(&images, 3.0).unwrap();

        let files = list_files(&concat_list(&timeline).unwrap());
        assert!(files.iter().all(|path| path.is_absolute()), "{:?}", files);

        let cwd = std::env::current_dir().unwrap();
        assert!(files[0].starts_with(&cwd));
        assert!(files[0].ends_with("IMAGES/image_a.jpg"));
    }

    #[test]
    fn test_ffmpeg_args_codecs() {
        let plan = VideoPlan {
            timeline: compute_timeline(&paths(1), 1.0).unwrap(),
            audio_path: PathBuf::from("PROJECTS/story/voice.mp3"),
            output_path: PathBuf::from("PROJECTS/story/final_video_story.mp4"),
            fps: 24,
        };
        let args = ffmpeg_args(&plan, Path::new("list.txt"));
        let joined = args.join(" ");

        assert!(joined.contains("-r 24"));
        assert!(joined.contains("-c:v libx264"));
        assert!(joined.contains("-c:a aac"));
        assert_eq!(args.last().map(String::as_str), Some("PROJECTS/story/final_video_story.mp4"));
    }
}
