//! Модуль для работы с FFmpeg
//!
//! Этот модуль содержит функции для поиска и запуска FFmpeg.

use std::path::PathBuf;
use std::process::Command;

use log::{debug, error};

use crate::errors::{AppError, AppResult};

/// Поиск FFmpeg в PATH
pub fn find_ffmpeg() -> AppResult<PathBuf> {
    which::which("ffmpeg")
        .map_err(|e| AppError::Configuration(format!("ffmpeg not found in PATH: {}", e)))
}

/// Получение версии FFmpeg
pub fn get_ffmpeg_version() -> AppResult<String> {
    let output = Command::new(find_ffmpeg()?).arg("-version").output()?;

    if !output.status.success() {
        return Err(AppError::Service("Failed to get FFmpeg version".to_string()));
    }

    let version_str = String::from_utf8_lossy(&output.stdout);
    Ok(version_str.lines().next().unwrap_or("").to_string())
}

/// Запуск команды FFmpeg (блокирующий)
pub fn run_ffmpeg_command(args: &[&str]) -> AppResult<()> {
    let ffmpeg = find_ffmpeg()?;
    debug!("ffmpeg {}", args.join(" "));

    let output = Command::new(ffmpeg).args(args).output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!("FFmpeg failed: {}", stderr.trim());
        return Err(AppError::Service(format!(
            "FFmpeg command failed with status: {}",
            output.status
        )));
    }

    Ok(())
}

/// Запуск команды FFmpeg без блокировки рантайма
pub async fn run_ffmpeg_command_async(args: &[String]) -> AppResult<()> {
    let ffmpeg = find_ffmpeg()?;
    debug!("ffmpeg {}", args.join(" "));

    let output = tokio::process::Command::new(ffmpeg)
        .args(args)
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!("FFmpeg failed: {}", stderr.trim());
        return Err(AppError::Service(format!(
            "FFmpeg command failed with status: {}",
            output.status
        )));
    }

    Ok(())
}
