//! Файловые утилиты: атомарная запись и перемещение артефактов.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use tempfile::NamedTempFile;

use crate::errors::{AppError, AppResult};

/// Атомарно записывает данные в файл.
///
/// Данные пишутся во временный файл в той же директории, синхронизируются
/// на диск и только затем переименовываются в целевой путь. После сбоя
/// на диске остаётся либо старая, либо новая версия файла.
pub fn write_atomic<P: AsRef<Path>>(path: P, data: &[u8]) -> AppResult<()> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| {
        AppError::FileSystem(format!("Failed to create temp file in {}: {}", dir.display(), e))
    })?;
    tmp.write_all(data)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;

    debug!("Атомарно записан файл {} ({} байт)", path.display(), data.len());
    Ok(())
}

/// Перемещает файл, при необходимости через копирование (разные разделы).
pub fn move_file(from: &Path, to: &Path) -> AppResult<()> {
    if let Err(e) = fs::rename(from, to) {
        warn!(
            "rename {} -> {} не удался ({}), пробуем копирование",
            from.display(),
            to.display(),
            e
        );
        fs::copy(from, to).map_err(|e| {
            AppError::FileSystem(format!(
                "Failed to move {} to {}: {}",
                from.display(),
                to.display(),
                e
            ))
        })?;
        fs::remove_file(from)?;
    }
    Ok(())
}

/// Удаляет файл, если он существует. Ошибки только логируются.
pub fn remove_quietly(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            warn!("Не удалось удалить {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_atomic_replaces_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        write_atomic(&path, b"{\"a\":1}").unwrap();
        write_atomic(&path, b"{\"a\":2}").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"a\":2}");
        // Временных файлов не остаётся
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_move_file() {
        let dir = tempdir().unwrap();
        let from = dir.path().join("a.mp3");
        let to = dir.path().join("b.mp3");
        fs::write(&from, b"data").unwrap();

        move_file(&from, &to).unwrap();

        assert!(!from.exists());
        assert_eq!(fs::read(&to).unwrap(), b"data");
    }
}
