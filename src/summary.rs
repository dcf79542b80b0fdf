//! Сохранение итогового отчета запуска
//!
//! Отчет пишется во временный файл в той же директории и затем атомарно
//! переименовывается, заменяя отчет предыдущего запуска.

use std::io::Write;
use std::path::Path;

use crate::error::Result;
use crate::models::BatchSummary;

/// Записать отчет в JSON-файл, перезаписав предыдущий
pub fn write_summary(path: impl AsRef<Path>, summary: &BatchSummary) -> Result<()> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut file, summary)?;
    file.write_all(b"\n")?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;

    log::info!("Batch summary written to {}", path.display());
    Ok(())
}

/// Прочитать ранее сохраненный отчет
pub fn read_summary(path: impl AsRef<Path>) -> Result<BatchSummary> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
