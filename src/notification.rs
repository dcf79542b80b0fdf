//! Наблюдатели прогресса пакетного запуска: консоль, файл, память, обратный вызов

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::progress::{JobStage, ProgressInfo, ProgressObserver};

/// Сформировать строку прогресса вида `[2/3] b.txt: skipped (empty input)`
fn format_progress(progress: &ProgressInfo) -> String {
    let details = progress
        .details
        .as_deref()
        .map(|d| format!(" ({})", d))
        .unwrap_or_default();

    format!(
        "[{}/{}] {}: {}{}",
        progress.index + 1,
        progress.total,
        progress.source_path.display(),
        progress.stage.as_str(),
        details
    )
}

/// Наблюдатель, выводящий информацию о прогрессе в консоль
pub struct ConsoleProgressObserver {
    /// Префикс для вывода (опционально)
    prefix: Option<String>,
    /// Выводить только конечные этапы
    terminal_only: bool,
}

impl ConsoleProgressObserver {
    pub fn new() -> Self {
        Self {
            prefix: None,
            terminal_only: false,
        }
    }

    /// Создать наблюдатель с префиксом строки
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            terminal_only: false,
        }
    }

    /// Выводить только итог по каждому файлу
    pub fn terminal_only(mut self) -> Self {
        self.terminal_only = true;
        self
    }
}

impl Default for ConsoleProgressObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for ConsoleProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        if self.terminal_only && !progress.stage.is_terminal() {
            return;
        }

        let prefix = self.prefix.as_deref().unwrap_or("");
        let line = format!("{}{}", prefix, format_progress(&progress));
        if progress.stage == JobStage::Failed {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    }
}

/// Наблюдатель, сохраняющий информацию о прогрессе в памяти
#[derive(Clone, Default)]
pub struct MemoryProgressObserver {
    /// История обновлений прогресса
    history: Arc<Mutex<Vec<ProgressInfo>>>,
}

impl MemoryProgressObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Получить историю обновлений прогресса
    pub fn history(&self) -> Vec<ProgressInfo> {
        self.history.lock().clone()
    }

    /// Этапы, через которые прошел запрос с указанным индексом
    pub fn stages_of(&self, index: usize) -> Vec<JobStage> {
        self.history
            .lock()
            .iter()
            .filter(|p| p.index == index)
            .map(|p| p.stage)
            .collect()
    }

    /// Очистить историю обновлений прогресса
    pub fn clear_history(&self) {
        self.history.lock().clear();
    }
}

impl ProgressObserver for MemoryProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        self.history.lock().push(progress);
    }
}

/// Наблюдатель, дописывающий информацию о прогрессе в файл
pub struct FileProgressObserver {
    file_path: PathBuf,
}

impl FileProgressObserver {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
        }
    }
}

impl ProgressObserver for FileProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        let log_entry = format!(
            "[{}] {}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            format_progress(&progress)
        );

        let result = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)
            .and_then(|mut file| file.write_all(log_entry.as_bytes()));

        if let Err(e) = result {
            log::warn!(
                "Failed to write progress to {}: {}",
                self.file_path.display(),
                e
            );
        }
    }
}

/// Наблюдатель, вызывающий функцию обратного вызова при обновлении прогресса
pub struct CallbackProgressObserver<F>
where
    F: Fn(ProgressInfo) + Send + Sync + 'static,
{
    callback: F,
}

impl<F> CallbackProgressObserver<F>
where
    F: Fn(ProgressInfo) + Send + Sync + 'static,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressObserver for CallbackProgressObserver<F>
where
    F: Fn(ProgressInfo) + Send + Sync + 'static,
{
    fn on_progress_update(&self, progress: ProgressInfo) {
        (self.callback)(progress);
    }
}

/// Комбинированный наблюдатель, объединяющий несколько наблюдателей
#[derive(Default)]
pub struct CompositeProgressObserver {
    observers: Vec<Box<dyn ProgressObserver>>,
}

impl CompositeProgressObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Добавить наблюдателя
    pub fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) {
        self.observers.push(observer);
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl ProgressObserver for CompositeProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        for observer in &self.observers {
            observer.on_progress_update(progress.clone());
        }
    }
}
