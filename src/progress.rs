//! Модуль для отслеживания прогресса пакетной конвертации
//!
//! Реализация паттерна Observer: задания сообщают о смене этапа каждого
//! запроса, наблюдатели выводят эти события в консоль, файл или память.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::models::JobStatus;

/// Этап обработки одного запроса
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    /// Запрос ожидает обработки
    Pending,
    /// Идет синтез речи
    Synthesizing,
    /// Идет загрузка в хранилище
    Uploading,
    /// Аудио загружено
    Succeeded,
    /// Запрос пропущен
    Skipped,
    /// Запрос завершился ошибкой
    Failed,
}

impl JobStage {
    /// Получить название этапа в виде строки
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Synthesizing => "synthesizing",
            Self::Uploading => "uploading",
            Self::Succeeded => "succeeded",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }

    /// Является ли этап конечным
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Skipped | Self::Failed)
    }
}

impl From<JobStatus> for JobStage {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Success => Self::Succeeded,
            JobStatus::Skipped => Self::Skipped,
            JobStatus::Failed => Self::Failed,
        }
    }
}

/// Информация о прогрессе одного запроса
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressInfo {
    /// Позиция запроса во входном списке (с нуля)
    pub index: usize,
    /// Всего запросов в запуске
    pub total: usize,
    /// Исходный файл
    pub source_path: PathBuf,
    /// Текущий этап
    pub stage: JobStage,
    /// Дополнительная информация (ключ объекта или текст ошибки)
    pub details: Option<String>,
}

impl ProgressInfo {
    pub fn new(
        index: usize,
        total: usize,
        source_path: impl Into<PathBuf>,
        stage: JobStage,
        details: Option<String>,
    ) -> Self {
        Self {
            index,
            total,
            source_path: source_path.into(),
            stage,
            details,
        }
    }

    /// Доля завершенных запросов в процентах (0.0 - 100.0)
    pub fn percent(&self) -> f32 {
        if self.total == 0 {
            return 100.0;
        }
        let done = if self.stage.is_terminal() {
            self.index + 1
        } else {
            self.index
        };
        (done as f32 / self.total as f32 * 100.0).clamp(0.0, 100.0)
    }
}

/// Трейт для наблюдателя, получающего уведомления о прогрессе
pub trait ProgressObserver: Send + Sync {
    /// Метод, вызываемый при обновлении прогресса
    fn on_progress_update(&self, progress: ProgressInfo);
}

/// Трейт для объекта, отправляющего уведомления о прогрессе
pub trait ProgressReporter: Send + Sync {
    /// Добавить наблюдателя
    ///
    /// Возвращает уникальный идентификатор наблюдателя, который можно использовать
    /// для его удаления в будущем.
    fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> usize;

    /// Удалить наблюдателя по идентификатору
    fn remove_observer(&mut self, id: usize) -> Option<Box<dyn ProgressObserver>>;

    /// Уведомить всех наблюдателей о прогрессе
    fn notify_progress(&self, progress: ProgressInfo);
}

/// Реализация ProgressReporter, рассылающая события синхронно
pub struct DefaultProgressReporter {
    /// Список наблюдателей
    observers: RwLock<HashMap<usize, Box<dyn ProgressObserver>>>,
    /// Счетчик для генерации уникальных идентификаторов наблюдателей
    next_id: AtomicUsize,
}

impl DefaultProgressReporter {
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(HashMap::new()),
            next_id: AtomicUsize::new(0),
        }
    }

    /// Создать репортер с одним наблюдателем
    pub fn with_observer(observer: Box<dyn ProgressObserver>) -> Self {
        let mut reporter = Self::new();
        reporter.add_observer(observer);
        reporter
    }

    /// Количество подписанных наблюдателей
    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }
}

impl Default for DefaultProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for DefaultProgressReporter {
    fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> usize {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.observers.write().insert(id, observer);
        id
    }

    fn remove_observer(&mut self, id: usize) -> Option<Box<dyn ProgressObserver>> {
        self.observers.write().remove(&id)
    }

    fn notify_progress(&self, progress: ProgressInfo) {
        let observers = self.observers.read();
        for observer in observers.values() {
            observer.on_progress_update(progress.clone());
        }
    }
}
