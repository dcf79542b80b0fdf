//! Модели данных пакетной конвертации
//!
//! Запрос создается на каждый входной файл в начале запуска, результат
//! создается ровно одним выполнением задания и больше не изменяется,
//! итоговый отчет собирается один раз после обработки всех запросов.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, TtsBatchError};

/// Запрос на конвертацию одного файла
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRequest {
    source_path: PathBuf,
    voice_id: String,
}

impl ConversionRequest {
    /// Создать запрос; идентификатор голоса не может быть пустым
    pub fn new(source_path: impl Into<PathBuf>, voice_id: impl Into<String>) -> Result<Self> {
        let voice_id = voice_id.into();
        if voice_id.trim().is_empty() {
            return Err(TtsBatchError::configuration("voice id must not be empty"));
        }

        Ok(Self {
            source_path: source_path.into(),
            voice_id,
        })
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn voice_id(&self) -> &str {
        &self.voice_id
    }
}

/// Конечное состояние запроса
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Аудио синтезировано и загружено
    Success,
    /// Входной файл пуст, сервисы не вызывались
    Skipped,
    /// Ошибка чтения, синтеза или загрузки
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }
}

/// Результат выполнения одного задания
///
/// Создается только конструкторами и после этого не изменяется.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionResult {
    source_path: PathBuf,
    /// Ключ объекта в хранилище, есть только у успешных результатов
    derived_object_key: Option<String>,
    voice_id: String,
    character_count: usize,
    audio_byte_size: usize,
    produced_at: DateTime<Utc>,
    status: JobStatus,
    error_detail: Option<String>,
}

impl ConversionResult {
    /// Успешная конвертация
    pub fn success(
        request: &ConversionRequest,
        object_key: String,
        character_count: usize,
        audio_byte_size: usize,
        produced_at: DateTime<Utc>,
    ) -> Self {
        Self {
            source_path: request.source_path.clone(),
            derived_object_key: Some(object_key),
            voice_id: request.voice_id.clone(),
            character_count,
            audio_byte_size,
            produced_at,
            status: JobStatus::Success,
            error_detail: None,
        }
    }

    /// Пропущенный запрос
    pub fn skipped(request: &ConversionRequest, detail: impl Into<String>) -> Self {
        Self::terminal(request, JobStatus::Skipped, 0, detail.into())
    }

    /// Неудачный запрос
    pub fn failed(
        request: &ConversionRequest,
        character_count: usize,
        detail: impl Into<String>,
    ) -> Self {
        Self::terminal(request, JobStatus::Failed, character_count, detail.into())
    }

    fn terminal(
        request: &ConversionRequest,
        status: JobStatus,
        character_count: usize,
        detail: String,
    ) -> Self {
        Self {
            source_path: request.source_path.clone(),
            derived_object_key: None,
            voice_id: request.voice_id.clone(),
            character_count,
            audio_byte_size: 0,
            produced_at: Utc::now(),
            status,
            error_detail: Some(detail),
        }
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn derived_object_key(&self) -> Option<&str> {
        self.derived_object_key.as_deref()
    }

    pub fn voice_id(&self) -> &str {
        &self.voice_id
    }

    pub fn character_count(&self) -> usize {
        self.character_count
    }

    pub fn audio_byte_size(&self) -> usize {
        self.audio_byte_size
    }

    pub fn produced_at(&self) -> DateTime<Utc> {
        self.produced_at
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn error_detail(&self) -> Option<&str> {
        self.error_detail.as_deref()
    }

    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Success
    }
}

/// Итоговый отчет одного запуска
///
/// Счетчики вычисляются из `results` в `finalize` и отдельно не меняются.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    /// Количество запрошенных файлов
    requested: usize,
    /// Количество успешных конвертаций
    processed: usize,
    skipped: usize,
    failed: usize,
    /// Запросы, до которых не дошла очередь из-за отмены
    not_attempted: usize,
    total_characters: usize,
    total_audio_bytes: usize,
    /// Запуск был прерван до обработки всех запросов
    incomplete: bool,
    results: Vec<ConversionResult>,
}

impl BatchSummary {
    /// Собрать отчет из результатов в порядке входных запросов
    pub fn finalize(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        requested: usize,
        results: Vec<ConversionResult>,
        incomplete: bool,
    ) -> Self {
        let count = |status: JobStatus| results.iter().filter(|r| r.status == status).count();
        let processed = count(JobStatus::Success);
        let skipped = count(JobStatus::Skipped);
        let failed = count(JobStatus::Failed);

        Self {
            run_id,
            started_at,
            finished_at: Utc::now(),
            requested,
            processed,
            skipped,
            failed,
            not_attempted: requested.saturating_sub(results.len()),
            total_characters: results.iter().map(|r| r.character_count).sum(),
            total_audio_bytes: results.iter().map(|r| r.audio_byte_size).sum(),
            incomplete,
            results,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    pub fn requested(&self) -> usize {
        self.requested
    }

    /// Количество успешных конвертаций
    pub fn processed(&self) -> usize {
        self.processed
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn not_attempted(&self) -> usize {
        self.not_attempted
    }

    pub fn total_characters(&self) -> usize {
        self.total_characters
    }

    pub fn total_audio_bytes(&self) -> usize {
        self.total_audio_bytes
    }

    pub fn incomplete(&self) -> bool {
        self.incomplete
    }

    /// Результаты в порядке входных запросов
    pub fn results(&self) -> &[ConversionResult] {
        &self.results
    }

    /// Запуск считается успешным, если хотя бы один запрос завершился успехом
    pub fn is_success(&self) -> bool {
        self.processed > 0
    }

    /// Ключи всех загруженных объектов
    pub fn object_keys(&self) -> impl Iterator<Item = &str> {
        self.results.iter().filter_map(|r| r.derived_object_key())
    }
}
