//! Задание конвертации одного файла
//!
//! Задание никогда не возвращает ошибку вызывающему коду: отсутствующий или
//! пустой файл, отказ синтеза и отказ хранилища превращаются в
//! `ConversionResult` со статусом `Failed` или `Skipped`.
//!
//! Переходы состояний запроса:
//! `Pending -> {Skipped | Failed | Synthesizing -> {Failed | Uploading -> {Failed | Success}}}`

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::config::BatchConfig;
use crate::error::{InputError, StorageError, TtsBatchError};
use crate::key::KeyGenerator;
use crate::models::{ConversionRequest, ConversionResult, JobStatus};
use crate::progress::{JobStage, ProgressInfo, ProgressReporter};
use crate::storage::{ObjectStore, PutOutcome, WriteMode, AUDIO_CONTENT_TYPE};
use crate::tts::SpeechSynthesizer;

/// Сколько раз пробовать новый ключ, если объект с таким ключом уже есть
const MAX_KEY_ATTEMPTS: usize = 3;

/// Параметры выполнения заданий
#[derive(Debug, Clone)]
pub struct JobSettings {
    /// Максимальная длина текста в символах
    pub max_characters: usize,
    /// Не перезаписывать существующий объект: запись только под свободным ключом
    pub check_existing: bool,
}

impl From<&BatchConfig> for JobSettings {
    fn from(config: &BatchConfig) -> Self {
        Self {
            max_characters: config.max_characters,
            check_existing: config.check_existing,
        }
    }
}

/// Позиция задания в запуске и получатель уведомлений о прогрессе
#[derive(Clone, Copy)]
pub struct JobProgress<'a> {
    pub index: usize,
    pub total: usize,
    pub reporter: Option<&'a dyn ProgressReporter>,
}

impl<'a> JobProgress<'a> {
    pub fn new(index: usize, total: usize, reporter: Option<&'a dyn ProgressReporter>) -> Self {
        Self {
            index,
            total,
            reporter,
        }
    }

    fn report(&self, source_path: &Path, stage: JobStage, details: Option<String>) {
        if let Some(reporter) = self.reporter {
            reporter.notify_progress(ProgressInfo::new(
                self.index,
                self.total,
                source_path,
                stage,
                details,
            ));
        }
    }
}

/// Ошибка внутри задания вместе с количеством уже прочитанных символов
struct JobFailure {
    character_count: usize,
    error: TtsBatchError,
}

impl JobFailure {
    fn new(character_count: usize, error: impl Into<TtsBatchError>) -> Self {
        Self {
            character_count,
            error: error.into(),
        }
    }
}

impl From<InputError> for JobFailure {
    fn from(error: InputError) -> Self {
        Self::new(0, error)
    }
}

/// Задание конвертации: синтез речи и загрузка результата
pub struct ConversionJob {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    store: Arc<dyn ObjectStore>,
    keys: Arc<KeyGenerator>,
    settings: JobSettings,
}

impl ConversionJob {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        store: Arc<dyn ObjectStore>,
        keys: Arc<KeyGenerator>,
        settings: JobSettings,
    ) -> Self {
        Self {
            synthesizer,
            store,
            keys,
            settings,
        }
    }

    /// Выполнить задание для одного запроса
    pub async fn run(
        &self,
        request: &ConversionRequest,
        progress: JobProgress<'_>,
    ) -> ConversionResult {
        let source = request.source_path();
        progress.report(source, JobStage::Pending, None);

        let result = match self.convert(request, &progress).await {
            Ok(result) => result,
            Err(JobFailure {
                error: TtsBatchError::Input(empty @ InputError::Empty(_)),
                ..
            }) => ConversionResult::skipped(request, empty.to_string()),
            Err(failure) => ConversionResult::failed(
                request,
                failure.character_count,
                failure_detail(&failure.error),
            ),
        };

        match result.status() {
            JobStatus::Success => log::info!(
                "Converted {} -> {} ({} characters, {} bytes)",
                source.display(),
                result.derived_object_key().unwrap_or_default(),
                result.character_count(),
                result.audio_byte_size()
            ),
            JobStatus::Skipped => log::warn!(
                "Skipped {}: {}",
                source.display(),
                result.error_detail().unwrap_or_default()
            ),
            JobStatus::Failed => log::error!(
                "Failed to convert {}: {}",
                source.display(),
                result.error_detail().unwrap_or_default()
            ),
        }

        let details = result
            .derived_object_key()
            .or_else(|| result.error_detail())
            .map(str::to_string);
        progress.report(source, result.status().into(), details);

        result
    }

    async fn convert(
        &self,
        request: &ConversionRequest,
        progress: &JobProgress<'_>,
    ) -> Result<ConversionResult, JobFailure> {
        let source = request.source_path();
        let text = read_text(source).await?;
        // Редакторы Windows часто пишут BOM в начало UTF-8 файла
        let text = text.trim_start_matches('\u{feff}').trim();

        if text.is_empty() {
            return Err(InputError::Empty(source.to_path_buf()).into());
        }

        let character_count = text.chars().count();
        if character_count > self.settings.max_characters {
            return Err(InputError::TooLong {
                path: source.to_path_buf(),
                limit: self.settings.max_characters,
                actual: character_count,
            }
            .into());
        }

        progress.report(source, JobStage::Synthesizing, None);
        let audio = self
            .synthesizer
            .synthesize(text, request.voice_id())
            .await
            .map_err(|e| JobFailure::new(character_count, e))?;

        let audio_byte_size = audio.len();
        let (key, produced_at) = self
            .upload(request, audio, character_count, progress)
            .await
            .map_err(|e| JobFailure::new(character_count, e))?;

        Ok(ConversionResult::success(
            request,
            key,
            character_count,
            audio_byte_size,
            produced_at,
        ))
    }

    /// Загрузить аудио под свободным ключом
    ///
    /// При `check_existing` запись условная: если ключ уже занят, выводится
    /// новый ключ, но не больше `MAX_KEY_ATTEMPTS` раз.
    async fn upload(
        &self,
        request: &ConversionRequest,
        audio: Bytes,
        character_count: usize,
        progress: &JobProgress<'_>,
    ) -> Result<(String, DateTime<Utc>), StorageError> {
        let source = request.source_path();
        let mode = if self.settings.check_existing {
            WriteMode::IfAbsent
        } else {
            WriteMode::Overwrite
        };

        for attempt in 1..=MAX_KEY_ATTEMPTS {
            let (key, produced_at) = self.keys.next_key(source, request.voice_id());
            progress.report(source, JobStage::Uploading, Some(key.clone()));

            let metadata = object_metadata(request, &produced_at.to_rfc3339(), character_count);
            let outcome = self
                .store
                .put(&key, audio.clone(), AUDIO_CONTENT_TYPE, &metadata, mode)
                .await?;

            match outcome {
                PutOutcome::Stored => return Ok((key, produced_at)),
                PutOutcome::KeyTaken => log::warn!(
                    "Object key {} already exists (attempt {} of {}), deriving a new one",
                    key,
                    attempt,
                    MAX_KEY_ATTEMPTS
                ),
            }
        }

        Err(StorageError::new(
            "KeyCollision",
            format!("no free object key after {} attempts", MAX_KEY_ATTEMPTS),
        ))
    }
}

/// Прочитать текст входного файла
async fn read_text(path: &Path) -> Result<String, InputError> {
    tokio::fs::read_to_string(path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => InputError::NotFound(path.to_path_buf()),
        _ => InputError::Unreadable {
            path: path.to_path_buf(),
            source: e,
        },
    })
}

/// Текст ошибки для отчета
///
/// Для ошибок входных данных сохраняется короткая форма (`not found`,
/// `empty input`), остальные ошибки пишутся вместе с кодом сервиса.
fn failure_detail(error: &TtsBatchError) -> String {
    match error {
        TtsBatchError::Input(e) => e.to_string(),
        other => other.to_string(),
    }
}

/// Метаданные объекта; значения заголовков S3 должны быть в ASCII
fn object_metadata(
    request: &ConversionRequest,
    produced_at: &str,
    character_count: usize,
) -> HashMap<String, String> {
    let ascii = |value: &str| -> String {
        value
            .chars()
            .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '_' })
            .collect()
    };

    HashMap::from([
        (
            "source-path".to_string(),
            ascii(&request.source_path().to_string_lossy()),
        ),
        ("voice-id".to_string(), ascii(request.voice_id())),
        ("produced-at".to_string(), produced_at.to_string()),
        ("character-count".to_string(), character_count.to_string()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::MemoryProgressObserver;
    use crate::progress::DefaultProgressReporter;
    use crate::tests::fakes::{FakeStore, FakeSynthesizer};

    fn job(
        synthesizer: Arc<FakeSynthesizer>,
        store: Arc<FakeStore>,
        max_characters: usize,
    ) -> ConversionJob {
        job_with(synthesizer, store, max_characters, true)
    }

    fn job_with(
        synthesizer: Arc<FakeSynthesizer>,
        store: Arc<FakeStore>,
        max_characters: usize,
        check_existing: bool,
    ) -> ConversionJob {
        ConversionJob::new(
            synthesizer,
            store,
            Arc::new(KeyGenerator::new("audio/", "0a1b2c3d")),
            JobSettings {
                max_characters,
                check_existing,
            },
        )
    }

    fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn missing_file_fails_without_collaborator_calls() {
        let dir = tempfile::tempdir().unwrap();
        let synthesizer = Arc::new(FakeSynthesizer::new());
        let store = Arc::new(FakeStore::new());
        let job = job(synthesizer.clone(), store.clone(), 3000);

        let request = ConversionRequest::new(dir.path().join("c.txt"), "Joanna").unwrap();
        let result = job.run(&request, JobProgress::new(0, 1, None)).await;

        assert_eq!(result.status(), JobStatus::Failed);
        assert_eq!(result.error_detail(), Some("not found"));
        assert_eq!(synthesizer.calls(), 0);
        assert_eq!(store.put_calls(), 0);
    }

    #[tokio::test]
    async fn whitespace_only_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "b.txt", "  \n\t \n");
        let synthesizer = Arc::new(FakeSynthesizer::new());
        let store = Arc::new(FakeStore::new());
        let job = job(synthesizer.clone(), store.clone(), 3000);

        let request = ConversionRequest::new(path, "Joanna").unwrap();
        let result = job.run(&request, JobProgress::new(0, 1, None)).await;

        assert_eq!(result.status(), JobStatus::Skipped);
        assert_eq!(result.error_detail(), Some("empty input"));
        assert_eq!(result.character_count(), 0);
        assert_eq!(synthesizer.calls(), 0);
        assert_eq!(store.put_calls(), 0);
    }

    #[tokio::test]
    async fn too_long_input_fails_before_synthesis() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "long.txt", "abcdef");
        let synthesizer = Arc::new(FakeSynthesizer::new());
        let store = Arc::new(FakeStore::new());
        let job = job(synthesizer.clone(), store, 5);

        let request = ConversionRequest::new(path, "Joanna").unwrap();
        let result = job.run(&request, JobProgress::new(0, 1, None)).await;

        assert_eq!(result.status(), JobStatus::Failed);
        assert_eq!(result.error_detail(), Some("input exceeds 5 characters (6)"));
        assert_eq!(synthesizer.calls(), 0);
    }

    #[tokio::test]
    async fn synthesis_error_keeps_collaborator_code() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "a.txt", "Hello");
        let synthesizer =
            Arc::new(FakeSynthesizer::failing("ThrottlingException", "Rate exceeded"));
        let store = Arc::new(FakeStore::new());
        let job = job(synthesizer.clone(), store.clone(), 3000);

        let request = ConversionRequest::new(path, "Joanna").unwrap();
        let result = job.run(&request, JobProgress::new(0, 1, None)).await;

        assert_eq!(result.status(), JobStatus::Failed);
        assert_eq!(result.character_count(), 5);
        let detail = result.error_detail().unwrap();
        assert!(detail.contains("ThrottlingException"), "{}", detail);
        assert!(detail.contains("Rate exceeded"), "{}", detail);
        assert_eq!(synthesizer.calls(), 1);
        assert_eq!(store.put_calls(), 0);
    }

    #[tokio::test]
    async fn storage_error_becomes_failed_result() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "a.txt", "Hello");
        let synthesizer = Arc::new(FakeSynthesizer::new());
        let store = Arc::new(FakeStore::failing_put("AccessDenied", "Access Denied"));
        let job = job(synthesizer, store.clone(), 3000);

        let request = ConversionRequest::new(path, "Joanna").unwrap();
        let result = job.run(&request, JobProgress::new(0, 1, None)).await;

        assert_eq!(result.status(), JobStatus::Failed);
        assert!(result.derived_object_key().is_none());
        assert!(result.error_detail().unwrap().contains("AccessDenied"));
        assert_eq!(store.put_calls(), 1);
    }

    #[tokio::test]
    async fn success_uploads_mp3_with_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "a.txt", "  Hello  \n");
        let synthesizer = Arc::new(FakeSynthesizer::new());
        let store = Arc::new(FakeStore::new());
        let job = job(synthesizer.clone(), store.clone(), 3000);

        let observer = MemoryProgressObserver::new();
        let reporter = DefaultProgressReporter::with_observer(Box::new(observer.clone()));

        let request = ConversionRequest::new(path.clone(), "Joanna").unwrap();
        let result = job.run(&request, JobProgress::new(0, 1, Some(&reporter))).await;

        assert_eq!(result.status(), JobStatus::Success);
        assert_eq!(result.character_count(), 5);
        assert_eq!(synthesizer.texts(), vec!["Hello".to_string()]);

        let key = result.derived_object_key().unwrap().to_string();
        assert!(key.starts_with("audio/a-Joanna-"));
        assert!(key.ends_with(".mp3"));

        let object = store.object(&key).unwrap();
        assert_eq!(object.content_type, "audio/mpeg");
        assert_eq!(object.body.len(), result.audio_byte_size());
        assert_eq!(object.metadata["voice-id"], "Joanna");
        assert_eq!(object.metadata["character-count"], "5");
        assert_eq!(object.metadata["produced-at"], result.produced_at().to_rfc3339());
        assert_eq!(
            object.metadata["source-path"],
            path.to_string_lossy().to_string()
        );

        assert_eq!(
            observer.stages_of(0),
            vec![
                JobStage::Pending,
                JobStage::Synthesizing,
                JobStage::Uploading,
                JobStage::Succeeded
            ]
        );
    }

    #[tokio::test]
    async fn existing_key_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "a.txt", "Hello");
        let store = Arc::new(FakeStore::new());
        store.occupy_next_keys(1);
        let job = job(Arc::new(FakeSynthesizer::new()), store.clone(), 3000);

        let request = ConversionRequest::new(path, "Joanna").unwrap();
        let result = job.run(&request, JobProgress::new(0, 1, None)).await;

        assert_eq!(result.status(), JobStatus::Success);
        assert_eq!(store.put_calls(), 2);
        assert_eq!(store.keys(), vec![result.derived_object_key().unwrap().to_string()]);
        assert_eq!(store.modes(), vec![WriteMode::IfAbsent, WriteMode::IfAbsent]);
    }

    #[tokio::test]
    async fn disabled_key_check_writes_unconditionally() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "a.txt", "Hello");
        let store = Arc::new(FakeStore::new());
        store.occupy_next_keys(1);
        let job = job_with(Arc::new(FakeSynthesizer::new()), store.clone(), 3000, false);

        let request = ConversionRequest::new(path, "Joanna").unwrap();
        let result = job.run(&request, JobProgress::new(0, 1, None)).await;

        assert_eq!(result.status(), JobStatus::Success);
        assert_eq!(store.put_calls(), 1);
        assert_eq!(store.modes(), vec![WriteMode::Overwrite]);
    }

    #[tokio::test]
    async fn bom_only_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "notes.txt", "\u{feff}\r\n");
        let synthesizer = Arc::new(FakeSynthesizer::new());
        let store = Arc::new(FakeStore::new());
        let job = job(synthesizer.clone(), store.clone(), 3000);

        let request = ConversionRequest::new(path, "Joanna").unwrap();
        let result = job.run(&request, JobProgress::new(0, 1, None)).await;

        assert_eq!(result.status(), JobStatus::Skipped);
        assert_eq!(result.error_detail(), Some("empty input"));
        assert_eq!(synthesizer.calls(), 0);
        assert_eq!(store.put_calls(), 0);
    }

    #[tokio::test]
    async fn leading_bom_is_not_sent_to_synthesis() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "notes.txt", "\u{feff}Hello");
        let synthesizer = Arc::new(FakeSynthesizer::new());
        let job = job(synthesizer.clone(), Arc::new(FakeStore::new()), 3000);

        let request = ConversionRequest::new(path, "Joanna").unwrap();
        let result = job.run(&request, JobProgress::new(0, 1, None)).await;

        assert_eq!(result.character_count(), 5);
        assert_eq!(synthesizer.texts(), vec!["Hello".to_string()]);
    }

    #[tokio::test]
    async fn persistent_key_collision_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "a.txt", "Hello");
        let store = Arc::new(FakeStore::new());
        store.occupy_next_keys(MAX_KEY_ATTEMPTS);
        let job = job(Arc::new(FakeSynthesizer::new()), store.clone(), 3000);

        let request = ConversionRequest::new(path, "Joanna").unwrap();
        let result = job.run(&request, JobProgress::new(0, 1, None)).await;

        assert_eq!(result.status(), JobStatus::Failed);
        assert!(result.error_detail().unwrap().contains("KeyCollision"));
        assert_eq!(store.put_calls(), MAX_KEY_ATTEMPTS);
        assert!(store.keys().is_empty());
    }

    #[test]
    fn metadata_values_are_ascii() {
        let request = ConversionRequest::new("тексты/речь.txt", "Tatyana").unwrap();
        let metadata = object_metadata(&request, "2025-06-10T00:00:00+00:00", 42);

        assert!(metadata.values().all(|v| v.is_ascii()));
        assert_eq!(metadata["character-count"], "42");
        assert!(metadata["source-path"].ends_with(".txt"));
    }
}
