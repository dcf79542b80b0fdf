//! Пакетный запуск конвертации
//!
//! Проверяет конфигурацию, выполняет задания в порядке входного списка,
//! изолирует ошибки отдельных файлов и сохраняет итоговый отчет.

use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::BatchConfig;
use crate::error::{Result, TtsBatchError};
use crate::job::{ConversionJob, JobProgress, JobSettings};
use crate::key::KeyGenerator;
use crate::models::{BatchSummary, ConversionRequest};
use crate::progress::{DefaultProgressReporter, ProgressObserver, ProgressReporter};
use crate::storage::ObjectStore;
use crate::summary::write_summary;
use crate::tts::SpeechSynthesizer;

/// Итог запуска для кода завершения процесса
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Хотя бы один файл успешно сконвертирован
    Succeeded,
    /// Запуск завершен, но успешных конвертаций нет
    NoSuccess,
    /// Ошибка конфигурации, задания не выполнялись
    ConfigurationError,
    /// Другая фатальная ошибка (например, не удалось записать отчет)
    Fatal,
}

impl RunOutcome {
    pub fn from_result(result: &Result<BatchSummary>) -> Self {
        match result {
            Ok(summary) if summary.is_success() => Self::Succeeded,
            Ok(_) => Self::NoSuccess,
            Err(e) if e.is_configuration() => Self::ConfigurationError,
            Err(_) => Self::Fatal,
        }
    }

    /// Код завершения процесса
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Succeeded => 0,
            Self::NoSuccess | Self::Fatal => 1,
            Self::ConfigurationError => 2,
        }
    }
}

/// Исполнитель пакетной конвертации
pub struct BatchRunner {
    config: BatchConfig,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    store: Arc<dyn ObjectStore>,
    /// Репортер прогресса
    reporter: Option<Box<dyn ProgressReporter>>,
    cancel: CancellationToken,
}

impl BatchRunner {
    /// Создать исполнитель с уже созданными клиентами сервисов
    pub fn new(
        config: BatchConfig,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            config,
            synthesizer,
            store,
            reporter: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Установить репортер прогресса
    pub fn with_progress_reporter(mut self, reporter: Box<dyn ProgressReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Использовать внешний токен отмены
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Добавить наблюдателя прогресса
    pub fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> usize {
        self.reporter
            .get_or_insert_with(|| Box::new(DefaultProgressReporter::new()))
            .add_observer(observer)
    }

    /// Токен, отмена которого останавливает запуск новых заданий
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Выполнить запуск по входным файлам из конфигурации
    pub async fn run_configured(&self) -> Result<BatchSummary> {
        let requests = self.config.requests()?;
        self.run(requests).await
    }

    /// Выполнить запуск по списку запросов
    ///
    /// Возвращает ошибку только при неверной конфигурации (до выполнения
    /// первого задания) или если не удалось сохранить отчет.
    pub async fn run(&self, requests: Vec<ConversionRequest>) -> Result<BatchSummary> {
        self.config.validate()?;
        if requests.is_empty() {
            return Err(TtsBatchError::configuration("no input files given"));
        }

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let total = requests.len();

        log::info!("Starting batch run {}", run_id);
        log::info!("  Files: {}", total);
        log::info!("  Bucket: {}", self.config.bucket_name()?);
        log::info!("  Engine: {}", self.config.engine.as_str());
        log::info!("  Max concurrent jobs: {}", self.config.max_concurrent_jobs);

        let job = ConversionJob::new(
            self.synthesizer.clone(),
            self.store.clone(),
            Arc::new(KeyGenerator::for_run(self.config.key_prefix.clone(), run_id)),
            JobSettings::from(&self.config),
        );
        let reporter = self.reporter.as_deref();

        // buffered() отдает результаты в порядке входного списка, а не в порядке завершения
        let results: Vec<_> = stream::iter(requests.iter().enumerate())
            .take_while(|_| futures::future::ready(!self.cancel.is_cancelled()))
            .map(|(index, request)| job.run(request, JobProgress::new(index, total, reporter)))
            .buffered(self.config.max_concurrent_jobs)
            .collect()
            .await;

        let incomplete = results.len() < total;
        if incomplete {
            log::warn!(
                "Batch run {} was cancelled after {} of {} files",
                run_id,
                results.len(),
                total
            );
        }

        let summary = BatchSummary::finalize(run_id, started_at, total, results, incomplete);
        write_summary(&self.config.summary_path, &summary)?;

        log::info!(
            "Batch run {} finished: {} converted, {} skipped, {} failed, {} not attempted",
            run_id,
            summary.processed(),
            summary.skipped(),
            summary.failed(),
            summary.not_attempted()
        );

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobStatus;
    use crate::notification::MemoryProgressObserver;
    use crate::progress::JobStage;
    use crate::tests::fakes::{FakeStore, FakeSynthesizer};
    use std::path::PathBuf;

    fn config(dir: &tempfile::TempDir) -> BatchConfig {
        BatchConfig {
            bucket: Some("polly-demo".into()),
            region: Some("us-east-1".into()),
            summary_path: dir.path().join("summary.json"),
            ..BatchConfig::default()
        }
    }

    fn requests(paths: &[PathBuf]) -> Vec<ConversionRequest> {
        paths
            .iter()
            .map(|p| ConversionRequest::new(p.clone(), "Joanna").unwrap())
            .collect()
    }

    fn write_inputs(dir: &tempfile::TempDir, count: usize) -> Vec<PathBuf> {
        (0..count)
            .map(|i| {
                let path = dir.path().join(format!("part{}.txt", i));
                std::fs::write(&path, format!("Paragraph number {}", i)).unwrap();
                path
            })
            .collect()
    }

    #[tokio::test]
    async fn missing_bucket_runs_zero_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let synthesizer = Arc::new(FakeSynthesizer::new());
        let store = Arc::new(FakeStore::new());
        let config = BatchConfig {
            bucket: None,
            ..config(&dir)
        };
        let summary_path = config.summary_path.clone();

        let runner = BatchRunner::new(config, synthesizer.clone(), store.clone());
        let result = runner.run(requests(&write_inputs(&dir, 2))).await;

        assert_eq!(RunOutcome::from_result(&result), RunOutcome::ConfigurationError);
        assert_eq!(RunOutcome::ConfigurationError.exit_code(), 2);
        assert_eq!(synthesizer.calls(), 0);
        assert_eq!(store.put_calls(), 0);
        assert!(!summary_path.exists());
    }

    #[tokio::test]
    async fn empty_request_list_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let runner = BatchRunner::new(
            config(&dir),
            Arc::new(FakeSynthesizer::new()),
            Arc::new(FakeStore::new()),
        );

        let err = runner.run(Vec::new()).await.unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn failing_item_does_not_stop_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = write_inputs(&dir, 5);
        let synthesizer =
            Arc::new(FakeSynthesizer::failing_on_call(2, "InvalidSsmlException", "bad text"));
        let store = Arc::new(FakeStore::new());

        let runner = BatchRunner::new(config(&dir), synthesizer.clone(), store.clone());
        let summary = runner.run(requests(&inputs)).await.unwrap();

        assert_eq!(synthesizer.calls(), 5);
        assert_eq!(summary.results().len(), 5);
        assert_eq!(summary.processed(), 4);
        assert_eq!(summary.failed(), 1);
        assert_eq!(summary.results()[2].status(), JobStatus::Failed);
        assert_eq!(summary.results()[2].source_path(), inputs[2]);
        assert_eq!(store.put_calls(), 4);
    }

    #[tokio::test]
    async fn summary_order_follows_input_order_with_concurrency() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = write_inputs(&dir, 6);
        // Первые файлы синтезируются дольше остальных
        let synthesizer = Arc::new(FakeSynthesizer::new().with_decreasing_delay(60));
        let config = BatchConfig {
            max_concurrent_jobs: 3,
            ..config(&dir)
        };

        let runner = BatchRunner::new(config, synthesizer, Arc::new(FakeStore::new()));
        let summary = runner.run(requests(&inputs)).await.unwrap();

        let paths: Vec<_> = summary
            .results()
            .iter()
            .map(|r| r.source_path().to_path_buf())
            .collect();
        assert_eq!(paths, inputs);
        assert_eq!(summary.processed(), 6);
    }

    #[tokio::test]
    async fn cancellation_keeps_completed_results() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = write_inputs(&dir, 4);
        let token = CancellationToken::new();
        let synthesizer = Arc::new(FakeSynthesizer::new().cancel_on_call(1, token.clone()));

        let runner = BatchRunner::new(config(&dir), synthesizer.clone(), Arc::new(FakeStore::new()))
            .with_cancellation(token);
        let summary = runner.run(requests(&inputs)).await.unwrap();

        assert!(summary.incomplete());
        assert_eq!(summary.results().len(), 2);
        assert_eq!(summary.processed(), 2);
        assert_eq!(summary.not_attempted(), 2);
        assert_eq!(synthesizer.calls(), 2);
        assert_eq!(
            summary.processed() + summary.skipped() + summary.failed() + summary.not_attempted(),
            summary.requested()
        );

        let stored = crate::summary::read_summary(&runner.config().summary_path).unwrap();
        assert!(stored.incomplete());
    }

    #[tokio::test]
    async fn observers_receive_per_item_progress() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = write_inputs(&dir, 2);
        let observer = MemoryProgressObserver::new();

        let mut runner = BatchRunner::new(
            config(&dir),
            Arc::new(FakeSynthesizer::new()),
            Arc::new(FakeStore::new()),
        );
        runner.add_observer(Box::new(observer.clone()));
        runner.run(requests(&inputs)).await.unwrap();

        let history = observer.history();
        assert!(history.iter().all(|p| p.total == 2));
        assert_eq!(observer.stages_of(1).last(), Some(&JobStage::Succeeded));
        assert_eq!(history.last().unwrap().percent(), 100.0);
    }

    #[test]
    fn outcome_exit_codes() {
        assert_eq!(RunOutcome::Succeeded.exit_code(), 0);
        assert_eq!(RunOutcome::NoSuccess.exit_code(), 1);
        assert_eq!(RunOutcome::Fatal.exit_code(), 1);

        let io: Result<BatchSummary> = Err(std::io::Error::other("disk full").into());
        assert_eq!(RunOutcome::from_result(&io), RunOutcome::Fatal);
    }
}
