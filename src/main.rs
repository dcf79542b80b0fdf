use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use tts_batch::logger::init_logger;
use tts_batch::notification::{
    CompositeProgressObserver, ConsoleProgressObserver, FileProgressObserver,
};
use tts_batch::{runner_from_config, BatchConfig, BatchSummary, RunOutcome, SpeechEngine};

/// Озвучить текстовые файлы через Amazon Polly и загрузить MP3 в S3
#[derive(Parser, Debug)]
#[command(name = "tts-batch", version, about)]
struct Cli {
    /// Текстовые файлы для озвучивания (в порядке обработки)
    inputs: Vec<PathBuf>,

    /// Голос Polly
    #[arg(long)]
    voice: Option<String>,

    /// Бакет S3 для загрузки аудио
    #[arg(long)]
    bucket: Option<String>,

    /// Регион AWS
    #[arg(long)]
    region: Option<String>,

    /// Альтернативный адрес сервисов AWS
    #[arg(long)]
    endpoint_url: Option<String>,

    /// Движок Polly: standard или neural
    #[arg(long)]
    engine: Option<SpeechEngine>,

    /// Префикс ключей объектов
    #[arg(long)]
    key_prefix: Option<String>,

    /// Путь к итоговому JSON-отчету
    #[arg(long)]
    summary_path: Option<PathBuf>,

    /// Максимальная длина текста одного файла в символах
    #[arg(long)]
    max_characters: Option<usize>,

    /// Сколько файлов обрабатывать одновременно
    #[arg(long)]
    concurrency: Option<usize>,

    /// Разрешить перезапись объекта с тем же ключом
    #[arg(long)]
    no_check_existing: bool,

    /// Дописывать прогресс в указанный файл
    #[arg(long)]
    progress_log: Option<PathBuf>,

    /// JSON-файл с конфигурацией
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    /// Собрать конфигурацию: файл, затем окружение, затем аргументы
    fn into_config(self) -> anyhow::Result<BatchConfig> {
        self.into_config_with_env(|key| std::env::var(key).ok())
    }

    fn into_config_with_env<F>(self, lookup: F) -> anyhow::Result<BatchConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match &self.config {
            Some(path) => BatchConfig::from_file(path).with_context(|| {
                format!("Failed to load configuration from {}", path.display())
            })?,
            None => BatchConfig::default(),
        };
        config.apply_env_from(lookup);

        if let Some(voice) = self.voice {
            config.voice_id = voice;
        }
        if let Some(bucket) = self.bucket {
            config.bucket = Some(bucket);
        }
        if let Some(region) = self.region {
            config.region = Some(region);
        }
        if let Some(url) = self.endpoint_url {
            config.endpoint_url = Some(url);
        }
        if let Some(engine) = self.engine {
            config.engine = engine;
        }
        if let Some(prefix) = self.key_prefix {
            config.key_prefix = prefix;
        }
        if let Some(path) = self.summary_path {
            config.summary_path = path;
        }
        if let Some(limit) = self.max_characters {
            config.max_characters = limit;
        }
        if let Some(concurrency) = self.concurrency {
            config.max_concurrent_jobs = concurrency;
        }
        if self.no_check_existing {
            config.check_existing = false;
        }
        if let Some(path) = self.progress_log {
            config.progress_log = Some(path);
        }
        if !self.inputs.is_empty() {
            config.inputs = self.inputs;
        }

        Ok(config)
    }
}

fn print_summary(summary: &BatchSummary, summary_path: &std::path::Path) {
    println!(
        "Processed {} of {} files ({} skipped, {} failed, {} not attempted), \
         {} characters, {} bytes of audio",
        summary.processed(),
        summary.requested(),
        summary.skipped(),
        summary.failed(),
        summary.not_attempted(),
        summary.total_characters(),
        summary.total_audio_bytes()
    );
    for key in summary.object_keys() {
        println!("  {}", key);
    }
    println!("Summary written to {}", summary_path.display());
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logger();

    let config = match Cli::parse().into_config() {
        Ok(config) => config,
        Err(e) => {
            log::error!("{:#}", e);
            return ExitCode::from(RunOutcome::ConfigurationError.exit_code());
        }
    };
    let summary_path = config.summary_path.clone();
    let progress_log = config.progress_log.clone();

    let mut runner = match runner_from_config(config).await {
        Ok(runner) => runner,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::from(RunOutcome::from_result(&Err(e)).exit_code());
        }
    };

    let mut observers = CompositeProgressObserver::new();
    observers.add_observer(Box::new(ConsoleProgressObserver::new().terminal_only()));
    if let Some(path) = progress_log {
        observers.add_observer(Box::new(FileProgressObserver::new(path)));
    }
    runner.add_observer(Box::new(observers));

    let token = runner.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received, finishing in-flight files and stopping");
            token.cancel();
        }
    });

    let result = runner.run_configured().await;
    match &result {
        Ok(summary) => print_summary(summary, &summary_path),
        Err(e) => log::error!("Batch run failed: {}", e),
    }

    ExitCode::from(RunOutcome::from_result(&result).exit_code())
}
