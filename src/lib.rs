//! Основной файл библиотеки tts-batch
//!
//! Библиотека озвучивает набор текстовых файлов через Amazon Polly,
//! загружает полученный MP3 в S3 под уникальным ключом и сохраняет
//! итоговый JSON-отчет по каждому запуску.

pub mod config;
pub mod error;
pub mod job;
pub mod key;
pub mod logger;
pub mod models;
pub mod notification;
pub mod progress;
pub mod runner;
pub mod storage;
pub mod summary;
pub mod tts;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use aws_config::{BehaviorVersion, Region, SdkConfig};

pub use crate::config::{BatchConfig, SpeechEngine};
pub use crate::error::{Result, TtsBatchError};
pub use crate::models::{BatchSummary, ConversionRequest, ConversionResult, JobStatus};
pub use crate::progress::{ProgressObserver, ProgressReporter};
pub use crate::runner::{BatchRunner, RunOutcome};

use crate::storage::S3ObjectStore;
use crate::tts::PollySynthesizer;

/// Загрузить общую конфигурацию AWS для Polly и S3
///
/// Учетные данные берутся из стандартной цепочки провайдеров SDK.
pub async fn load_aws_config(config: &BatchConfig) -> Result<SdkConfig> {
    let region = config
        .region
        .clone()
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| TtsBatchError::configuration("AWS region is not set"))?;

    let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region));
    if let Some(url) = config.endpoint_url.as_deref() {
        log::info!("Using custom AWS endpoint: {}", url);
        loader = loader.endpoint_url(url);
    }

    Ok(loader.load().await)
}

/// Создать исполнитель с клиентами Polly и S3
///
/// Конфигурация проверяется до создания клиентов.
pub async fn runner_from_config(config: BatchConfig) -> Result<BatchRunner> {
    config.validate()?;

    let sdk_config = load_aws_config(&config).await?;
    let synthesizer = PollySynthesizer::from_sdk_config(&sdk_config, config.engine);
    let store = S3ObjectStore::from_sdk_config(
        &sdk_config,
        config.bucket_name()?,
        config.endpoint_url.as_deref(),
    );
    log::debug!("AWS clients ready, uploads go to bucket {}", store.bucket());

    Ok(BatchRunner::new(config, Arc::new(synthesizer), Arc::new(store)))
}
