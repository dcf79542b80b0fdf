//! Модуль конфигурации библиотеки tts-batch
//!
//! Настройки собираются из значений по умолчанию, JSON-файла, переменных
//! окружения и аргументов командной строки (в порядке возрастания приоритета).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TtsBatchError};
use crate::models::ConversionRequest;

/// Голос по умолчанию
pub const DEFAULT_VOICE_ID: &str = "Joanna";
/// Префикс ключей аудиофайлов в хранилище
pub const DEFAULT_KEY_PREFIX: &str = "audio/";
/// Путь к итоговому отчету
pub const DEFAULT_SUMMARY_PATH: &str = "tts-summary.json";
/// Максимальная длина текста одного запроса к Polly
pub const DEFAULT_MAX_CHARACTERS: usize = 3000;

/// Движок синтеза речи Polly
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpeechEngine {
    /// Стандартный движок
    #[default]
    Standard,
    /// Нейронный движок
    Neural,
}

impl SpeechEngine {
    /// Получить строковое представление движка
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Neural => "neural",
        }
    }
}

impl std::str::FromStr for SpeechEngine {
    type Err = TtsBatchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "neural" => Ok(Self::Neural),
            other => Err(TtsBatchError::configuration(format!(
                "unknown speech engine '{}', expected 'standard' or 'neural'",
                other
            ))),
        }
    }
}

/// Конфигурация запуска
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Бакет S3 для загрузки аудио
    pub bucket: Option<String>,
    /// Регион AWS
    pub region: Option<String>,
    /// Альтернативный адрес сервисов (например, localstack)
    pub endpoint_url: Option<String>,
    /// Голос Polly
    pub voice_id: String,
    /// Движок Polly
    pub engine: SpeechEngine,
    /// Префикс ключей объектов
    pub key_prefix: String,
    /// Куда записывать итоговый отчет
    pub summary_path: PathBuf,
    /// Максимальная длина текста в символах
    pub max_characters: usize,
    /// Сколько заданий выполнять одновременно (1 - строго последовательно)
    pub max_concurrent_jobs: usize,
    /// Проверять существование ключа перед загрузкой
    pub check_existing: bool,
    /// Файл для записи прогресса
    pub progress_log: Option<PathBuf>,
    /// Входные текстовые файлы
    pub inputs: Vec<PathBuf>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            region: None,
            endpoint_url: None,
            voice_id: DEFAULT_VOICE_ID.to_string(),
            engine: SpeechEngine::default(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            summary_path: PathBuf::from(DEFAULT_SUMMARY_PATH),
            max_characters: DEFAULT_MAX_CHARACTERS,
            max_concurrent_jobs: 1,
            check_existing: true,
            progress_log: None,
            inputs: Vec::new(),
        }
    }
}

impl BatchConfig {
    /// Загрузить конфигурацию из JSON-файла
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TtsBatchError::configuration(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            TtsBatchError::configuration(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Дополнить конфигурацию переменными окружения
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Дополнить конфигурацию из произвольного источника переменных
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(bucket) = get("S3_BUCKET_NAME") {
            self.bucket = Some(bucket);
        }
        if let Some(region) = get("AWS_REGION").or_else(|| get("AWS_DEFAULT_REGION")) {
            self.region = Some(region);
        }
        if let Some(endpoint) = get("AWS_ENDPOINT_URL") {
            self.endpoint_url = Some(endpoint);
        }
        if let Some(voice) = get("POLLY_VOICE_ID") {
            self.voice_id = voice;
        }
    }

    /// Проверить, что заданы все обязательные параметры
    ///
    /// Список входных файлов здесь не проверяется: запросы могут быть
    /// переданы в `BatchRunner::run` отдельно от конфигурации.
    pub fn validate(&self) -> Result<()> {
        if !is_set(&self.bucket) {
            return Err(TtsBatchError::configuration(
                "target bucket is not set (S3_BUCKET_NAME or --bucket)",
            ));
        }
        if !is_set(&self.region) {
            return Err(TtsBatchError::configuration(
                "AWS region is not set (AWS_REGION or --region)",
            ));
        }
        if self.voice_id.trim().is_empty() {
            return Err(TtsBatchError::configuration("voice id must not be empty"));
        }
        if self.max_concurrent_jobs == 0 {
            return Err(TtsBatchError::configuration(
                "max_concurrent_jobs must be at least 1",
            ));
        }
        if self.max_characters == 0 {
            return Err(TtsBatchError::configuration("max_characters must be at least 1"));
        }

        Ok(())
    }

    /// Сформировать запросы по всем входным файлам в исходном порядке
    pub fn requests(&self) -> Result<Vec<ConversionRequest>> {
        self.inputs
            .iter()
            .map(|path| ConversionRequest::new(path.clone(), self.voice_id.clone()))
            .collect()
    }

    /// Имя бакета (после успешной валидации)
    pub fn bucket_name(&self) -> Result<&str> {
        self.bucket
            .as_deref()
            .filter(|b| !b.trim().is_empty())
            .ok_or_else(|| TtsBatchError::configuration("target bucket is not set"))
    }
}

fn is_set(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}
