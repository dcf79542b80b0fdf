//! Модуль обработки ошибок библиотеки tts-batch
//!
//! Фатальной для запуска является только ошибка конфигурации. Ошибки входных
//! файлов и внешних сервисов перехватываются на уровне одного задания и
//! превращаются в запись `Failed`/`Skipped` в итоговом отчете.

use std::path::PathBuf;
use thiserror::Error;

/// Ошибки библиотеки tts-batch
#[derive(Debug, Error)]
pub enum TtsBatchError {
    /// Ошибка конфигурации: прерывает запуск до выполнения первого задания
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Ошибка входного файла
    #[error("Input error: {0}")]
    Input(#[from] InputError),

    /// Ошибка синтеза речи
    #[error("Synthesis error: {0}")]
    Synthesis(#[from] SynthesisError),

    /// Ошибка хранилища
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Ошибка ввода-вывода
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Ошибка сериализации/десериализации JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TtsBatchError {
    /// Создать ошибку конфигурации
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Является ли ошибка ошибкой конфигурации
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

/// Ошибки чтения входного текстового файла
#[derive(Debug, Error)]
pub enum InputError {
    /// Файл отсутствует
    #[error("not found")]
    NotFound(PathBuf),

    /// Файл пуст или содержит только пробельные символы
    #[error("empty input")]
    Empty(PathBuf),

    /// Текст превышает допустимую длину запроса
    #[error("input exceeds {limit} characters ({actual})")]
    TooLong {
        path: PathBuf,
        limit: usize,
        actual: usize,
    },

    /// Файл не удалось прочитать
    #[error("unreadable input: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl InputError {
    /// Путь к файлу, вызвавшему ошибку
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::NotFound(path) | Self::Empty(path) => path,
            Self::TooLong { path, .. } | Self::Unreadable { path, .. } => path,
        }
    }
}

/// Ошибка сервиса синтеза речи
///
/// Код и сообщение сохраняются в том виде, в каком их вернул сервис
/// (например, `ThrottlingException`, `InvalidVoiceId`).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct SynthesisError {
    pub code: String,
    pub message: String,
}

impl SynthesisError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Ошибка объектного хранилища
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct StorageError {
    pub code: String,
    pub message: String,
}

impl StorageError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Тип Result для библиотеки tts-batch
pub type Result<T> = std::result::Result<T, TtsBatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_errors_render_short_details() {
        assert_eq!(InputError::NotFound(PathBuf::from("c.txt")).to_string(), "not found");
        assert_eq!(InputError::Empty(PathBuf::from("b.txt")).to_string(), "empty input");

        let too_long = InputError::TooLong {
            path: PathBuf::from("long.txt"),
            limit: 3000,
            actual: 3001,
        };
        assert_eq!(too_long.to_string(), "input exceeds 3000 characters (3001)");
        assert_eq!(too_long.path(), &PathBuf::from("long.txt"));
    }

    #[test]
    fn collaborator_errors_keep_code_and_message() {
        let err = SynthesisError::new("ThrottlingException", "Rate exceeded");
        assert_eq!(err.to_string(), "ThrottlingException: Rate exceeded");

        let err: TtsBatchError = StorageError::new("AccessDenied", "Access Denied").into();
        assert_eq!(err.to_string(), "Storage error: AccessDenied: Access Denied");
        assert!(!err.is_configuration());
        assert!(TtsBatchError::configuration("bucket is not set").is_configuration());
    }
}
