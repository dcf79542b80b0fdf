//! Объектное хранилище для готовых аудиофайлов

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StorageError;

pub mod s3;

pub use s3::S3ObjectStore;

/// Тип содержимого загружаемого аудио
pub const AUDIO_CONTENT_TYPE: &str = "audio/mpeg";

/// Режим записи объекта
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Записать, только если объекта с таким ключом еще нет
    IfAbsent,
    /// Записать поверх существующего объекта
    Overwrite,
}

/// Чем закончилась запись объекта
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// Объект записан
    Stored,
    /// Ключ уже занят, объект не записан (только для `WriteMode::IfAbsent`)
    KeyTaken,
}

/// Хранилище объектов, привязанное к одному бакету
///
/// Проверка существования выполняется вместе с записью (`WriteMode::IfAbsent`),
/// поэтому между проверкой и записью нет окна для гонки.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Записать объект вместе с метаданными
    async fn put(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
        metadata: &HashMap<String, String>,
        mode: WriteMode,
    ) -> Result<PutOutcome, StorageError>;
}
