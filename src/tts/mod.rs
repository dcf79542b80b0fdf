//! Модуль для работы с TTS
//!
//! Содержит трейт сервиса синтеза речи и его реализацию поверх Amazon Polly.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::SynthesisError;

pub mod polly;

pub use polly::PollySynthesizer;

/// Сервис синтеза речи
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Преобразовать текст в аудиопоток MP3 указанным голосом
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Bytes, SynthesisError>;
}
