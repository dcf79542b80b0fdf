//! Синтез речи через Amazon Polly

use async_trait::async_trait;
use aws_sdk_polly::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_polly::types::{Engine, OutputFormat, VoiceId};
use aws_sdk_polly::Client;
use bytes::Bytes;

use crate::config::SpeechEngine;
use crate::error::SynthesisError;
use crate::tts::SpeechSynthesizer;

/// Клиент Polly, создается один раз на запуск
pub struct PollySynthesizer {
    client: Client,
    engine: Engine,
}

impl PollySynthesizer {
    pub fn new(client: Client, engine: SpeechEngine) -> Self {
        let engine = match engine {
            SpeechEngine::Standard => Engine::Standard,
            SpeechEngine::Neural => Engine::Neural,
        };
        Self { client, engine }
    }

    /// Создать клиент из общей конфигурации AWS
    pub fn from_sdk_config(sdk_config: &aws_config::SdkConfig, engine: SpeechEngine) -> Self {
        Self::new(Client::new(sdk_config), engine)
    }
}

#[async_trait]
impl SpeechSynthesizer for PollySynthesizer {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Bytes, SynthesisError> {
        log::debug!(
            "Sending SynthesizeSpeech request: voice={}, engine={}, {} characters",
            voice_id,
            self.engine.as_str(),
            text.chars().count()
        );

        let response = self
            .client
            .synthesize_speech()
            .text(text)
            .voice_id(VoiceId::from(voice_id))
            .engine(self.engine.clone())
            .output_format(OutputFormat::Mp3)
            .send()
            .await
            .map_err(|e| {
                SynthesisError::new(
                    e.code().unwrap_or("PollyRequestFailed"),
                    e.message()
                        .map(str::to_string)
                        .unwrap_or_else(|| DisplayErrorContext(&e).to_string()),
                )
            })?;

        let audio = response
            .audio_stream
            .collect()
            .await
            .map_err(|e| SynthesisError::new("AudioStreamError", e.to_string()))?;

        let bytes = audio.into_bytes();
        if bytes.is_empty() {
            return Err(SynthesisError::new(
                "EmptyAudioStream",
                "Polly returned an empty audio stream",
            ));
        }

        Ok(bytes)
    }
}
