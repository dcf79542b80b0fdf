//! Загрузка аудио в Amazon S3

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;

use crate::error::StorageError;
use crate::storage::{ObjectStore, PutOutcome, WriteMode};

pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Создать клиент из общей конфигурации AWS
    ///
    /// При заданном `endpoint_url` используется path-style адресация,
    /// которую ожидают S3-совместимые сервисы.
    pub fn from_sdk_config(
        sdk_config: &aws_config::SdkConfig,
        bucket: impl Into<String>,
        endpoint_url: Option<&str>,
    ) -> Self {
        let mut builder = aws_sdk_s3::config::Builder::from(sdk_config);
        if let Some(url) = endpoint_url {
            builder = builder.endpoint_url(url).force_path_style(true);
        }
        Self::new(Client::from_conf(builder.build()), bucket)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

/// Разобрать отказ PutObject по HTTP-статусу и коду ошибки S3
///
/// 412 означает, что условная запись не прошла из-за занятого ключа.
/// 409 `ConditionalRequestConflict` возникает при одновременной условной
/// записи в тот же ключ и обрабатывается так же.
fn classify_put_failure(
    status: Option<u16>,
    code: Option<&str>,
    message: String,
) -> Result<PutOutcome, StorageError> {
    match (status, code) {
        (Some(412), _) | (_, Some("PreconditionFailed")) => Ok(PutOutcome::KeyTaken),
        (_, Some("ConditionalRequestConflict")) => Ok(PutOutcome::KeyTaken),
        (Some(403), None) => Err(StorageError::new("AccessDenied", message)),
        (_, Some(code)) => Err(StorageError::new(code, message)),
        (_, None) => Err(StorageError::new("S3PutFailed", message)),
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
        metadata: &HashMap<String, String>,
        mode: WriteMode,
    ) -> Result<PutOutcome, StorageError> {
        log::debug!(
            "Uploading {} bytes to s3://{}/{} ({:?})",
            body.len(),
            self.bucket,
            key,
            mode
        );

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .set_metadata(Some(metadata.clone()));
        if mode == WriteMode::IfAbsent {
            request = request.if_none_match("*");
        }

        match request.send().await {
            Ok(_) => Ok(PutOutcome::Stored),
            Err(e) => {
                let status = e.raw_response().map(|r| r.status().as_u16());
                let message = e
                    .message()
                    .map(str::to_string)
                    .unwrap_or_else(|| DisplayErrorContext(&e).to_string());
                classify_put_failure(status, e.code(), message)
            }
        }
    }
}
