//! Формирование ключей объектов в хранилище
//!
//! Ключ строится из имени исходного файла, голоса, метки времени и метки
//! запуска: `{prefix}{stem}-{voice}-{timestamp}-{run}.mp3`. Метки времени
//! внутри одного запуска строго возрастают, поэтому два успешных задания не
//! получат одинаковый ключ даже при совпадающих именах файлов и голосах.
//! Метка запуска разводит ключи разных запусков, даже если метка времени
//! предыдущего запуска успела обогнать часы.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

/// Формат метки времени в ключе
const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.6fZ";

/// Длина метки запуска в ключе
const RUN_TAG_LEN: usize = 8;

/// Генератор ключей одного запуска
pub struct KeyGenerator {
    prefix: String,
    run_tag: String,
    last: Mutex<Option<DateTime<Utc>>>,
}

impl KeyGenerator {
    pub fn new(prefix: impl Into<String>, run_tag: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            run_tag: sanitize(&run_tag.into()),
            last: Mutex::new(None),
        }
    }

    /// Генератор с меткой из первых символов идентификатора запуска
    pub fn for_run(prefix: impl Into<String>, run_id: Uuid) -> Self {
        let tag: String = run_id.simple().to_string().chars().take(RUN_TAG_LEN).collect();
        Self::new(prefix, tag)
    }

    /// Следующий ключ для файла и голоса
    ///
    /// Возвращает ключ и метку времени, вошедшую в него.
    pub fn next_key(&self, source_path: &Path, voice_id: &str) -> (String, DateTime<Utc>) {
        let produced_at = self.next_timestamp(Utc::now());
        (self.derive(source_path, voice_id, produced_at), produced_at)
    }

    /// Ключ для заданной метки времени
    pub fn derive(&self, source_path: &Path, voice_id: &str, at: DateTime<Utc>) -> String {
        let stem = source_path
            .file_stem()
            .map(|s| sanitize(&s.to_string_lossy()))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "input".to_string());

        format!(
            "{}{}-{}-{}-{}.mp3",
            self.prefix,
            stem,
            sanitize(voice_id),
            at.format(TIMESTAMP_FORMAT),
            self.run_tag
        )
    }

    fn next_timestamp(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        // Ключ содержит микросекунды, поэтому шаг тоже в микросекундах
        let now = truncate_to_micros(now);
        let mut last = self.last.lock();
        let next = match *last {
            Some(prev) if now <= prev => prev + Duration::microseconds(1),
            _ => now,
        };
        *last = Some(next);
        next
    }
}

fn truncate_to_micros(at: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(at.timestamp_micros()).unwrap_or(at)
}

/// Заменить символы, небезопасные для ключа, на `_`
fn sanitize(value: &str) -> String {
    value
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
