use env_logger::{Builder, Env};
use std::io::Write;

/// Фильтр по умолчанию, если RUST_LOG не задан
///
/// SDK AWS остается на warn, а HTTP-стек на error. Если RUST_LOG задан,
/// он полностью заменяет этот фильтр.
pub const DEFAULT_LOG_FILTER: &str = "warn,tts_batch=info,hyper=error,rustls=error";

/// Инициализировать логирование в stderr
///
/// Повторный вызов ничего не делает.
pub fn init_logger() {
    let env = Env::default().filter_or("RUST_LOG", DEFAULT_LOG_FILTER);

    let mut builder = Builder::from_env(env);
    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}: {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(env_logger::Target::Stderr);

    if builder.try_init().is_err() {
        log::debug!("Logger is already initialized");
    }
}
