//! Tracing setup: console fmt layer plus optional JSON-lines file output.

use tracing_subscriber::EnvFilter;

use crate::cli::FILE_GUARD;

/// Install the global subscriber. `RUST_LOG` overrides `level` when set.
pub fn init(level: &str, json: bool, logging: &trainer_config::Logging) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_deref().unwrap_or(level)));

    if let Some(path) = logging.file.as_deref() {
        let dir = std::path::Path::new(path)
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| std::path::Path::new("."));
        let file = std::path::Path::new(path)
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| "trainer.log".to_owned());
        let appender = match logging.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, file),
            Some("hourly") => tracing_appender::rolling::hourly(dir, file),
            _ => tracing_appender::rolling::never(dir, file),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_writer(writer)
            .init();
        return;
    }

    // Console logs go to stderr; stdout carries command output only.
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}
