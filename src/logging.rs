//! Structured logging setup, grounded on the teacher's `setup_logging`
//! (`tracing_subscriber::registry` + `EnvFilter` + `fmt::layer`), extended
//! with an optional non-blocking file appender for `--log-file`.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

/// Guard returned by [`init`]; dropping it flushes the non-blocking file
/// appender. Must be held for the lifetime of the process.
pub struct LoggingGuard {
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

pub fn init(config: &LoggingConfig) -> LoggingGuard {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.level.to_lowercase()));

    let registry = tracing_subscriber::registry().with(filter);

    let stderr_layer = if config.stderr {
        Some(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
    } else {
        None
    };

    let (file_layer, file_guard) = match &config.file {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(open_appender(path));
            (Some(tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    registry.with(stderr_layer).with(file_layer).init();

    if config.syslog {
        tracing::warn!("--log-syslog was requested but syslog output is not supported; logging to configured sinks only");
    }

    LoggingGuard { _file_guard: file_guard }
}

fn open_appender(path: &str) -> tracing_appender::rolling::RollingFileAppender {
    let path = std::path::Path::new(path);
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| std::path::Path::new("."));
    let file_name = path.file_name().unwrap_or_else(|| std::ffi::OsStr::new("navdoon.log"));
    tracing_appender::rolling::never(dir, file_name)
}
