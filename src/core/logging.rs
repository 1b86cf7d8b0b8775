//! Logging setup
//!
//! Console output goes to stderr so it never interleaves with REPL replies.
//! The optional log file is truncated on every start, one file per run.

use std::fs::File;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::core::config::LoggingConfig;

/// Keeps the background log writer alive. Drop it only at shutdown.
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

fn make_env_filter(config: &LoggingConfig, debug: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if debug {
            EnvFilter::new("carelink=debug,reqwest=info,hyper=info")
        } else {
            EnvFilter::new(&config.filter)
        }
    })
}

fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    File::create(path)
}

/// Install the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init(config: &LoggingConfig, debug: bool) -> LogGuard {
    let mut file_error = None;
    let (file_layer, file_guard) = match config.file.as_deref().map(open_log_file) {
        Some(Ok(file)) => {
            let (writer, guard) = tracing_appender::non_blocking(file);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        Some(Err(e)) => {
            file_error = Some(e);
            (None, None)
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(make_env_filter(config, debug))
        .with(
            fmt::layer()
                .with_target(false)
                .compact()
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .try_init()
        .ok();

    if let Some(e) = file_error {
        tracing::warn!(error = %e, "could not open log file, logging to console only");
    }
    tracing::info!("system initialized, logging started");

    LogGuard {
        _file_guard: file_guard,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_log_file_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("system_logs.log");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "old run").unwrap();

        open_log_file(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_init_without_file() {
        let config = LoggingConfig {
            file: None,
            filter: "carelink=warn".to_string(),
        };
        let _guard = init(&config, false);
        // second call must not panic
        let _guard = init(&config, true);
    }
}
