//! Tracing setup: a stderr layer for the terminal and a plain-text file
//! layer appending to the run log.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Default filter when `RUST_LOG` is unset.
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "stackforge=debug,warn"
    } else {
        "stackforge=info,warn"
    }
}

fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)))
}

/// Install the global subscriber. With a `log_file`, events are also
/// appended there; keep the returned guard alive so buffered lines are
/// flushed on exit.
///
/// Installing twice is harmless: the second call keeps the first subscriber.
pub fn init(verbose: bool, log_file: Option<&Path>) -> Option<WorkerGuard> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    let (file_layer, guard) = match log_file.and_then(|path| Some((path.parent()?, path.file_name()?))) {
        Some((dir, name)) if std::fs::create_dir_all(dir).is_ok() => {
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        _ => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(stderr_layer)
        .with(file_layer)
        .try_init();
    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_follows_verbosity() {
        assert!(default_filter(true).contains("debug"));
        assert!(default_filter(false).contains("info"));
    }

    #[test]
    fn test_init_creates_log_directory() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("working").join("generation.log");
        let guard = init(false, Some(&log));
        assert!(guard.is_some());
        assert!(log.parent().unwrap().exists());
    }
}
