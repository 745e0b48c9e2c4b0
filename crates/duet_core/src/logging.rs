use anyhow::Result;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default filter when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info,duet_relay=debug,duet_app=debug";

/// Initializes console logging, plus a daily-rotated file under `log_dir`
/// when one is given. `RUST_LOG` overrides `filter`.
///
/// Returns the file appender's guard, which must be kept alive for the
/// duration of the process.
pub fn init_logging(log_dir: Option<&Path>, filter: &str) -> Result<Option<WorkerGuard>> {
    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let file_appender = tracing_appender::rolling::daily(dir, "duet-relay");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_ansi(false)
                .with_writer(non_blocking);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .compact(),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))?;

    tracing::debug!(file_logging = log_dir.is_some(), "Logging initialized");

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_creates_log_directory() {
        let tmp = tempfile::tempdir().expect("Failed to create tempdir");
        let logs_dir = tmp.path().join("nested").join("logs");
        assert!(!logs_dir.exists());

        // Only one test per process can install the global subscriber, so
        // the result may be an error; the directory is created either way.
        let result = init_logging(Some(&logs_dir), "warn");
        assert!(logs_dir.exists());

        match result {
            Ok(guard) => assert!(guard.is_some()),
            Err(e) => {
                let msg = e.to_string();
                assert!(
                    msg.contains("logging") || msg.contains("subscriber"),
                    "unexpected error: {msg}"
                );
            }
        }
    }

    #[test]
    fn test_console_only_has_no_guard() {
        match init_logging(None, "info") {
            Ok(guard) => assert!(guard.is_none()),
            // Another test already installed the global subscriber.
            Err(e) => assert!(e.to_string().contains("logging")),
        }
    }

    #[test]
    fn test_default_filter_parses() {
        let filter = EnvFilter::new(DEFAULT_FILTER);
        drop(filter);
    }
}
