//! Tracing setup: stdout plus a daily-rotated `server.log.*` in the log dir.

use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::core::config::AppPaths;

const DEFAULT_FILTER: &str = "info";
const LOG_FILE_PREFIX: &str = "server.log";
const MAX_LOG_FILES: usize = 14;

static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Installs the global subscriber. `RUST_LOG` overrides the `info` default.
/// Calling it again leaves the first subscriber in place.
pub fn init(paths: &AppPaths) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let appender = std::fs::create_dir_all(&paths.log_dir)
        .map_err(|e| e.to_string())
        .and_then(|_| {
            RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(LOG_FILE_PREFIX)
                .max_log_files(MAX_LOG_FILES)
                .build(&paths.log_dir)
                .map_err(|e| e.to_string())
        });

    let (file_layer, file_error) = match appender {
        Ok(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), None)
        }
        Err(err) => (None, Some(err)),
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .try_init()
        .is_ok();

    if let (true, Some(err)) = (installed, file_error) {
        tracing::warn!(
            "File logging disabled, cannot write to {}: {}",
            paths.log_dir.display(),
            err
        );
    }
}
