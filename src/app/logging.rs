use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use crate::app::AppError;

/// Keeps the file writer alive; buffered lines are flushed on drop.
#[derive(Debug)]
pub struct LogGuard {
    path: PathBuf,
    _worker: WorkerGuard,
}

impl LogGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Console output at `RUST_LOG` (or `LOG_LEVEL`), plus a per-run log file
/// under `log_dir` that always records debug events.
pub fn init(log_dir: &Path) -> Result<LogGuard, AppError> {
    let (subscriber, guard) = build_subscriber(console_filter(), log_dir)?;
    subscriber.try_init().map_err(AppError::logging_init)?;

    tracing::debug!(path = %guard.path().display(), "run log file opened");
    Ok(guard)
}

fn console_filter() -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level(std::env::var("LOG_LEVEL").ok())))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

fn build_subscriber(
    console_filter: EnvFilter,
    log_dir: &Path,
) -> Result<(impl tracing::Subscriber + Send + Sync + 'static, LogGuard), AppError> {
    fs::create_dir_all(log_dir).map_err(|error| {
        AppError::logging_init(format!("cannot create {}: {error}", log_dir.display()))
    })?;

    let stem = format!("charge_report_{}", Local::now().format("%Y%m%d_%H%M%S"));
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(&stem)
        .filename_suffix("log")
        .build(log_dir)
        .map_err(AppError::logging_init)?;
    let (writer, worker) = tracing_appender::non_blocking(appender);

    let subscriber = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_filter(console_filter))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(writer)
                .with_filter(LevelFilter::DEBUG),
        );

    Ok((
        subscriber,
        LogGuard {
            path: log_dir.join(format!("{stem}.log")),
            _worker: worker,
        },
    ))
}

fn log_level(raw: Option<String>) -> String {
    raw.map(|level| level.trim().to_ascii_lowercase())
        .filter(|level| !level.is_empty())
        .unwrap_or_else(|| "info".to_string())
}
