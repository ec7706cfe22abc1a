use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;

pub fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("chicory")
        .join("logs")
}

/// Install stderr and daily-rolling file logging. Keep the returned guard
/// alive for the life of the process so buffered file output is flushed.
pub fn init_logging(log_dir: Option<&Path>) -> Result<WorkerGuard> {
    use time::format_description::well_known::Rfc3339;
    use tracing_subscriber::fmt::time::OffsetTime;
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let log_dir = log_dir.map(Path::to_path_buf).unwrap_or_else(default_log_dir);
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "chicory.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    // Must be read before any threads are spawned.
    let offset = time::UtcOffset::current_local_offset().unwrap_or(time::UtcOffset::UTC);
    let timer = OffsetTime::new(offset, Rfc3339);

    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_timer(timer.clone()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_timer(timer)
                .with_target(true)
                .with_line_number(true),
        )
        .try_init();

    tracing::debug!("Log files will be written to: {}", log_dir.display());
    Ok(guard)
}
