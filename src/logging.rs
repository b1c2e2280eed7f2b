// src/logging.rs
use crate::config::LoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the global subscriber: console output plus, when a directory is
/// configured, a daily-rolling file. `RUST_LOG` takes precedence over the
/// configured level.
///
/// Keep the returned guard alive for the life of the process or buffered file
/// lines are lost.
pub fn init(config: &LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;
    let console = fmt::layer().with_target(true);

    let Some(directory) = &config.directory else {
        tracing_subscriber::registry().with(filter).with(console).try_init()?;
        return Ok(None);
    };

    let appender = tracing_appender::rolling::daily(directory, "okx_autotrader.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let file = fmt::layer().with_ansi(false).with_writer(writer);

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()?;
    tracing::info!(directory = %directory.display(), level = %config.level, "Logging initialized");

    Ok(Some(guard))
}
