//! Logging setup.
//!
//! The TUI owns the terminal, so nothing may be written to stdout or stderr
//! while it runs. On Linux logs go to the systemd journal when it is
//! reachable; otherwise they go to a daily rolling file.

use anyhow::Result;
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding the log filter (`debug`, `animaldex::api=trace`, ...).
pub const LOG_ENV: &str = "ANIMALDEX_LOG";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize logging for the interactive client.
///
/// Log level can be controlled via the `ANIMALDEX_LOG` environment variable:
/// - `ANIMALDEX_LOG=debug` logs every request
/// - `ANIMALDEX_LOG=info` for standard output (default)
/// - `ANIMALDEX_LOG=warn` for failed requests and recoveries only
pub fn init(log_dir: Option<PathBuf>) -> Result<()> {
    let env_filter = env_filter();

    #[cfg(target_os = "linux")]
    {
        if let Ok(journald_layer) = tracing_journald::layer() {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(journald_layer)
                .init();

            tracing::info!("Logging initialized with journald backend");
            return Ok(());
        }
    }

    let log_dir = log_dir.unwrap_or_else(|| {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("animaldex")
            .join("logs")
    });

    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "animaldex.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // The guard flushes on drop; keep it for the life of the process.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    tracing::info!(dir = %log_dir.display(), "Logging initialized with file backend");
    Ok(())
}

/// Initialize logging for one-shot commands: human-readable lines on stderr.
pub fn init_stderr() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}
