pub mod position_audit;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const CRATE_DIRECTIVE: &str = "clmm_range_bot=debug";

/// Console layer filtered by `RUST_LOG` plus a daily-rolling plain-text file
/// in `log_dir`. Keep the returned guard alive or buffered file lines are lost.
pub fn init_tracing(log_dir: &str) -> Result<WorkerGuard> {
    let file_appender = tracing_appender::rolling::daily(log_dir, "application.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let console_filter = EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into())
        .add_directive(
            CRATE_DIRECTIVE
                .parse()
                .context("Invalid console log directive")?,
        );
    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_filter(console_filter);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(non_blocking)
        .with_target(false)
        .with_filter(EnvFilter::new(format!("info,{}", CRATE_DIRECTIVE)));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}
