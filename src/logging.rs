use std::env;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

pub fn init_logger() -> impl Drop {
    // Tracing level from `SYSMEND_LOG`, defaulting to `info`.
    let filter = env::var("SYSMEND_LOG").unwrap_or_else(|_| "info".to_string());
    let filter_layer = EnvFilter::new(filter);

    // Log file path from `SYSMEND_LOG_FILE`.
    let default_log_path = "./logs/sysmend.log";
    let log_file_path = env::var("SYSMEND_LOG_FILE").unwrap_or_else(|_| default_log_path.to_string());

    let file_appender = tracing_appender::rolling::never("./", log_file_path);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stdout)
                .with_file(false)
                .pretty()
                .without_time()
                .with_ansi(true),
        )
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false),
        )
        .with(filter_layer)
        .init();

    info!("Tracing is configured for stdout and file logging.");

    // Keep the appender guard alive for the lifetime of the process.
    guard
}
