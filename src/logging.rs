use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global subscriber: JSON lines in `{log_dir}/bot.log` (daily rotation)
/// plus human-readable output on stdout.
///
/// Keep the returned guard alive for the lifetime of the process, dropping it
/// stops the background writer.
pub fn init_logging(log_dir: &str) -> WorkerGuard {
    let file_appender = rolling::daily(log_dir, "bot.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false) // No ANSI colors in file
        .json();

    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    // Default to `info` if RUST_LOG is not set; sqlx logs every statement at info.
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,reqwest=warn,hyper=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();

    guard
}
