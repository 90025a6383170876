use crate::config::AppConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Filter used when `RUST_LOG` is unset.
///
/// Row-lock waits in the store log at trace and sqlx logs every statement at
/// info, so both are capped unless overridden by `log_directives`.
pub fn filter_directives(config: &AppConfig) -> String {
    let mut directives = vec![
        config.log_level.clone(),
        format!("simple_ledger::transfer={}", config.log_level),
        "simple_ledger::store=info".to_string(),
        "sqlx=warn".to_string(),
    ];
    directives.extend(config.log_directives.iter().cloned());
    directives.join(",")
}

/// Install the global subscriber. Keep the guard alive for the whole process
/// or buffered file output is lost.
pub fn init_logging(config: &AppConfig) -> WorkerGuard {
    let file_appender = match config.rotation.as_str() {
        "hourly" => tracing_appender::rolling::hourly(&config.log_dir, &config.log_file),
        "daily" => tracing_appender::rolling::daily(&config.log_dir, &config.log_file),
        _ => tracing_appender::rolling::never(&config.log_dir, &config.log_file),
    };
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(config)));
    let registry = tracing_subscriber::registry().with(filter);

    if config.use_json {
        // transfer_id / account_id fields stay queryable in the file
        let file_layer = fmt::layer()
            .json()
            .with_current_span(false)
            .with_target(true)
            .with_writer(non_blocking)
            .with_ansi(false);
        registry.with(file_layer).init();
    } else {
        let file_layer = fmt::layer()
            .with_target(true)
            .with_writer(non_blocking)
            .with_ansi(false);
        // stdout carries command output
        let console_layer = fmt::layer()
            .compact()
            .with_target(false)
            .with_ansi(true)
            .with_writer(std::io::stderr);
        registry.with(file_layer).with(console_layer).init();
    }

    guard
}
