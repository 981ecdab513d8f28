use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Install the global subscriber: stderr filtered by `RUST_LOG` (default
/// `info`), plus a DEBUG file log when `DEREK_LOG_FILE` is set.
///
/// Calling it again once a subscriber is installed is a no-op.
pub fn init_tracing() {
    // Check if file logging is enabled via environment variable
    let file_logging = std::env::var("DEREK_LOG_FILE").ok();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(env_filter);

    let registry = tracing_subscriber::registry().with(stderr_layer);

    let file = file_logging.as_ref().and_then(|log_path| {
        match OpenOptions::new().create(true).append(true).open(log_path) {
            Ok(file) => Some(file),
            Err(e) => {
                eprintln!("Failed to open log file {}: {}", log_path, e);
                None
            }
        }
    });

    if let Some(file) = file {
        let file_layer = fmt::layer()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_filter(tracing_subscriber::filter::LevelFilter::DEBUG);

        if registry.with(file_layer).try_init().is_ok() {
            if let Some(log_path) = file_logging {
                eprintln!("File logging enabled: {}", log_path);
            }
        }
    } else {
        let _ = registry.try_init();
    }
}
