use crate::utils::APP_NAME;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

const LOG_FILE: &str = "snoo_sync.log";

/// Initializes a global tracing subscriber respecting `RUST_LOG`, defaulting to
/// `snoo_sync=info`. With a log directory the output is appended to a file there instead of
/// stderr. Subsequent calls become no-ops.
pub fn init_tracing(logs_dir: Option<&Path>) {
    let env_filter = std::env::var("RUST_LOG")
        .map(EnvFilter::new)
        .unwrap_or_else(|_| EnvFilter::new(format!("{APP_NAME}=info")));
    let builder = tracing_subscriber::FmtSubscriber::builder().with_env_filter(env_filter);

    let log_file = logs_dir.and_then(|dir| {
        std::fs::create_dir_all(dir).ok()?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(LOG_FILE))
            .ok()
    });
    let _ = match log_file {
        Some(file) => tracing::subscriber::set_global_default(
            builder.with_ansi(false).with_writer(Mutex::new(file)).finish(),
        ),
        None => tracing::subscriber::set_global_default(builder.finish()),
    };
}
