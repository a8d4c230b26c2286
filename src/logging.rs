//! stderr logging via `tracing-subscriber`.

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;

/// `RUST_LOG` wins over the configured `LOG_LEVEL`.
pub fn filter_from(cfg: &Config) -> EnvFilter {
    let level = cfg.get("LOG_LEVEL").unwrap_or_else(|| "info".into());
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Safe to call more than once; later calls are no-ops.
pub fn init(cfg: &Config) {
    let _ = fmt()
        .with_env_filter(filter_from(cfg))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
