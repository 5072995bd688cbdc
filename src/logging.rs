use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "LEADTRACK_LOG";

/// Installs the stderr subscriber. `LEADTRACK_LOG` wins over the configured
/// level; an unparsable directive falls back to the configured one.
pub fn init(configured_level: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(configured_level))
        .unwrap_or_else(|_| EnvFilter::new(crate::config::DEFAULT_LOG_LEVEL));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
