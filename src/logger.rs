use crate::config::LoggingConfig;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;

/// Timestamp layout of every log line
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Install the global `tracing` subscriber.
///
/// Returns `false` when logging is disabled or a subscriber is already set,
/// so repeated calls (tests, a UI shell re-mounting) are harmless.
pub fn init(config: &LoggingConfig) -> bool {
    if !config.enabled {
        return false;
    }

    // RUST_LOG wins over the configured directive
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
        .with_target(true)
        .try_init()
        .is_ok()
}
