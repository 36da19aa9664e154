use tracing_subscriber::EnvFilter;

/// Environment variable consulted when no explicit filter is given.
pub const LOG_ENV: &str = "AUDIT_LOG";

/// Install the process-wide `tracing` subscriber.
///
/// `filter` overrides `AUDIT_LOG`; both fall back to `info`. Returns `false`
/// when a subscriber was already installed, so repeated calls are harmless.
pub fn init_tracing(filter: Option<&str>) -> bool {
    let filter = match filter {
        Some(f) => EnvFilter::new(f),
        None => EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
