//! Logging configuration
//!
//! Initializes tracing for the application.

/// Initializes logging with the specified default filter, honouring
/// `RUST_LOG` when set. Safe to call more than once; later calls are no-ops.
pub fn init_logging(level: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
