//! Logging setup shared by the coordinator and client binaries

use tracing_subscriber::EnvFilter;

/// Initialize logging with an environment filter
///
/// Logs go to stderr so stdout stays free for rendered messages.
///
/// `RUST_LOG` overrides the default, e.g. `RUST_LOG=debug` or
/// `RUST_LOG=chat_relay=trace`.
pub fn init(default_directive: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive)),
        )
        .with_writer(std::io::stderr)
        .init();
}
