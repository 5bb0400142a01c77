//! Logging setup for Questboard binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Installs a `tracing` subscriber that prints to stderr.
///
/// `RUST_LOG` wins when it is set. Otherwise every `questboard*` crate and
/// the calling binary log at `default_level`.
///
/// ```no_run
/// questboard::logger::setup_logger("questboard-server", "info");
/// ```
pub fn setup_logger(binary_name: &str, default_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    format!(
                        "{}={default_level},{}={default_level}",
                        env!("CARGO_PKG_NAME"),
                        binary_name.replace('-', "_"),
                    )
                    .into()
                }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
