//! Shared startup code for the skypipe binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "SKYPIPE_LOG";

/// Initialize tracing from `SKYPIPE_LOG`, falling back to `default_filter`.
///
/// Logs go to stderr. Stdout is reserved for pipe data.
pub fn init_tracing(default_filter: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
pub async fn interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
