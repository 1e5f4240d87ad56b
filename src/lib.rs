pub mod core;

use tracing_subscriber::EnvFilter;

pub use crate::core::state::AppState;

/// Initialize structured logging for the backend. Call once at startup.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,ember_lib=debug")),
        )
        .init();

    tracing::info!("EmberLauncher backend starting...");
}
