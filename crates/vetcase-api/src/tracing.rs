//! Tracing and logging configuration.
//!
//! Development gets pretty, human-readable output with file locations;
//! production gets flattened JSON for log aggregation. `RUST_LOG` overrides
//! the per-environment default filter either way.

use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Environment;

/// Initialize tracing/logging based on the environment.
pub fn init_tracing(env: &Environment) {
    let filter = env_filter(env);

    if env.is_development() {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_file(true)
                    .pretty()
                    .with_filter(filter),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .flatten_event(true)
                    .with_target(true)
                    .with_filter(filter),
            )
            .init();
    }

    tracing::info!(environment = ?env, "tracing initialized");
}

/// `RUST_LOG` if set, otherwise a per-environment default. sqlx statement
/// logging is noisy at debug, so it is capped at warn in both modes.
fn env_filter(env: &Environment) -> EnvFilter {
    let default = if env.is_development() {
        "debug,tower_http=debug,sqlx=warn"
    } else {
        "info,tower_http=info,sqlx=warn"
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}
