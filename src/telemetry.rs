//! Logging setup for dashgate
//!
//! Installs a `tracing` subscriber driven by the configured log level.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const KNOWN_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Resolve a configured level string, falling back to `debug`
///
/// Returns the level to use and whether the input was recognised.
pub fn resolve_level(level: &str) -> (&'static str, bool) {
    let lowered = level.trim().to_ascii_lowercase();
    match KNOWN_LEVELS.iter().find(|known| **known == lowered) {
        Some(known) => (known, true),
        None => ("debug", false),
    }
}

/// Initialize logging for the application
///
/// `RUST_LOG`, when set, takes precedence over `level`.
pub fn init_logging(level: &str, json: bool) {
    let (resolved, known) = resolve_level(level);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("dashgate={resolved},tower_http={resolved}").into());

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stdout))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stdout))
            .try_init()
    };

    if let Err(e) = result {
        eprintln!("logging already initialized: {}", e);
        return;
    }

    if !known {
        tracing::warn!("Unknown log level '{}', defaulting to debug", level);
    }
}
