//! Structured logging setup.
//!
//! Log lines carry `action` and `result` fields so the operators' existing
//! grep patterns keep working. Verbosity comes from `RUST_LOG`, then
//! `CLI_LOG_LEVEL`, then defaults to `info`. Set `CLI_LOG_JSON` for JSON
//! output.

use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "info";

/// Build the filter from the environment.
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| {
            std::env::var("CLI_LOG_LEVEL")
                .map(|level| EnvFilter::new(level.to_ascii_lowercase()))
        })
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global `tracing` subscriber.
pub fn init_logging() {
    let json_logging = std::env::var("CLI_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter())
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter())
            .with_target(true)
            .init();
    }
}
