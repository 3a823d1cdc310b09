//! Structured logging bootstrap.
//!
//! Text-mode only: unlike the stack this was trimmed from, this server has
//! no JSON log mode and no rolling file appender, so this is a single
//! `EnvFilter` + `fmt` layer.

use tracing_subscriber::{fmt::time::UtcTime, prelude::*};

/// Initialize logging. Level comes from `RUST_LOG`, falling back to `info`.
pub fn init() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .with_ansi(true)
            .with_timer(UtcTime::rfc_3339())
            .with_writer(std::io::stdout),
    );

    let _ = registry.try_init();
}
