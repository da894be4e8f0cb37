use std::sync::Once;

use tracing_subscriber::fmt as tracing_fmt;
use tracing_subscriber::{EnvFilter, prelude::*};

static INIT: Once = Once::new();

/// Build the filter: `RUST_LOG` wins, then the configured level, then `info`.
pub fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber once per process. Later calls are no-ops,
/// so every test may call it.
pub fn init_logging(default_level: &str) {
    INIT.call_once(|| {
        let _ = tracing_subscriber::registry()
            .with(env_filter(default_level))
            .with(tracing_fmt::layer().with_test_writer())
            .try_init();
    });
}
