//! Logging setup using `tracing` + `tracing-subscriber`.
//!
//! The queue itself only emits `tracing` events; installing a subscriber is
//! the embedding application's job. This helper covers the common case.
//!
//! Priority for determining the log level:
//! 1. explicit `level` argument (if provided)
//! 2. `CONVEYOR_LOG` environment variable (an `EnvFilter` directive)
//! 3. default to `info`

use tracing_subscriber::{fmt, EnvFilter};

/// Initialise a global fmt subscriber.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(lvl) => EnvFilter::new(lvl),
        None => EnvFilter::try_from_env("CONVEYOR_LOG")
            .unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
