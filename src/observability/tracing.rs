//! Subscriber setup for the crate's `tracing` events

use std::sync::Once;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable holding the filter directives, e.g.
/// `FAULTMAP_LOG=faultmap::coverage=debug`.
pub const LOG_ENV_VAR: &str = "FAULTMAP_LOG";

const DEFAULT_FILTER: &str = "warn";

static INIT: Once = Once::new();

/// Install a formatted subscriber filtered by `FAULTMAP_LOG`.
///
/// Idempotent. Leaves an already installed global subscriber alone.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        let _ = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .with(filter)
            .try_init();
    });
}
