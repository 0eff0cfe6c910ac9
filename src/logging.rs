//! Log output for the binary.

use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static INIT: Once = Once::new();

/// Installs a stderr `fmt` subscriber filtered by `DEVSCAN_LOG`.
///
/// Format: `DEVSCAN_LOG=devscan=debug`. Falls back to `default_directive`
/// when the variable is unset or invalid. Later calls do nothing.
pub fn init_logging(default_directive: &str) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env("DEVSCAN_LOG")
            .unwrap_or_else(|_| EnvFilter::new(default_directive));

        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_thread_ids(true),
            )
            .with(filter)
            .init();
    });
}
