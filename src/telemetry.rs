//! Logging setup: tracing subscriber with env-filter support.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise verbosity maps 0 → info, 1 → debug,
/// 2+ → trace. Safe to call more than once (later calls are no-ops).
pub fn init(verbosity: u8) {
    let default_directive = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
