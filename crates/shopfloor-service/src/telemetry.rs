//! # Telemetry
//!
//! Tracing subscriber setup for the `shopfloor` binary.
//!
//! ## Log Levels
//! - `RUST_LOG=debug` - Show debug messages
//! - `RUST_LOG=shopfloor_db=trace` - Trace the store layer only
//! - Otherwise the configured `logging.filter` applies (default `info`)

use tracing_subscriber::EnvFilter;

/// Builds the filter: `RUST_LOG` if set and valid, else `fallback`, else `info`.
pub fn env_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global fmt subscriber.
///
/// Returns `false` if a subscriber was already installed, which is harmless.
pub fn init(fallback: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(fallback))
        .with_target(true)
        .try_init()
        .is_ok()
}

/// Routes logs to the test harness's captured output.
#[cfg(test)]
pub(crate) fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter("debug"))
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_fallback_degrades_to_info() {
        // Must not panic whatever RUST_LOG holds.
        let _ = env_filter("not a [valid filter");
    }

    #[test]
    fn test_second_init_is_harmless() {
        init_for_tests();
        assert!(!init("info"));
    }
}
