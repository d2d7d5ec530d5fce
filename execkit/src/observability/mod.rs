//! Tracing subscriber setup.
//!
//! The library itself only emits `tracing` events (retry decisions,
//! captured handler panics, stage failures); installing a subscriber is
//! the application's choice. These helpers wire up the conventional
//! fmt + env-filter subscriber.

use tracing_subscriber::EnvFilter;

/// Installs a fmt subscriber filtered by `RUST_LOG`, defaulting to
/// `info`. Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    init_tracing_with_filter("info");
}

/// Installs a fmt subscriber with the given default filter directive.
///
/// `RUST_LOG` still takes precedence when set.
pub fn init_tracing_with_filter(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_tracing();
        init_tracing_with_filter("debug");
        // Second install is a no-op rather than a panic.
    }
}
