//! Tracing subscriber setup for embedding applications and tests.

use tracing_subscriber::EnvFilter;

/// Install a formatting subscriber filtered by `RUST_LOG`.
///
/// Falls back to `default_filter` (e.g. `"warn"`) when `RUST_LOG` is unset or
/// invalid. Calling this more than once is harmless; only the first
/// subscriber is installed.
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
