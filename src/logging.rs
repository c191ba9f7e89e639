use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber. `RUST_LOG` selects the filter, `info` by
/// default (e.g. `RUST_LOG=oil_tracekit=debug`).
///
/// Panics if a global subscriber is already set; see [`try_init`].
pub fn init() {
    fmt()
        .with_env_filter(env_filter())
        .with_target(true)
        .with_line_number(true)
        .init();
}

/// Like [`init`], but a second call is a no-op. Used by the Python module,
/// which may be imported more than once per process.
pub fn try_init() {
    let _ = fmt()
        .with_env_filter(env_filter())
        .with_target(true)
        .with_line_number(true)
        .try_init();
}

/// Debug-level output captured by the test harness.
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}
