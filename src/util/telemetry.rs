//! Telemetry helpers for structured logging and tracing.

/// Initialize tracing/telemetry. Users can install their own subscriber; this
/// helper installs a default env-based subscriber if none is set.
///
/// Lock internals log parks and wake-ups at `trace`, and construction, sweeps
/// and write suspension at `debug`; `RUST_LOG=prometheus_read_mostly=debug`
/// is a reasonable starting filter.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
