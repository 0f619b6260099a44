//! Process-wide tracing setup shared by the `restgate` binaries.

/// Initialize JSON tracing with the default `info` filter.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(tracing::TracingConfig::default());
}

/// Tracing configuration (filters, output format).
pub mod tracing;
