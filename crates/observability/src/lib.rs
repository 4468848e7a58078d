//! Tracing/logging setup shared by the binaries.

/// Install the process-wide tracing subscriber. Idempotent.
pub fn init() {
    tracing::init();
}

/// Tracing configuration (filters, layers).
pub mod tracing;
