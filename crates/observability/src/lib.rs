//! Process-wide logging setup.

/// Initialize tracing for the process.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Tracing subscriber configuration (filter, output format).
pub mod tracing;
