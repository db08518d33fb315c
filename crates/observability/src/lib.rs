//! Tracing and logging setup shared by the shop-floor binaries.

/// Initialize process-wide logging (`RUST_LOG`, else `info`).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init(config: &LogConfig) {
    tracing::init(config);
}

/// Human-readable logs captured by the test harness.
pub fn init_test() {
    tracing::init_test();
}

/// Tracing configuration (filters, formats).
pub mod tracing;

pub use self::tracing::{LogConfig, LogFormat};
