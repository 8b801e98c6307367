//! Process-wide tracing setup shared by the binaries.

pub mod tracing;

pub use self::tracing::{LogFormat, ObservabilityConfig, ParseLogFormatError};

/// Initialize process-wide tracing with the default configuration
/// (JSON output, `info` unless `RUST_LOG` says otherwise).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    self::tracing::init(&ObservabilityConfig::default());
}

/// Initialize process-wide tracing with `config`.
pub fn init_with(config: &ObservabilityConfig) {
    self::tracing::init(config);
}
