//! Process-wide tracing setup.

pub mod tracing;

pub use tracing::LogFormat;

/// Initialize tracing for the process in the given output format.
///
/// Safe to call multiple times; only the first call installs a subscriber.
pub fn init(format: LogFormat) {
    tracing::init(format);
}
