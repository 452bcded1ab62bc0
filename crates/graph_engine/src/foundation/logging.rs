//! Logging utilities and structured logging support

pub use log::{debug, info, warn, error, trace};

/// Initialize the logging system
pub fn init() {
    env_logger::init();
}

/// Initialize logging with a fallback level
///
/// `RUST_LOG` still takes precedence when it is set; otherwise `level`
/// (e.g. `"info"`, `"debug"`) is used as the default filter. Calling this
/// more than once is harmless, later calls are ignored.
pub fn init_with_level(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init();
}
