//! Logging setup
//!
//! The engine logs through the `log` facade; binaries call [`init`] once to
//! install `env_logger` as the backend.

pub use log::{debug, error, info, trace, warn};

/// Initialize the logging system
///
/// `default_level` is used when `RUST_LOG` is unset. Calling this more than
/// once is harmless; later calls keep the first logger.
pub fn init(default_level: &str) {
    let env = env_logger::Env::default().default_filter_or(default_level);
    if env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init()
        .is_err()
    {
        log::debug!("Logger already initialized");
    }
}
