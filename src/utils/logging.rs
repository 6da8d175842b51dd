//! Logger setup, plus logging macros that a module switches on or off with
//! its own `const ENABLE_LOGS: bool`.
//!
//! ```ignore
//! const ENABLE_LOGS: bool = true;
//!
//! use crate::{log_info, log_warn};
//!
//! log_info!("recorded {} entries", count);
//! ```

use log::LevelFilter;

/// Installs `env_logger` at `Info`; `RUST_LOG` overrides the level.
/// Later calls are ignored.
pub fn init_logging() {
    init_logging_at(LevelFilter::Info);
}

pub fn init_logging_at(default_level: LevelFilter) {
    let _ = env_logger::Builder::new()
        .filter_level(default_level)
        .format_timestamp_millis()
        .parse_default_env()
        .try_init();
}

#[doc(hidden)]
#[macro_export]
macro_rules! gated_log {
    ($level:ident, $($arg:tt)*) => {
        if ENABLE_LOGS {
            ::log::$level!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => { $crate::gated_log!(debug, $($arg)*) };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => { $crate::gated_log!(info, $($arg)*) };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => { $crate::gated_log!(warn, $($arg)*) };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => { $crate::gated_log!(error, $($arg)*) };
}
