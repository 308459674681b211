// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hfed contributors

//! Runtime-filtered logging for federation diagnostics.
//!
//! Four severity levels, mirrored by crate-level macros:
//! - `debug!()` - per-callback and per-frame detail
//! - `info!()` - lifecycle events (join, mode changes, sync points)
//! - `warn!()` - recovered errors (duplicate registration, dropped MTR)
//! - `error!()` - fatal conditions, logged once before the error returns
//!
//! The macros hand a `format_args!` capture to the process-wide sink, so a
//! message below the level filter is never formatted. Blocking waits print
//! a progress summary through `info!` on the configured status period, so
//! initialize the logger before constructing any federate if those are
//! wanted.
//!
//! # Example
//!
//! ```ignore
//! use hfed::logging::{init_logger, ConsoleOutput, LogLevel};
//! use std::sync::Arc;
//!
//! init_logger(Arc::new(ConsoleOutput::new(LogLevel::Debug)), LogLevel::Debug);
//! info!("federate {} joined", name);
//! ```

pub mod logger;
mod output;

pub use logger::{flush_logger, init_logger, set_level};
pub use output::{AsyncFileOutput, ConsoleOutput, FileOutput, LogLevel, Output};

/// Debug-level log message. Formatted like `println!()`.
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::logging::logger::emit(
            $crate::logging::LogLevel::Debug,
            ::core::format_args!($($arg)*),
        )
    };
}

/// Info-level log message. Formatted like `println!()`.
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::logging::logger::emit(
            $crate::logging::LogLevel::Info,
            ::core::format_args!($($arg)*),
        )
    };
}

/// Warning-level log message. Formatted like `println!()`.
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::logging::logger::emit(
            $crate::logging::LogLevel::Warning,
            ::core::format_args!($($arg)*),
        )
    };
}

/// Error-level log message. Formatted like `println!()`.
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::logging::logger::emit(
            $crate::logging::LogLevel::Error,
            ::core::format_args!($($arg)*),
        )
    };
}
