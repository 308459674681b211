// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hfed contributors

//! Process-wide log sink.
//!
//! Reads are lock-free: the installed sink lives behind an
//! [`ArcSwapOption`], so a filtered-out `debug!` in the frame loop costs
//! one atomic load and no formatting. The sink may be replaced mid-run; a
//! typical host starts on the console and switches to a file once its own
//! configuration has been parsed.

use super::output::{LogLevel, Output};
use arc_swap::ArcSwapOption;
use std::fmt;
use std::io;
use std::sync::Arc;

static SINK: ArcSwapOption<Sink> = ArcSwapOption::const_empty();

struct Sink {
    output: Arc<dyn Output>,
    level_filter: LogLevel,
}

/// Install (or replace) the process-wide log output.
pub fn init_logger(output: Arc<dyn Output>, level: LogLevel) {
    SINK.store(Some(Arc::new(Sink {
        output,
        level_filter: level,
    })));
}

/// Change the level filter without touching the output. No-op when no
/// logger is installed.
pub fn set_level(level: LogLevel) {
    if let Some(sink) = SINK.load_full() {
        SINK.store(Some(Arc::new(Sink {
            output: sink.output.clone(),
            level_filter: level,
        })));
    }
}

/// Internal: route one message through the installed sink. The message is
/// only formatted once the level filter has passed. Called by the logging
/// macros; no-op when no logger is installed.
#[doc(hidden)]
#[inline]
pub fn emit(level: LogLevel, args: fmt::Arguments<'_>) {
    let sink = SINK.load();
    if let Some(sink) = sink.as_ref() {
        if level >= sink.level_filter {
            let _ = sink.output.write(level, &args.to_string());
        }
    }
}

/// Flush the installed output. Safe when no logger is installed.
pub fn flush_logger() -> io::Result<()> {
    match SINK.load_full() {
        Some(sink) => sink.output.flush(),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Capture(Mutex<Vec<String>>);

    impl Output for Capture {
        fn write(&self, level: LogLevel, message: &str) -> io::Result<()> {
            let mut lines = self.0.lock().unwrap();
            lines.push(format!("{} {}", level.as_str().trim_end(), message));
            Ok(())
        }
        fn flush(&self) -> io::Result<()> {
            Ok(())
        }
    }

    // One test owns the global sink end to end; splitting it up would race
    // with parallel test threads replacing the sink.
    #[test]
    fn test_sink_routing_filtering_and_replacement() {
        emit(LogLevel::Error, format_args!("no sink yet"));
        assert!(flush_logger().is_ok());

        let capture = Arc::new(Capture(Mutex::new(Vec::new())));
        init_logger(capture.clone(), LogLevel::Info);
        emit(LogLevel::Debug, format_args!("below filter"));
        emit(LogLevel::Info, format_args!("kept at info"));

        set_level(LogLevel::Debug);
        emit(LogLevel::Debug, format_args!("kept at debug"));
        flush_logger().unwrap();

        let lines = capture.0.lock().unwrap();
        assert!(!lines.iter().any(|l| l.contains("below filter")));
        assert!(lines.iter().any(|l| l.contains("kept at info")));
        assert!(lines.iter().any(|l| l.contains("kept at debug")));
    }
}
