// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hfed contributors

//! Logging output backends (console and file).

use crossbeam::channel::{bounded, unbounded, Sender};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;
use std::thread::JoinHandle;

/// Log level enumeration for filtering and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Debug: per-callback and per-frame detail
    Debug = 0,
    /// Info: lifecycle events
    Info = 1,
    /// Warning: recovered errors
    Warning = 2,
    /// Error: fatal conditions
    Error = 3,
}

impl LogLevel {
    /// String representation, padded for column alignment.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO ",
            Self::Warning => "WARN ",
            Self::Error => "ERROR",
        }
    }
}

/// Output destination trait for log messages.
///
/// Implementations must be thread-safe; log calls arrive concurrently from
/// the host executive thread and RTI callback threads.
pub trait Output: Send + Sync {
    /// Write a formatted log message to the output.
    fn write(&self, level: LogLevel, message: &str) -> io::Result<()>;

    /// Flush any buffered output.
    fn flush(&self) -> io::Result<()>;
}

/// Console output: writes to stderr with a level prefix.
pub struct ConsoleOutput {
    level_filter: LogLevel,
}

impl ConsoleOutput {
    /// Create a new console output with the specified minimum level.
    pub fn new(level_filter: LogLevel) -> Self {
        Self { level_filter }
    }
}

impl Output for ConsoleOutput {
    fn write(&self, level: LogLevel, message: &str) -> io::Result<()> {
        if level < self.level_filter {
            return Ok(());
        }
        eprintln!("[{}] {}", level.as_str(), message);
        Ok(())
    }

    fn flush(&self) -> io::Result<()> {
        io::stderr().flush()
    }
}

/// File output: appends to a file with a level prefix.
///
/// The file handle is mutex-protected; writers block each other briefly.
pub struct FileOutput {
    file: Mutex<std::fs::File>,
    level_filter: LogLevel,
}

impl FileOutput {
    /// Create a new file output, truncating the file at `path`.
    pub fn new<P: AsRef<Path>>(path: P, level_filter: LogLevel) -> io::Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            file: Mutex::new(file),
            level_filter,
        })
    }
}

impl Output for FileOutput {
    fn write(&self, level: LogLevel, message: &str) -> io::Result<()> {
        if level < self.level_filter {
            return Ok(());
        }
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::other("file output mutex poisoned"))?;
        writeln!(file, "[{}] {}", level.as_str(), message)
    }

    fn flush(&self) -> io::Result<()> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::other("file output mutex poisoned"))?;
        file.flush()
    }
}

enum Command {
    Line(LogLevel, String),
    Flush(Sender<()>),
}

/// File output that hands every line to a background writer thread, so log
/// calls on the RTI callback path never block on disk I/O.
pub struct AsyncFileOutput {
    tx: Option<Sender<Command>>,
    level_filter: LogLevel,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl AsyncFileOutput {
    /// Create the output, truncating the file at `path` and spawning the
    /// writer thread.
    pub fn new<P: AsRef<Path>>(path: P, level_filter: LogLevel) -> io::Result<Self> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        let (tx, rx) = unbounded::<Command>();
        let worker = std::thread::Builder::new()
            .name("hfed-log-writer".to_string())
            .spawn(move || {
                for command in rx {
                    match command {
                        Command::Line(level, message) => {
                            let _ = writeln!(file, "[{}] {}", level.as_str(), message);
                        }
                        Command::Flush(ack) => {
                            let _ = file.flush();
                            let _ = ack.send(());
                        }
                    }
                }
                let _ = file.flush();
            })?;
        Ok(Self {
            tx: Some(tx),
            level_filter,
            worker: Mutex::new(Some(worker)),
        })
    }
}

impl Output for AsyncFileOutput {
    fn write(&self, level: LogLevel, message: &str) -> io::Result<()> {
        if level < self.level_filter {
            return Ok(());
        }
        let Some(tx) = &self.tx else {
            return Err(io::Error::other("log writer stopped"));
        };
        tx.send(Command::Line(level, message.to_string()))
            .map_err(|_| io::Error::other("log writer stopped"))
    }

    fn flush(&self) -> io::Result<()> {
        let Some(tx) = &self.tx else {
            return Err(io::Error::other("log writer stopped"));
        };
        let (ack_tx, ack_rx) = bounded(1);
        tx.send(Command::Flush(ack_tx))
            .map_err(|_| io::Error::other("log writer stopped"))?;
        ack_rx
            .recv()
            .map_err(|_| io::Error::other("log writer stopped"))
    }
}

impl Drop for AsyncFileOutput {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain and exit.
        self.tx = None;
        if let Ok(mut worker) = self.worker.lock() {
            if let Some(handle) = worker.take() {
                let _ = handle.join();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Error);
    }

    #[test]
    fn test_file_output_filters_below_level() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hfed.log");
        let out = FileOutput::new(&path, LogLevel::Warning).unwrap();
        out.write(LogLevel::Info, "dropped").unwrap();
        out.write(LogLevel::Error, "kept").unwrap();
        out.flush().unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(!text.contains("dropped"));
        assert!(text.contains("kept"));
    }

    #[test]
    fn test_async_file_output_flushes_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hfed_async.log");
        {
            let out = AsyncFileOutput::new(&path, LogLevel::Debug).unwrap();
            out.write(LogLevel::Info, "first").unwrap();
            out.flush().unwrap();
            out.write(LogLevel::Info, "second").unwrap();
        }
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("first"));
        assert!(text.contains("second"));
    }
}
