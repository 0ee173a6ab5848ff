//! Per-job logger with file and console output.
//!
//! Each external invocation gets its own logger that:
//! - Appends to a dedicated log file, flushed line by line so it can be tailed
//! - Echoes every line to the console sink
//! - Maintains a tail buffer for error diagnosis

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use parking_lot::Mutex;

use super::types::{ConsoleSink, LogConfig, MessagePrefix};

/// Per-job logger with dual output (file + console).
pub struct JobLogger {
    /// Path to log file.
    log_path: PathBuf,
    /// File writer, flushed at every newline.
    file_writer: Mutex<Option<LineWriter<File>>>,
    /// Console sink for interactive output.
    console: ConsoleSink,
    /// Logging configuration.
    config: LogConfig,
    /// Tail buffer for recent tool output lines.
    tail_buffer: Mutex<VecDeque<String>>,
}

impl JobLogger {
    /// Create a new job logger appending to `log_path`.
    ///
    /// The parent directory is created if needed. An existing log is kept
    /// and appended to, so a re-run after a crash does not erase the
    /// previous attempt.
    pub fn new(
        log_path: impl Into<PathBuf>,
        config: LogConfig,
        console: ConsoleSink,
    ) -> std::io::Result<Self> {
        let log_path = log_path.into();

        if let Some(parent) = log_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        let tail_capacity = config.error_tail;
        Ok(Self {
            log_path,
            file_writer: Mutex::new(Some(LineWriter::new(file))),
            console,
            config,
            tail_buffer: Mutex::new(VecDeque::with_capacity(tail_capacity)),
        })
    }

    /// Get the log file path.
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Log an info message.
    pub fn info(&self, message: &str) {
        self.message(MessagePrefix::None, message);
    }

    /// Log a warning message.
    pub fn warn(&self, message: &str) {
        self.message(MessagePrefix::Warning, message);
    }

    /// Log an error message.
    pub fn error(&self, message: &str) {
        self.message(MessagePrefix::Error, message);
    }

    /// Log a command being executed.
    pub fn command(&self, command: &str) {
        self.message(MessagePrefix::Command, command);
    }

    /// Log a phase marker.
    pub fn phase(&self, phase_name: &str) {
        self.message(MessagePrefix::Phase, phase_name);
    }

    /// Log a success message.
    pub fn success(&self, message: &str) {
        self.message(MessagePrefix::Success, message);
    }

    /// Log one line of external tool output, verbatim.
    pub fn output_line(&self, line: &str) {
        {
            let mut buffer = self.tail_buffer.lock();
            if self.config.error_tail > 0 {
                if buffer.len() >= self.config.error_tail {
                    buffer.pop_front();
                }
                buffer.push_back(line.to_string());
            }
        }

        self.output(line);
    }

    /// Get the current tail buffer contents.
    pub fn get_tail(&self) -> Vec<String> {
        self.tail_buffer.lock().iter().cloned().collect()
    }

    /// Flush the log file.
    pub fn flush(&self) {
        if let Some(ref mut writer) = *self.file_writer.lock() {
            let _ = writer.flush();
        }
    }

    /// Close the logger and release the file.
    pub fn close(&self) {
        self.flush();
        *self.file_writer.lock() = None;
    }

    fn message(&self, prefix: MessagePrefix, message: &str) {
        let formatted = self.format_message(&prefix.format(message));
        self.output(&formatted);
    }

    /// Format a message with timestamp (if enabled).
    fn format_message(&self, message: &str) -> String {
        if self.config.show_timestamps {
            let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
            format!("[{}] {}", timestamp, message)
        } else {
            message.to_string()
        }
    }

    /// Write a line to file and console.
    fn output(&self, line: &str) {
        if let Some(ref mut writer) = *self.file_writer.lock() {
            if let Err(e) = writeln!(writer, "{}", line) {
                tracing::warn!("Failed to write to {}: {}", self.log_path.display(), e);
            }
        }

        if self.config.echo {
            (self.console)(line);
        }
    }
}

impl Drop for JobLogger {
    fn drop(&mut self) {
        self.close();
    }
}
