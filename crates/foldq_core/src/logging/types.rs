//! Logging types and configuration.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Log level for filtering messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace-level debugging (very verbose).
    Trace,
    /// Debug information.
    Debug,
    /// General information.
    #[default]
    Info,
    /// Warnings.
    Warn,
    /// Errors.
    Error,
}

/// Configuration for per-job log files.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Number of output lines kept for failure diagnosis.
    pub error_tail: usize,
    /// Timestamp the logger's own messages (tool output is never stamped).
    pub show_timestamps: bool,
    /// Echo lines to the console sink.
    pub echo: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            error_tail: 20,
            show_timestamps: true,
            echo: true,
        }
    }
}

impl LogConfig {
    /// Log file only, nothing on the console.
    pub fn quiet() -> Self {
        Self {
            echo: false,
            ..Self::default()
        }
    }
}

/// Where interactive output goes.
///
/// Shared between the worker and every job logger it creates.
pub type ConsoleSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Console sink that writes each line to stdout.
pub fn stdout_console() -> ConsoleSink {
    Arc::new(|line: &str| println!("{}", line))
}

/// Message prefix types for consistent formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessagePrefix {
    /// Shell command: `$ command`
    Command,
    /// Phase marker: `=== Phase ===`
    Phase,
    /// Success: `[SUCCESS]`
    Success,
    /// Warning: `[WARNING]`
    Warning,
    /// Error: `[ERROR]`
    Error,
    /// No prefix
    None,
}

impl MessagePrefix {
    /// Format a message with this prefix.
    pub fn format(&self, message: &str) -> String {
        match self {
            MessagePrefix::Command => format!("$ {}", message),
            MessagePrefix::Phase => format!("=== {} ===", message),
            MessagePrefix::Success => format!("[SUCCESS] {}", message),
            MessagePrefix::Warning => format!("[WARNING] {}", message),
            MessagePrefix::Error => format!("[ERROR] {}", message),
            MessagePrefix::None => message.to_string(),
        }
    }
}
