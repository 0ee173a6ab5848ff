//! Global settings for a run directory.
//!
//! This module provides:
//! - TOML-based settings with logical sections (`settings.toml`)
//! - Versioned pipeline installations with exactly one default
//! - Validation that fails fast on deployment errors
//!
//! # Example
//!
//! ```no_run
//! use foldq_core::config::ConfigManager;
//!
//! let settings = ConfigManager::load_validated("/srv/foldq/settings.toml").unwrap();
//! let (id, version) = settings.default_version().unwrap();
//! println!("Default version {} lives in {}", id, version.path.display());
//! ```

mod manager;
mod settings;

pub use manager::{validate_settings, ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    LoggingSettings, PostProcessSettings, Settings, VersionSettings, WorkerSettings,
    DEFAULT_DOCKER_USER, DEFAULT_ENTRY_SCRIPT,
};
