//! Config manager for loading and validating the run directory's settings.
//!
//! Every failure in here is a deployment problem rather than a job problem,
//! so callers treat any `ConfigError` as fatal.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use thiserror::Error;

use super::settings::{PostProcessSettings, Settings};

/// Argument used to check that the post-processing tool starts at all.
const VERSION_CHECK_ARG: &str = "--version";

/// Errors that can occur during config operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("No pipeline versions are configured under [versions]")]
    NoVersions,

    #[error("Exactly one version must have default = true, found {count}")]
    NoDefaultVersion { count: usize },

    #[error("Version '{version}': {field} '{}' is not an existing directory", path.display())]
    InvalidVersionPath {
        version: String,
        field: &'static str,
        path: PathBuf,
    },

    #[error("worker.poll_interval_secs must be at least 1")]
    InvalidPollInterval,

    #[error("Post-processing tool '{}' is unavailable: {reason}", tool.display())]
    PostProcessorUnavailable { tool: PathBuf, reason: String },
}

/// Result type for config operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Loads and validates the global settings file.
pub struct ConfigManager {
    /// Path to the config file.
    config_path: PathBuf,
    /// Settings loaded in memory.
    settings: Settings,
}

impl ConfigManager {
    /// Create a new config manager with the given config file path.
    ///
    /// Does not load the config - call `load()` after.
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            settings: Settings::default(),
        }
    }

    /// Get the config file path.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Get a reference to the current settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Consume the manager, keeping the loaded settings.
    pub fn into_settings(self) -> Settings {
        self.settings
    }

    /// Load config from file.
    ///
    /// Relative paths inside the file are resolved against the file's own
    /// directory. Returns error if the file doesn't exist or doesn't parse.
    pub fn load(&mut self) -> ConfigResult<()> {
        if !self.config_path.is_file() {
            return Err(ConfigError::NotFound(self.config_path.clone()));
        }

        let content = fs::read_to_string(&self.config_path)?;
        let mut settings: Settings = toml::from_str(&content)?;

        let base = self
            .config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        settings.resolve_relative_paths(&base);

        self.settings = settings;
        Ok(())
    }

    /// Validate the loaded settings.
    pub fn validate(&self) -> ConfigResult<()> {
        validate_settings(&self.settings)
    }

    /// Load and validate in one go.
    pub fn load_validated(config_path: impl Into<PathBuf>) -> ConfigResult<Settings> {
        let mut manager = Self::new(config_path);
        manager.load()?;
        manager.validate()?;
        tracing::debug!("Loaded valid settings from {}", manager.path().display());
        Ok(manager.into_settings())
    }
}

/// Check settings for deployment errors.
///
/// Requires at least one version, exactly one default, every version's
/// directories to exist and, when configured, a post-processing tool that
/// answers a version check with exit code 0.
pub fn validate_settings(settings: &Settings) -> ConfigResult<()> {
    if settings.versions.is_empty() {
        return Err(ConfigError::NoVersions);
    }

    let defaults = settings.versions.values().filter(|v| v.default).count();
    if defaults != 1 {
        return Err(ConfigError::NoDefaultVersion { count: defaults });
    }

    for (id, version) in &settings.versions {
        let fields = [
            ("data_dir", &version.data_dir),
            ("path", &version.path),
            ("env", &version.env),
        ];
        for (field, path) in fields {
            if !path.is_dir() {
                return Err(ConfigError::InvalidVersionPath {
                    version: id.clone(),
                    field,
                    path: path.clone(),
                });
            }
        }
    }

    if settings.worker.poll_interval_secs == 0 {
        return Err(ConfigError::InvalidPollInterval);
    }

    if let Some(pp) = &settings.postprocess {
        check_postprocessor(pp)?;
    }

    Ok(())
}

/// Confirm the post-processing tool exists and starts.
fn check_postprocessor(pp: &PostProcessSettings) -> ConfigResult<()> {
    let unavailable = |reason: String| ConfigError::PostProcessorUnavailable {
        tool: pp.tool.clone(),
        reason,
    };

    if !pp.tool.is_file() {
        return Err(unavailable("tool file does not exist".to_string()));
    }

    let mut cmd = match pp.interpreter() {
        Some(interpreter) => {
            if !interpreter.is_file() {
                return Err(unavailable(format!(
                    "interpreter '{}' does not exist",
                    interpreter.display()
                )));
            }
            let mut cmd = Command::new(interpreter);
            cmd.arg(&pp.tool);
            cmd
        }
        None => Command::new(&pp.tool),
    };

    let status = cmd
        .arg(VERSION_CHECK_ARG)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|e| unavailable(format!("failed to start: {}", e)))?;

    if !status.success() {
        return Err(unavailable(format!(
            "version check exited with {}",
            status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "a signal".to_string())
        )));
    }

    Ok(())
}
