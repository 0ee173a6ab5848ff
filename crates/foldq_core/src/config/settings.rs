//! Settings struct with TOML-based sections.
//!
//! The root of the file carries the global scalars (`docker_user`,
//! `output_dir`); everything else lives in its own table. Pipeline
//! installations are keyed by version id under `[versions.<id>]`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::logging::LogLevel;

/// Entry script of the pipeline, relative to a version's install path.
pub const DEFAULT_ENTRY_SCRIPT: &str = "docker/run_docker.py";

/// Docker user passed to the pipeline when settings do not name one.
pub const DEFAULT_DOCKER_USER: &str = "root";

/// Interpreter location inside an environment directory.
const ENV_INTERPRETER: [&str; 2] = ["bin", "python3"];

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// User the pipeline's containers run as.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker_user: Option<String>,

    /// Global output directory for job results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,

    /// Worker loop settings.
    #[serde(default)]
    pub worker: WorkerSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Installed pipeline versions, keyed by version id.
    #[serde(default)]
    pub versions: BTreeMap<String, VersionSettings>,

    /// Optional post-processing tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postprocess: Option<PostProcessSettings>,
}

impl Settings {
    /// The version flagged `default = true`.
    ///
    /// Validation guarantees exactly one; before validation this returns
    /// the first flagged entry in key order.
    pub fn default_version(&self) -> Option<(&str, &VersionSettings)> {
        self.versions
            .iter()
            .find(|(_, v)| v.default)
            .map(|(id, v)| (id.as_str(), v))
    }

    /// Look up a version by id.
    pub fn version(&self, id: &str) -> Option<&VersionSettings> {
        self.versions.get(id)
    }

    /// Effective docker user.
    pub fn docker_user(&self) -> &str {
        self.docker_user.as_deref().unwrap_or(DEFAULT_DOCKER_USER)
    }

    /// Whether a post-processing tool is configured.
    pub fn postprocess_enabled(&self) -> bool {
        self.postprocess.is_some()
    }

    /// Make every relative path absolute against `base`.
    ///
    /// `base` is the directory holding the settings file, so relative entries
    /// behave the same no matter where the worker was started from.
    pub fn resolve_relative_paths(&mut self, base: &Path) {
        if let Some(dir) = self.output_dir.as_mut() {
            absolutize(dir, base);
        }
        for version in self.versions.values_mut() {
            absolutize(&mut version.data_dir, base);
            absolutize(&mut version.path, base);
            absolutize(&mut version.env, base);
        }
        if let Some(pp) = self.postprocess.as_mut() {
            absolutize(&mut pp.tool, base);
            if let Some(env) = pp.env.as_mut() {
                absolutize(env, base);
            }
        }
    }
}

fn absolutize(path: &mut PathBuf, base: &Path) {
    if path.is_relative() {
        *path = base.join(&*path);
    }
}

/// Worker loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSettings {
    /// Seconds between queue scans while the queue is empty.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_poll_interval() -> u64 {
    3
}

impl WorkerSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default level when `RUST_LOG` is not set.
    #[serde(default)]
    pub level: LogLevel,

    /// Mirror the worker log into `{run_dir}/logs`.
    #[serde(default = "default_true")]
    pub worker_log: bool,
}

fn default_true() -> bool {
    true
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            worker_log: true,
        }
    }
}

/// One installed pipeline version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionSettings {
    /// Reference database directory.
    pub data_dir: PathBuf,

    /// Pipeline install directory.
    pub path: PathBuf,

    /// Environment directory holding the interpreter.
    pub env: PathBuf,

    /// Whether this is the version used when a job names none.
    #[serde(default)]
    pub default: bool,

    /// Entry script relative to `path`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<PathBuf>,

    /// Container image name handed through to the pipeline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker_image: Option<String>,
}

impl VersionSettings {
    /// Interpreter the pipeline runs under.
    pub fn interpreter(&self) -> PathBuf {
        env_interpreter(&self.env)
    }

    /// Absolute path of the pipeline's entry script.
    pub fn entry_script(&self) -> PathBuf {
        match &self.script {
            Some(script) => self.path.join(script),
            None => self.path.join(DEFAULT_ENTRY_SCRIPT),
        }
    }
}

/// Post-processing tool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostProcessSettings {
    /// The tool itself (script or executable).
    pub tool: PathBuf,

    /// Environment to run the tool under; the tool is executed directly
    /// when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<PathBuf>,
}

impl PostProcessSettings {
    pub fn interpreter(&self) -> Option<PathBuf> {
        self.env.as_deref().map(env_interpreter)
    }
}

fn env_interpreter(env: &Path) -> PathBuf {
    ENV_INTERPRETER
        .iter()
        .fold(env.to_path_buf(), |path, part| path.join(part))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
docker_user = "1000:1000"

[worker]
poll_interval_secs = 5

[versions.v2]
data_dir = "/db/v2"
path = "/opt/af2"
env = "/opt/envs/af2"
default = true

[versions.v3]
data_dir = "db/v3"
path = "/opt/af3"
env = "/opt/envs/af3"
script = "run.py"
docker_image = "alphafold3"

[postprocess]
tool = "tools/analyse.py"
"#;

    #[test]
    fn parses_sections() {
        let settings: Settings = toml::from_str(SAMPLE).unwrap();
        assert_eq!(settings.docker_user(), "1000:1000");
        assert_eq!(settings.worker.poll_interval(), Duration::from_secs(5));
        assert_eq!(settings.versions.len(), 2);
        assert_eq!(settings.default_version().unwrap().0, "v2");
        assert!(settings.postprocess_enabled());
    }

    #[test]
    fn missing_fields_use_defaults() {
        let minimal = "[versions.a]\ndata_dir = \"/d\"\npath = \"/p\"\nenv = \"/e\"\n";
        let settings: Settings = toml::from_str(minimal).unwrap();
        assert_eq!(settings.docker_user(), DEFAULT_DOCKER_USER);
        assert_eq!(settings.worker.poll_interval_secs, 3);
        assert_eq!(settings.logging.level, LogLevel::Info);
        assert!(settings.logging.worker_log);
        assert!(settings.default_version().is_none());
        assert!(settings.output_dir.is_none());
    }

    #[test]
    fn version_paths_derive_from_entry() {
        let settings: Settings = toml::from_str(SAMPLE).unwrap();
        let v2 = settings.version("v2").unwrap();
        assert_eq!(v2.interpreter(), PathBuf::from("/opt/envs/af2/bin/python3"));
        assert_eq!(
            v2.entry_script(),
            PathBuf::from("/opt/af2/docker/run_docker.py")
        );
        let v3 = settings.version("v3").unwrap();
        assert_eq!(v3.entry_script(), PathBuf::from("/opt/af3/run.py"));
        assert_eq!(v3.docker_image.as_deref(), Some("alphafold3"));
    }

    #[test]
    fn relative_paths_resolve_against_base() {
        let mut settings: Settings = toml::from_str(SAMPLE).unwrap();
        settings.resolve_relative_paths(Path::new("/runs/main"));

        assert_eq!(
            settings.version("v3").unwrap().data_dir,
            PathBuf::from("/runs/main/db/v3")
        );
        assert_eq!(
            settings.version("v2").unwrap().data_dir,
            PathBuf::from("/db/v2")
        );
        assert_eq!(
            settings.postprocess.unwrap().tool,
            PathBuf::from("/runs/main/tools/analyse.py")
        );
    }

    #[test]
    fn missing_required_version_field_is_a_parse_error() {
        let broken = "[versions.a]\ndata_dir = \"/d\"\npath = \"/p\"\n";
        let err = toml::from_str::<Settings>(broken).unwrap_err();
        assert!(err.to_string().contains("env"));
    }
}
