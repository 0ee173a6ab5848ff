//! Merges a validated descriptor with settings into a `ResolvedJob`.

use chrono::{DateTime, Local};

use crate::config::Settings;

use super::lifecycle::QueueLayout;
use super::selector::SelectedJob;
use super::types::{PipelineOptions, ResolvedJob};
use super::validation::{
    is_path_component, ValidationError, ValidationResult, TEMPLATE_DATE_FORMAT,
};

/// Extension of the generated pipeline input file.
pub const INPUT_EXTENSION: &str = "fasta";

/// Resolves defaults and paths. Touches no files.
pub struct JobBuilder<'a> {
    settings: &'a Settings,
    layout: &'a QueueLayout,
}

impl<'a> JobBuilder<'a> {
    pub fn new(settings: &'a Settings, layout: &'a QueueLayout) -> Self {
        Self { settings, layout }
    }

    /// Resolve a job, stamped with the current local time.
    pub fn build(&self, job: &SelectedJob) -> ValidationResult<ResolvedJob> {
        self.build_at(job, Local::now())
    }

    /// Resolve a job as of `now`.
    ///
    /// Precedence: descriptor value, then settings value, then built-in
    /// default. The descriptor must have passed validation.
    pub fn build_at(&self, job: &SelectedJob, now: DateTime<Local>) -> ValidationResult<ResolvedJob> {
        let descriptor = &job.descriptor;

        let (version_id, version) = match &descriptor.version {
            Some(id) => self
                .settings
                .version(id)
                .map(|v| (id.as_str(), v))
                .ok_or_else(|| ValidationError::UnknownVersion { version: id.clone() })?,
            None => self
                .settings
                .default_version()
                .ok_or_else(|| ValidationError::UnknownVersion {
                    version: "<default>".to_string(),
                })?,
        };

        let name = descriptor.name.clone().unwrap_or_else(|| job.file_stem());
        // A stem like `..` would put the job directory outside the output directory.
        if !is_path_component(&name) {
            return Err(ValidationError::InvalidName { name });
        }

        let output_dir = descriptor
            .output_dir
            .clone()
            .or_else(|| self.settings.output_dir.clone())
            .unwrap_or_else(|| self.layout.default_output_dir());
        let output_dir = if output_dir.is_relative() {
            self.layout.run_dir().join(output_dir)
        } else {
            output_dir
        };
        let job_dir = output_dir.join(&name);
        let input_file = job_dir.join(format!("{}.{}", name, INPUT_EXTENSION));

        let max_template_date = descriptor
            .max_template_date
            .clone()
            .unwrap_or_else(|| now.format(TEMPLATE_DATE_FORMAT).to_string());

        let options = PipelineOptions {
            model_preset: descriptor.model_preset.clone(),
            num_multimer_predictions_per_model: descriptor.num_multimer_predictions_per_model,
            models_to_relax: descriptor.models_to_relax.clone(),
            docker_image: descriptor
                .docker_image
                .clone()
                .or_else(|| version.docker_image.clone()),
        };

        let sequences = descriptor
            .sequences
            .as_ref()
            .map(|s| s.records().to_vec())
            .unwrap_or_default();

        Ok(ResolvedJob {
            name,
            version: version_id.to_string(),
            descriptor: job.path.clone(),
            sequences,
            output_dir,
            job_dir,
            input_file,
            interpreter: version.interpreter(),
            pipeline_script: version.entry_script(),
            data_dir: version.data_dir.clone(),
            docker_user: self.settings.docker_user().to_string(),
            max_template_date,
            options,
            postprocess_flags: descriptor.enabled_postprocess_flags(),
            started_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::descriptor::JobDescriptor;
    use chrono::TimeZone;
    use std::path::PathBuf;
    use std::time::SystemTime;

    const SETTINGS: &str = r#"
[versions.v2]
data_dir = "/db/v2"
path = "/opt/af2"
env = "/envs/af2"
default = true

[versions.v3]
data_dir = "/db/v3"
path = "/opt/af3"
env = "/envs/af3"
docker_image = "af3-image"
"#;

    fn selected(file: &str, content: &str) -> SelectedJob {
        SelectedJob {
            path: PathBuf::from("/run/input").join(file),
            modified: SystemTime::now(),
            descriptor: JobDescriptor::parse(content).unwrap(),
        }
    }

    fn build(settings: &str, job: &SelectedJob) -> ResolvedJob {
        let settings: Settings = toml::from_str(settings).unwrap();
        let layout = QueueLayout::new("/run");
        let now = Local.with_ymd_and_hms(2024, 3, 9, 14, 30, 0).unwrap();
        JobBuilder::new(&settings, &layout).build_at(job, now).unwrap()
    }

    #[test]
    fn defaults_come_from_file_and_settings() {
        let job = build(SETTINGS, &selected("my_protein.toml", "[sequences]\nA = \"MKT\"\n"));

        assert_eq!(job.name, "my_protein");
        assert_eq!(job.version, "v2");
        assert_eq!(job.output_dir, PathBuf::from("/run/results"));
        assert_eq!(job.job_dir, PathBuf::from("/run/results/my_protein"));
        assert_eq!(
            job.input_file,
            PathBuf::from("/run/results/my_protein/my_protein.fasta")
        );
        assert_eq!(job.data_dir, PathBuf::from("/db/v2"));
        assert_eq!(job.interpreter, PathBuf::from("/envs/af2/bin/python3"));
        assert_eq!(job.pipeline_script, PathBuf::from("/opt/af2/docker/run_docker.py"));
        assert_eq!(job.docker_user, "root");
        assert_eq!(job.max_template_date, "2024-03-09");
        assert_eq!(job.options, PipelineOptions::default());
        assert!(job.postprocess_flags.is_empty());
    }

    #[test]
    fn global_output_dir_beats_run_directory() {
        let settings = format!("docker_user = \"1000\"\noutput_dir = \"/global\"\n{}", SETTINGS);
        let job = build(&settings, &selected("j.toml", "[sequences]\nA = \"MKT\"\n"));

        assert_eq!(job.output_dir, PathBuf::from("/global"));
        assert_eq!(job.docker_user, "1000");
    }

    #[test]
    fn descriptor_values_win() {
        let job = build(
            SETTINGS,
            &selected(
                "j.toml",
                r#"
name = "custom"
version = "v3"
output_dir = "/mine"
max_template_date = "2020-05-14"
model_preset = "multimer"
models_to_relax = "all"

[sequences]
A = "MKT"

[postprocess]
plots = true
"#,
            ),
        );

        assert_eq!(job.name, "custom");
        assert_eq!(job.version, "v3");
        assert_eq!(job.job_dir, PathBuf::from("/mine/custom"));
        assert_eq!(job.data_dir, PathBuf::from("/db/v3"));
        assert_eq!(job.max_template_date, "2020-05-14");
        assert_eq!(job.options.model_preset.as_deref(), Some("multimer"));
        assert_eq!(job.options.models_to_relax.as_deref(), Some("all"));
        assert_eq!(job.options.num_multimer_predictions_per_model, None);
        assert_eq!(job.options.docker_image.as_deref(), Some("af3-image"));
        assert_eq!(job.postprocess_flags, vec!["plots"]);
    }

    #[test]
    fn relative_output_dir_is_under_run_directory() {
        let job = build(
            SETTINGS,
            &selected("j.toml", "output_dir = \"out\"\n[sequences]\nA = \"MKT\"\n"),
        );
        assert_eq!(job.job_dir, PathBuf::from("/run/out/j"));
    }

    #[test]
    fn unusable_file_stem_is_an_invalid_name() {
        let settings: Settings = toml::from_str(SETTINGS).unwrap();
        let layout = QueueLayout::new("/run");
        let job = selected("...toml", "[sequences]\nA = \"MKT\"\n");
        assert_eq!(job.file_stem(), "..");

        let err = JobBuilder::new(&settings, &layout).build(&job).unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidName {
                name: "..".to_string()
            }
        );
    }

    #[test]
    fn unknown_version_is_an_error() {
        let settings: Settings = toml::from_str(SETTINGS).unwrap();
        let layout = QueueLayout::new("/run");
        let job = selected("j.toml", "version = \"nope\"\n[sequences]\nA = \"MKT\"\n");

        let err = JobBuilder::new(&settings, &layout).build(&job).unwrap_err();
        assert!(matches!(err, ValidationError::UnknownVersion { .. }));
    }
}
