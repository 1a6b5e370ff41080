//! Job configuration artifacts and the per-campaign design summary.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use camp_core::errors::{CampaignError, ErrorInfo};
use camp_design::{SensitivityDesign, SensitivityRow};
use camp_spec::{RunSetting, RunSpec, ScenarioFlag};
use csv::WriterBuilder;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::plan::Experiment;

/// File name of the job artifact inside each experiment directory.
pub const JOB_CONFIG_FILE: &str = "settings.yaml";
/// File name of the design summary inside the campaign root.
pub const DESIGN_SUMMARY_FILE: &str = "sensitivity_design.csv";

/// `general` section of the job artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralSection {
    /// Replicate index.
    pub run: u32,
    /// Design row index.
    pub sensitivity: usize,
    /// Directory the engine writes its results into.
    pub output_path: PathBuf,
    /// Scenario label.
    pub label: String,
    /// Engine steps to execute.
    pub steps: u32,
    /// Run setting `plot`.
    pub plot: bool,
    /// Run setting `write`.
    pub write: bool,
    /// Run setting `debug`.
    pub debug: bool,
    /// Run setting `track`.
    pub track: bool,
}

/// Parsed form of `settings.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    /// Identity and run settings of the job.
    pub general: GeneralSection,
    /// Every scenario flag.
    pub scenario: BTreeMap<ScenarioFlag, bool>,
    /// Fully resolved sensitivity row.
    pub sensitivity: SensitivityRow,
}

impl JobConfig {
    /// Assembles the artifact content for one experiment.
    pub fn for_experiment(experiment: &Experiment, spec: &RunSpec) -> Self {
        Self {
            general: GeneralSection {
                run: experiment.replicate_index,
                sensitivity: experiment.sensitivity_index,
                output_path: experiment.output_path.clone(),
                label: experiment.label.clone(),
                steps: spec.steps,
                plot: spec.setting(RunSetting::Plot),
                write: spec.setting(RunSetting::Write),
                debug: spec.setting(RunSetting::Debug),
                track: spec.setting(RunSetting::Track),
            },
            scenario: ScenarioFlag::ALL
                .into_iter()
                .map(|flag| (flag, experiment.scenario.get(&flag).copied().unwrap_or(false)))
                .collect(),
            sensitivity: experiment.sensitivity.clone(),
        }
    }
}

fn config_error(code: &str, message: &str, path: &Path, err: impl ToString) -> CampaignError {
    CampaignError::ConfigWrite(
        ErrorInfo::new(code, message)
            .with_context("path", path.display().to_string())
            .with_hint(err.to_string()),
    )
}

/// Writes `settings.yaml` into the experiment directory.
///
/// The directory must already exist and be empty; the file is never
/// overwritten.
pub fn write_job_config(experiment: &Experiment, spec: &RunSpec) -> Result<PathBuf, CampaignError> {
    let dir = experiment.output_path.as_path();
    let mut entries = fs::read_dir(dir).map_err(|err| {
        config_error("config-target-missing", "job directory is not readable", dir, err)
    })?;
    if entries.next().is_some() {
        return Err(CampaignError::ConfigWrite(
            ErrorInfo::new("config-target-not-empty", "job directory is not empty")
                .with_context("path", dir.display().to_string()),
        ));
    }

    let config = JobConfig::for_experiment(experiment, spec);
    let yaml = serde_yaml::to_string(&config).map_err(|err| {
        CampaignError::Serde(
            ErrorInfo::new("config-encode", "failed to encode job config")
                .with_hint(err.to_string()),
        )
    })?;
    let path = dir.join(JOB_CONFIG_FILE);
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .map_err(|err| config_error("config-open", "failed to create job config", &path, err))?;
    file.write_all(yaml.as_bytes())
        .map_err(|err| config_error("config-write", "failed to write job config", &path, err))?;
    debug!(path = %path.display(), "job config written");
    Ok(path)
}

/// Reads a job artifact back.
pub fn read_job_config(path: &Path) -> Result<JobConfig, CampaignError> {
    let text = fs::read_to_string(path).map_err(|err| {
        CampaignError::Serde(
            ErrorInfo::new("config-read", "failed to read job config")
                .with_context("path", path.display().to_string())
                .with_hint(err.to_string()),
        )
    })?;
    serde_yaml::from_str(&text).map_err(|err| {
        CampaignError::Serde(
            ErrorInfo::new("config-decode", "job config is not valid")
                .with_context("path", path.display().to_string())
                .with_hint(err.to_string()),
        )
    })
}

fn wrap_csv(code: &str, err: csv::Error) -> CampaignError {
    CampaignError::ConfigWrite(
        ErrorInfo::new(code, "design summary failure").with_hint(err.to_string()),
    )
}

/// Writes `sensitivity_design.csv` into the campaign root.
pub fn write_design_summary(
    campaign_root: &Path,
    design: &SensitivityDesign,
) -> Result<PathBuf, CampaignError> {
    let path = campaign_root.join(DESIGN_SUMMARY_FILE);
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .map_err(|err| {
            config_error("design-summary-open", "failed to create design summary", &path, err)
        })?;
    write_design_csv(BufWriter::new(file), design)?;
    debug!(path = %path.display(), rows = design.len(), "design summary written");
    Ok(path)
}

/// Writes the design as CSV.
///
/// Header is `sensitivity,<variables...>` in sorted variable order; each line
/// holds the 1-based row index followed by every value. The sampling seed
/// lives in the campaign report, not here.
pub fn write_design_csv<W: Write>(
    out: W,
    design: &SensitivityDesign,
) -> Result<(), CampaignError> {
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(out);
    let header: Vec<&str> = std::iter::once("sensitivity")
        .chain(design.variables.iter().map(String::as_str))
        .collect();
    writer
        .write_record(&header)
        .map_err(|err| wrap_csv("design-summary-header", err))?;
    for (index, row) in design.indexed_rows() {
        let record: Vec<String> = std::iter::once(index.to_string())
            .chain(design.variables.iter().map(|name| {
                row.get(name)
                    .map(|value| value.to_string())
                    .unwrap_or_default()
            }))
            .collect();
        writer
            .write_record(&record)
            .map_err(|err| wrap_csv("design-summary-row", err))?;
    }
    writer
        .flush()
        .map_err(|err| wrap_csv("design-summary-flush", err.into()))
}
