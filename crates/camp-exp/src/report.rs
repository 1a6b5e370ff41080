use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use camp_core::errors::{CampaignError, ErrorInfo};
use camp_core::provenance::{RunProvenance, SchemaVersion};
use camp_core::{stable_hash_string, to_canonical_json_bytes};
use camp_design::{SamplingSeed, SensitivityDesign};
use camp_spec::{RunSpec, SensitivityMode};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::dispatch::{DispatchReport, WorkerSummary};
use crate::plan::Experiment;

/// File name of the campaign report inside the campaign root.
pub const CAMPAIGN_REPORT_FILE: &str = "campaign_report.json";

/// State of an individual job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobState {
    /// Load, reset and run all succeeded.
    Complete,
    /// Any step of the job failed or panicked.
    Failed,
    /// No worker picked the job up.
    NotDispatched,
}

/// Status of a job after dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    /// Outcome of the job.
    pub state: JobState,
    /// Worker that executed the job.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker: Option<usize>,
    /// Error message captured when the job fails.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobStatus {
    /// Constructs a successful status.
    pub fn success(worker: usize) -> Self {
        Self {
            state: JobState::Complete,
            worker: Some(worker),
            error: None,
        }
    }

    /// Constructs a failed status capturing the error string.
    pub fn failed(worker: usize, error: impl Into<String>) -> Self {
        Self {
            state: JobState::Failed,
            worker: Some(worker),
            error: Some(error.into()),
        }
    }

    /// Status of a job left in the queue.
    pub fn not_dispatched() -> Self {
        Self {
            state: JobState::NotDispatched,
            worker: None,
            error: None,
        }
    }
}

/// Report entry for a single experiment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobReport {
    /// 1-based design row index.
    pub sensitivity_index: usize,
    /// 1-based replicate index.
    pub replicate_index: u32,
    /// Job directory.
    pub output_path: PathBuf,
    /// Execution status.
    pub status: JobStatus,
}

impl JobReport {
    /// Binds a status to the experiment it belongs to.
    pub fn new(experiment: &Experiment, status: JobStatus) -> Self {
        Self {
            sensitivity_index: experiment.sensitivity_index,
            replicate_index: experiment.replicate_index,
            output_path: experiment.output_path.clone(),
            status,
        }
    }
}

/// Design facts recorded alongside the job results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignSummary {
    /// Sampling mode.
    pub mode: SensitivityMode,
    /// Varied variables in selection order.
    pub varied: Vec<String>,
    /// Number of design rows.
    pub rows: usize,
    /// Sobol base sample size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_samples: Option<usize>,
    /// Seed provenance of the sampled rows.
    pub seed: SamplingSeed,
}

impl From<&SensitivityDesign> for DesignSummary {
    fn from(design: &SensitivityDesign) -> Self {
        Self {
            mode: design.mode,
            varied: design.varied.clone(),
            rows: design.len(),
            base_samples: design.base_samples,
            seed: design.seed,
        }
    }
}

/// Job counts per state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct JobTotals {
    /// Number of planned jobs.
    pub planned: usize,
    /// Jobs that completed.
    pub complete: usize,
    /// Jobs that failed.
    pub failed: usize,
    /// Jobs never picked up.
    pub not_dispatched: usize,
}

/// Outcome of a whole campaign, persisted as `campaign_report.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignReport {
    /// Campaign directory.
    pub campaign_root: PathBuf,
    /// Sensitivity design summary.
    pub design: DesignSummary,
    /// Job counts.
    pub totals: JobTotals,
    /// One entry per planned experiment, in planning order.
    pub jobs: Vec<JobReport>,
    /// One entry per worker.
    pub workers: Vec<WorkerSummary>,
    /// Provenance metadata describing the run.
    pub provenance: RunProvenance,
}

impl CampaignReport {
    /// Assembles the report of a dispatched campaign.
    pub fn new(
        spec: &RunSpec,
        design: &SensitivityDesign,
        campaign_root: &Path,
        dispatch: DispatchReport,
    ) -> Result<Self, CampaignError> {
        let mut totals = JobTotals {
            planned: dispatch.jobs.len(),
            ..JobTotals::default()
        };
        for job in &dispatch.jobs {
            match job.status.state {
                JobState::Complete => totals.complete += 1,
                JobState::Failed => totals.failed += 1,
                JobState::NotDispatched => totals.not_dispatched += 1,
            }
        }
        Ok(Self {
            campaign_root: campaign_root.to_path_buf(),
            design: DesignSummary::from(design),
            totals,
            jobs: dispatch.jobs,
            workers: dispatch.workers,
            provenance: provenance(spec, design, campaign_root)?,
        })
    }

    /// Jobs that did not complete, including those never dispatched.
    pub fn failed_jobs(&self) -> Vec<&JobReport> {
        self.jobs
            .iter()
            .filter(|job| job.status.state != JobState::Complete)
            .collect()
    }

    /// True when every planned job completed.
    pub fn is_success(&self) -> bool {
        self.totals.complete == self.totals.planned
    }

    /// Writes the report as canonical JSON into the campaign root.
    pub fn write(&self) -> Result<PathBuf, CampaignError> {
        let path = self.campaign_root.join(CAMPAIGN_REPORT_FILE);
        let bytes = to_canonical_json_bytes(self)?;
        fs::write(&path, bytes).map_err(|err| {
            CampaignError::Serde(
                ErrorInfo::new("campaign-report-write", "failed to write campaign report")
                    .with_context("path", path.display().to_string())
                    .with_hint(err.to_string()),
            )
        })?;
        Ok(path)
    }
}

fn provenance(
    spec: &RunSpec,
    design: &SensitivityDesign,
    campaign_root: &Path,
) -> Result<RunProvenance, CampaignError> {
    let mut versions = BTreeMap::new();
    versions.insert(
        "camp-exp".to_string(),
        env!("CARGO_PKG_VERSION").to_string(),
    );
    Ok(RunProvenance {
        spec_hash: stable_hash_string(spec)?,
        campaign: campaign_root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
        sampling_seed: design.seed.value(),
        created_at: Utc::now().to_rfc3339(),
        schema: SchemaVersion::default(),
        tool_versions: versions,
    })
}
