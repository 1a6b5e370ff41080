#![deny(missing_docs)]
#![doc = "Experiment planning, result layout, job artifacts and dispatch for simulation campaigns."]

/// End-to-end campaign execution.
pub mod campaign;
/// Job artifact and design summary writers.
pub mod config;
/// Bounded-concurrency dispatcher.
pub mod dispatch;
/// Engine session interface and implementations.
pub mod engine;
/// Result directory layout.
pub mod layout;
/// Experiment planner.
pub mod plan;
/// Campaign report types.
pub mod report;

pub use campaign::{run_campaign, CampaignOpts};
pub use config::{
    read_job_config, write_design_csv, write_design_summary, write_job_config, JobConfig,
};
pub use dispatch::{dispatch, DispatchReport, WorkerState, WorkerSummary};
pub use engine::{DryRunEngine, Engine, EngineSession, ProcessEngine};
pub use plan::{experiment_label, plan, Experiment};
pub use report::{CampaignReport, JobReport, JobState, JobStatus};
