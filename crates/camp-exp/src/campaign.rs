use std::path::PathBuf;

use camp_core::errors::CampaignError;
use camp_design::generate;
use camp_spec::RunSpec;
use chrono::Local;
use tracing::info;

use crate::config::write_design_summary;
use crate::dispatch::dispatch;
use crate::engine::Engine;
use crate::layout::{
    campaign_root, campaign_timestamp, create_campaign_root, create_exclusive_dir,
    sensitivity_dir,
};
use crate::plan::plan;
use crate::report::CampaignReport;

/// Options of a campaign run.
pub struct CampaignOpts<'a> {
    /// Result root under which the campaign directory is created.
    pub output_root: PathBuf,
    /// Campaign directory name; the local time is used when absent.
    pub timestamp: Option<String>,
    /// Engine serving the sessions of every worker.
    pub engine: &'a dyn Engine,
}

/// Runs a whole campaign: design, layout, planning, dispatch and report.
///
/// Configuration errors surface before the campaign directory is created.
/// Failed jobs do not make this function fail; inspect
/// [`CampaignReport::failed_jobs`].
pub fn run_campaign(
    spec: &RunSpec,
    opts: &CampaignOpts<'_>,
) -> Result<CampaignReport, CampaignError> {
    let design = generate(spec)?;
    let timestamp = opts
        .timestamp
        .clone()
        .unwrap_or_else(|| campaign_timestamp(&Local::now()));
    let root = campaign_root(&opts.output_root, &timestamp);
    let experiments = plan(spec, &design, &root)?;

    create_campaign_root(&root)?;
    info!(root = %root.display(), jobs = experiments.len(), "campaign root created");
    for (index, _) in design.indexed_rows() {
        create_exclusive_dir(&sensitivity_dir(&root, index))?;
    }
    write_design_summary(&root, &design)?;

    let dispatched = dispatch(&experiments, spec, opts.engine, spec.concurrency)?;
    let report = CampaignReport::new(spec, &design, &root, dispatched)?;
    let path = report.write()?;
    info!(
        report = %path.display(),
        complete = report.totals.complete,
        failed = report.totals.failed,
        not_dispatched = report.totals.not_dispatched,
        "campaign finished"
    );
    Ok(report)
}
