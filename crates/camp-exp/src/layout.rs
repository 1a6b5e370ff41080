//! Hierarchical result store layout.
//!
//! Every job owns `<root>/<timestamp>/Sensitivity_<i>/Run_<j>/`. The path
//! functions are pure; the `create_*` helpers create directories exclusively
//! so that two campaigns or two jobs never share a location.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use camp_core::errors::{CampaignError, ErrorInfo};
use chrono::{DateTime, TimeZone};

/// Prefix of the per-row directory.
pub const SENSITIVITY_PREFIX: &str = "Sensitivity_";
/// Prefix of the per-replicate directory.
pub const RUN_PREFIX: &str = "Run_";
/// `strftime` pattern of the campaign directory name.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// `<root>/<timestamp>`.
pub fn campaign_root(root: &Path, timestamp: &str) -> PathBuf {
    root.join(timestamp)
}

/// `<campaign_root>/Sensitivity_<i>`.
pub fn sensitivity_dir(campaign_root: &Path, sensitivity: usize) -> PathBuf {
    campaign_root.join(format!("{SENSITIVITY_PREFIX}{sensitivity}"))
}

/// `<campaign_root>/Sensitivity_<i>/Run_<j>`.
pub fn experiment_dir(campaign_root: &Path, sensitivity: usize, replicate: u32) -> PathBuf {
    sensitivity_dir(campaign_root, sensitivity).join(format!("{RUN_PREFIX}{replicate}"))
}

/// Full job path from the result root.
pub fn path(root: &Path, timestamp: &str, sensitivity: usize, replicate: u32) -> PathBuf {
    experiment_dir(&campaign_root(root, timestamp), sensitivity, replicate)
}

/// Formats a campaign directory name.
pub fn campaign_timestamp<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Creates missing parents of `path`, then `path` itself exclusively.
pub fn create_campaign_root(path: &Path) -> Result<(), CampaignError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| {
            CampaignError::Layout(
                ErrorInfo::new("layout-create", "failed to create result root")
                    .with_context("path", parent.display().to_string())
                    .with_hint(err.to_string()),
            )
        })?;
    }
    create_exclusive_dir(path)
}

/// Creates a single directory, failing if anything already exists at `path`.
pub fn create_exclusive_dir(path: &Path) -> Result<(), CampaignError> {
    fs::create_dir(path).map_err(|err| {
        let info = if err.kind() == ErrorKind::AlreadyExists {
            ErrorInfo::new("layout-collision", "result directory already exists")
        } else {
            ErrorInfo::new("layout-create", "failed to create result directory")
        };
        CampaignError::Layout(
            info.with_context("path", path.display().to_string())
                .with_hint(err.to_string()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    #[test]
    fn timestamp_uses_dashes_and_underscore() {
        let at = NaiveDate::from_ymd_opt(2024, 3, 9)
            .and_then(|date| date.and_hms_opt(7, 5, 1))
            .expect("valid date")
            .and_utc();
        assert_eq!(campaign_timestamp(&at), "2024-03-09_07-05-01");
        assert_eq!(campaign_timestamp(&Utc::now()).len(), 19);
    }

    #[test]
    fn path_nests_sensitivity_then_run() {
        let job = path(Path::new("results"), "2024-03-09_07-05-01", 2, 3);
        assert_eq!(
            job,
            Path::new("results/2024-03-09_07-05-01/Sensitivity_2/Run_3")
        );
    }
}
