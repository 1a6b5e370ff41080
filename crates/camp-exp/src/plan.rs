//! Expansion of a design into the ordered list of experiments.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use camp_core::errors::{CampaignError, ErrorInfo};
use camp_design::{SensitivityDesign, SensitivityRow};
use camp_spec::{RunSpec, ScenarioFlag};
use serde::{Deserialize, Serialize};

use crate::layout::experiment_dir;

/// One job: a design row, a replicate index and the job's output location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    /// 1-based index of the design row.
    pub sensitivity_index: usize,
    /// 1-based replicate index.
    pub replicate_index: u32,
    /// Scenario switches, copied from the specification.
    pub scenario: BTreeMap<ScenarioFlag, bool>,
    /// Resolved values of every sensitivity variable.
    pub sensitivity: SensitivityRow,
    /// Job directory (`.../Sensitivity_<i>/Run_<j>`).
    pub output_path: PathBuf,
    /// Scenario label, e.g. `STRAT_CO2_PSUB`.
    pub label: String,
}

impl Experiment {
    /// `(sensitivity_index, replicate_index)` pair identifying the job.
    pub fn key(&self) -> (usize, u32) {
        (self.sensitivity_index, self.replicate_index)
    }
}

/// Builds the scenario label.
///
/// The first token is `BASE` for the reference case and `STRAT` otherwise;
/// the remaining tokens follow in flag declaration order and appear only when
/// set.
pub fn experiment_label(scenario: &BTreeMap<ScenarioFlag, bool>) -> String {
    let enabled = |flag: ScenarioFlag| scenario.get(&flag).copied().unwrap_or(false);
    let mut tokens = vec![if enabled(ScenarioFlag::Reference) {
        ScenarioFlag::Reference.label_token()
    } else {
        "STRAT"
    }];
    tokens.extend(
        ScenarioFlag::ALL
            .into_iter()
            .filter(|flag| *flag != ScenarioFlag::Reference && enabled(*flag))
            .map(ScenarioFlag::label_token),
    );
    tokens.join("_")
}

/// Enumerates every experiment of a campaign rooted at `campaign_root`.
///
/// Order is design row ascending, then replicate ascending. The result holds
/// exactly `design.len() * spec.replicate_count` entries with distinct paths.
pub fn plan(
    spec: &RunSpec,
    design: &SensitivityDesign,
    campaign_root: &Path,
) -> Result<Vec<Experiment>, CampaignError> {
    if spec.replicate_count < 1 {
        return Err(CampaignError::Plan(
            ErrorInfo::new("plan-empty-campaign", "campaign has no replicate runs")
                .with_context("runs", spec.replicate_count.to_string())
                .with_hint("set `runs` to 1 or more"),
        ));
    }
    let label = experiment_label(&spec.scenario_flags);
    let mut experiments = Vec::with_capacity(design.len() * spec.replicate_count as usize);
    for (sensitivity_index, row) in design.indexed_rows() {
        for replicate_index in 1..=spec.replicate_count {
            experiments.push(Experiment {
                sensitivity_index,
                replicate_index,
                scenario: spec.scenario_flags.clone(),
                sensitivity: row.clone(),
                output_path: experiment_dir(campaign_root, sensitivity_index, replicate_index),
                label: label.clone(),
            });
        }
    }
    Ok(experiments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(enabled: &[ScenarioFlag]) -> BTreeMap<ScenarioFlag, bool> {
        ScenarioFlag::ALL
            .into_iter()
            .map(|flag| (flag, enabled.contains(&flag)))
            .collect()
    }

    #[test]
    fn label_defaults_to_strategic() {
        assert_eq!(experiment_label(&flags(&[])), "STRAT");
        assert_eq!(experiment_label(&BTreeMap::new()), "STRAT");
    }

    #[test]
    fn label_follows_flag_order() {
        let label = experiment_label(&flags(&[
            ScenarioFlag::PriceGuarantee,
            ScenarioFlag::Co2Tax,
            ScenarioFlag::Reference,
            ScenarioFlag::TimeLag,
        ]));
        assert_eq!(label, "BASE_LAG_CO2_PRICE");
        let label = experiment_label(&flags(&[
            ScenarioFlag::InvestmentSubsidy,
            ScenarioFlag::ProductionSubsidy,
            ScenarioFlag::LoanGuarantee,
        ]));
        assert_eq!(label, "STRAT_ISUB_PSUB_LOAN");
    }
}
