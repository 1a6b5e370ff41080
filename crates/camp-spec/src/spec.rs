//! Parsed campaign specification.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::vocab::{RunSetting, ScenarioFlag, SensitivityMode, SENSITIVITY_VARIABLES};

/// Baseline and optional variation range of one sensitivity variable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensitivityBounds {
    /// Value used whenever the variable is not varied.
    pub baseline: f64,
    /// Inclusive `(lower, upper)` range, required when the variable is selected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<(f64, f64)>,
}

/// Scrambling policy for Sobol sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SobolOptions {
    /// Apply a seeded random digital shift to the sequence.
    pub scramble: bool,
    /// Master seed for the shift; drawn from entropy when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for SobolOptions {
    fn default() -> Self {
        Self {
            scramble: true,
            seed: None,
        }
    }
}

/// Immutable description of one campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSpec {
    /// Number of replicate runs per sensitivity row.
    pub replicate_count: u32,
    /// Number of workers, each owning one engine session.
    pub concurrency: usize,
    /// Requested number of design rows for `single` and `sobol` modes.
    pub sensitivity_runs: usize,
    /// Engine steps executed per job.
    pub steps: u32,
    /// Run-level switches.
    pub run_settings: BTreeMap<RunSetting, bool>,
    /// Scenario switches.
    pub scenario_flags: BTreeMap<ScenarioFlag, bool>,
    /// Design sampling mode.
    pub sensitivity_mode: SensitivityMode,
    /// Ordered selection of varied variables.
    pub sensitivity_variables: Vec<String>,
    /// Sobol scrambling policy.
    pub sobol: SobolOptions,
    /// Baseline and bounds for every recognised variable.
    pub sensitivity: BTreeMap<String, SensitivityBounds>,
    /// Keys present in the source but not part of the vocabulary.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignored_keys: Vec<String>,
}

impl Default for RunSpec {
    fn default() -> Self {
        Self {
            replicate_count: 1,
            concurrency: 1,
            sensitivity_runs: 1,
            steps: 100,
            run_settings: RunSetting::ALL.into_iter().map(|s| (s, false)).collect(),
            scenario_flags: ScenarioFlag::ALL.into_iter().map(|f| (f, false)).collect(),
            sensitivity_mode: SensitivityMode::None,
            sensitivity_variables: Vec::new(),
            sobol: SobolOptions::default(),
            sensitivity: SENSITIVITY_VARIABLES
                .iter()
                .map(|(name, baseline)| {
                    (
                        name.to_string(),
                        SensitivityBounds {
                            baseline: *baseline,
                            range: None,
                        },
                    )
                })
                .collect(),
            ignored_keys: Vec::new(),
        }
    }
}

impl RunSpec {
    /// Returns the value of a scenario flag.
    pub fn scenario(&self, flag: ScenarioFlag) -> bool {
        self.scenario_flags.get(&flag).copied().unwrap_or(false)
    }

    /// Returns the value of a run setting.
    pub fn setting(&self, setting: RunSetting) -> bool {
        self.run_settings.get(&setting).copied().unwrap_or(false)
    }

    /// Returns the bounds entry for a variable.
    pub fn bounds(&self, name: &str) -> Option<&SensitivityBounds> {
        self.sensitivity.get(name)
    }

    /// Every recognised variable mapped to its baseline value.
    pub fn baseline_row(&self) -> BTreeMap<String, f64> {
        self.sensitivity
            .iter()
            .map(|(name, bounds)| (name.clone(), bounds.baseline))
            .collect()
    }
}
