use std::collections::{BTreeMap, BTreeSet};

use camp_core::entropy_seed;
use camp_core::errors::{CampaignError, ErrorInfo};
use camp_spec::{RunSpec, SensitivityBounds, SensitivityMode, SobolOptions};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::saltelli::{balanced_base_size, saltelli_row_count, saltelli_unit_rows};
use crate::sobol::{SobolSequence, MAX_DIMENSIONS};

/// One concrete assignment of values to every recognised sensitivity variable.
pub type SensitivityRow = BTreeMap<String, f64>;

/// Origin of the randomness behind a design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "seed", rename_all = "kebab-case")]
pub enum SamplingSeed {
    /// Deterministic design without any sampling (`none`, `single`).
    NotSampled,
    /// Plain Sobol sequence; identical on every run.
    Unscrambled,
    /// Scrambled with the seed given in the specification.
    Fixed(u64),
    /// Scrambled with a seed drawn from OS entropy; replay requires the
    /// recorded value.
    Entropy(u64),
}

impl SamplingSeed {
    /// Master seed used for scrambling, if any.
    pub fn value(&self) -> Option<u64> {
        match self {
            SamplingSeed::Fixed(seed) | SamplingSeed::Entropy(seed) => Some(*seed),
            SamplingSeed::NotSampled | SamplingSeed::Unscrambled => None,
        }
    }

    /// True when rerunning the same specification reproduces the design.
    pub fn is_reproducible(&self) -> bool {
        !matches!(self, SamplingSeed::Entropy(_))
    }
}

/// Ordered list of sensitivity rows for one campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityDesign {
    /// Mode the design was generated with.
    pub mode: SensitivityMode,
    /// Variables actually varied, in selection order.
    pub varied: Vec<String>,
    /// Every recognised variable, in row column order.
    pub variables: Vec<String>,
    /// Power-of-two base sample size (Sobol only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_samples: Option<usize>,
    /// Seed provenance of the sampled values.
    pub seed: SamplingSeed,
    /// Design rows; never empty.
    pub rows: Vec<SensitivityRow>,
}

impl SensitivityDesign {
    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Always false: a design carries at least the baseline row.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows paired with their 1-based sensitivity index.
    pub fn indexed_rows(&self) -> impl Iterator<Item = (usize, &SensitivityRow)> {
        self.rows.iter().enumerate().map(|(idx, row)| (idx + 1, row))
    }
}

/// Generates the design described by `spec`.
pub fn generate(spec: &RunSpec) -> Result<SensitivityDesign, CampaignError> {
    generate_design(
        spec.sensitivity_mode,
        &spec.sensitivity_variables,
        &spec.sensitivity,
        spec.sensitivity_runs,
        spec.sobol,
    )
}

/// Generates a design from explicit inputs.
///
/// * `none` yields one baseline row.
/// * `single` varies only `selected[0]` over `requested_rows` evenly spaced
///   values including both bounds; further names are ignored.
/// * `sobol` varies every selected name jointly. The base sample is
///   `N = 2^floor(log2(requested_rows))` and the design has exactly
///   `N * (2 * selected.len() + 2)` rows.
pub fn generate_design(
    mode: SensitivityMode,
    selected: &[String],
    bounds: &BTreeMap<String, SensitivityBounds>,
    requested_rows: usize,
    sobol: SobolOptions,
) -> Result<SensitivityDesign, CampaignError> {
    let baseline: SensitivityRow = bounds
        .iter()
        .map(|(name, entry)| (name.clone(), entry.baseline))
        .collect();
    let mut design = SensitivityDesign {
        mode,
        varied: Vec::new(),
        variables: bounds.keys().cloned().collect(),
        base_samples: None,
        seed: SamplingSeed::NotSampled,
        rows: Vec::new(),
    };

    match mode {
        SensitivityMode::None => {}
        SensitivityMode::Single => {
            let name = selected.first().ok_or_else(empty_selection)?;
            if selected.len() > 1 {
                warn!(
                    used = %name,
                    ignored = ?&selected[1..],
                    "single mode varies only the first selected variable"
                );
            }
            let (lower, upper) = resolve_range(name, bounds)?;
            design.varied = vec![name.clone()];
            design.rows = linspace(lower, upper, requested_rows)
                .into_iter()
                .map(|value| {
                    let mut row = baseline.clone();
                    row.insert(name.clone(), value);
                    row
                })
                .collect();
        }
        SensitivityMode::Sobol => {
            if selected.is_empty() {
                return Err(empty_selection());
            }
            let mut seen = BTreeSet::new();
            if let Some(dup) = selected.iter().find(|name| !seen.insert(name.as_str())) {
                return Err(CampaignError::SensitivityLookup(
                    ErrorInfo::new("sensitivity-duplicate-variable", "variable selected twice")
                        .with_context("variable", dup.clone()),
                ));
            }
            if 2 * selected.len() > MAX_DIMENSIONS {
                return Err(CampaignError::SensitivityLookup(
                    ErrorInfo::new("sensitivity-too-many-variables", "too many Sobol variables")
                        .with_context("selected", selected.len().to_string())
                        .with_context("max", (MAX_DIMENSIONS / 2).to_string()),
                ));
            }
            let ranges = selected
                .iter()
                .map(|name| resolve_range(name, bounds))
                .collect::<Result<Vec<_>, _>>()?;

            let base = balanced_base_size(requested_rows);
            let dimensions = 2 * selected.len();
            let (mut sequence, seed) = match (sobol.scramble, sobol.seed) {
                (false, _) => (SobolSequence::new(dimensions)?, SamplingSeed::Unscrambled),
                (true, Some(seed)) => (
                    SobolSequence::scrambled(dimensions, seed)?,
                    SamplingSeed::Fixed(seed),
                ),
                (true, None) => {
                    let seed = entropy_seed();
                    warn!(
                        seed,
                        "sobol design scrambled with an entropy seed; set `sobol_seed: {}` to reproduce it",
                        seed
                    );
                    (
                        SobolSequence::scrambled(dimensions, seed)?,
                        SamplingSeed::Entropy(seed),
                    )
                }
            };

            design.varied = selected.to_vec();
            design.base_samples = Some(base);
            design.seed = seed;
            design.rows = saltelli_unit_rows(&mut sequence, selected.len(), base)
                .into_iter()
                .map(|unit| {
                    let mut row = baseline.clone();
                    for ((name, (lower, upper)), u) in selected.iter().zip(&ranges).zip(unit) {
                        row.insert(name.clone(), lower + u * (upper - lower));
                    }
                    row
                })
                .collect();
            debug_assert_eq!(
                design.rows.len(),
                saltelli_row_count(selected.len(), base)
            );
        }
    }

    if design.rows.is_empty() {
        design.rows.push(baseline);
    }
    info!(
        mode = mode.token(),
        rows = design.rows.len(),
        varied = ?design.varied,
        "sensitivity design generated"
    );
    Ok(design)
}

/// `count` evenly spaced values over `[lower, upper]`, both ends included.
fn linspace(lower: f64, upper: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![lower],
        _ => {
            let step = (upper - lower) / (count - 1) as f64;
            let mut values: Vec<f64> = (0..count).map(|k| lower + step * k as f64).collect();
            values[count - 1] = upper;
            values
        }
    }
}

fn resolve_range(
    name: &str,
    bounds: &BTreeMap<String, SensitivityBounds>,
) -> Result<(f64, f64), CampaignError> {
    let entry = bounds.get(name).ok_or_else(|| {
        CampaignError::SensitivityLookup(
            ErrorInfo::new("sensitivity-unknown-variable", "variable is not recognised")
                .with_context("variable", name),
        )
    })?;
    entry.range.ok_or_else(|| {
        CampaignError::SensitivityLookup(
            ErrorInfo::new("sensitivity-no-bounds", "no bounds configured for variable")
                .with_context("variable", name)
                .with_hint(format!("add `{name}_bounds: [lower, upper]`")),
        )
    })
}

fn empty_selection() -> CampaignError {
    CampaignError::SensitivityLookup(ErrorInfo::new(
        "sensitivity-empty-selection",
        "sensitivity mode requires at least one selected variable",
    ))
}
