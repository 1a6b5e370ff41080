//! Closed key vocabularies recognised in campaign specifications.

use serde::{Deserialize, Serialize};

/// Run-level switches forwarded verbatim to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunSetting {
    /// Engine renders its own diagnostic plots.
    Plot,
    /// Engine writes result files.
    Write,
    /// Engine runs with verbose diagnostics.
    Debug,
    /// Engine tracks per-agent trajectories.
    Track,
}

impl RunSetting {
    /// Every run setting in artifact order.
    pub const ALL: [RunSetting; 4] = [
        RunSetting::Plot,
        RunSetting::Write,
        RunSetting::Debug,
        RunSetting::Track,
    ];

    /// Key used in the specification and in the job artifact.
    pub fn key(self) -> &'static str {
        match self {
            RunSetting::Plot => "plot",
            RunSetting::Write => "write",
            RunSetting::Debug => "debug",
            RunSetting::Track => "track",
        }
    }

    /// Resolves a specification key.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|setting| setting.key() == key)
    }
}

/// Scenario switches. Declaration order is the label order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioFlag {
    /// Reference case: no strategic behaviour.
    Reference,
    /// Investment decisions take effect after a construction lag.
    TimeLag,
    /// A carbon tax applies.
    Co2Tax,
    /// Capital subsidy for new capacity.
    InvestmentSubsidy,
    /// Per-unit production subsidy.
    ProductionSubsidy,
    /// State guarantee on investment loans.
    LoanGuarantee,
    /// Guaranteed minimum sale price.
    PriceGuarantee,
}

impl ScenarioFlag {
    /// Every scenario flag in label order.
    pub const ALL: [ScenarioFlag; 7] = [
        ScenarioFlag::Reference,
        ScenarioFlag::TimeLag,
        ScenarioFlag::Co2Tax,
        ScenarioFlag::InvestmentSubsidy,
        ScenarioFlag::ProductionSubsidy,
        ScenarioFlag::LoanGuarantee,
        ScenarioFlag::PriceGuarantee,
    ];

    /// Key used in the specification and in the job artifact.
    pub fn key(self) -> &'static str {
        match self {
            ScenarioFlag::Reference => "reference",
            ScenarioFlag::TimeLag => "time_lag",
            ScenarioFlag::Co2Tax => "co2_tax",
            ScenarioFlag::InvestmentSubsidy => "investment_subsidy",
            ScenarioFlag::ProductionSubsidy => "production_subsidy",
            ScenarioFlag::LoanGuarantee => "loan_guarantee",
            ScenarioFlag::PriceGuarantee => "price_guarantee",
        }
    }

    /// Token contributed to an experiment label when the flag is enabled.
    ///
    /// `Reference` is special-cased by the label builder: it yields `BASE`
    /// when set and `STRAT` otherwise.
    pub fn label_token(self) -> &'static str {
        match self {
            ScenarioFlag::Reference => "BASE",
            ScenarioFlag::TimeLag => "LAG",
            ScenarioFlag::Co2Tax => "CO2",
            ScenarioFlag::InvestmentSubsidy => "ISUB",
            ScenarioFlag::ProductionSubsidy => "PSUB",
            ScenarioFlag::LoanGuarantee => "LOAN",
            ScenarioFlag::PriceGuarantee => "PRICE",
        }
    }

    /// Resolves a specification key.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|flag| flag.key() == key)
    }
}

/// Sampling mode of the sensitivity design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SensitivityMode {
    /// No variation: a single baseline row.
    #[default]
    None,
    /// One-at-a-time linear sweep over the first selected variable.
    Single,
    /// Saltelli cross-sampling over a Sobol sequence.
    Sobol,
}

impl SensitivityMode {
    /// Parses the `sensitivity:` token, case-insensitively.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "none" => Some(SensitivityMode::None),
            "single" => Some(SensitivityMode::Single),
            "sobol" => Some(SensitivityMode::Sobol),
            _ => None,
        }
    }

    /// Canonical lowercase token.
    pub fn token(self) -> &'static str {
        match self {
            SensitivityMode::None => "none",
            SensitivityMode::Single => "single",
            SensitivityMode::Sobol => "sobol",
        }
    }
}

/// Recognised sensitivity variables with their engine baseline values.
pub const SENSITIVITY_VARIABLES: [(&str, f64); 8] = [
    ("discount_rate", 0.05),
    ("co2_price", 50.0),
    ("capex_factor", 1.0),
    ("learning_rate", 0.1),
    ("demand_growth", 0.01),
    ("gas_price", 25.0),
    ("subsidy_level", 0.2),
    ("risk_premium", 0.02),
];

/// Suffix marking the bounds line of a sensitivity variable.
pub const BOUNDS_SUFFIX: &str = "_bounds";

/// Returns the canonical name of a recognised sensitivity variable.
pub fn sensitivity_variable(name: &str) -> Option<&'static str> {
    SENSITIVITY_VARIABLES
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(known, _)| *known)
}
