#![deny(missing_docs)]
#![doc = "Campaign specification vocabulary, the parsed `RunSpec` value and its text parser."]

/// Text parser for `key: value` specification files.
pub mod parser;
/// Immutable parsed specification.
pub mod spec;
/// Closed key vocabularies.
pub mod vocab;

pub use parser::{load_spec, parse_spec_str};
pub use spec::{RunSpec, SensitivityBounds, SobolOptions};
pub use vocab::{
    sensitivity_variable, RunSetting, ScenarioFlag, SensitivityMode, SENSITIVITY_VARIABLES,
};
