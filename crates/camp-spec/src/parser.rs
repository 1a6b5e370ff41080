//! Line-oriented `key: value` specification parser.
//!
//! Every line is classified into one of five buckets (run counts, run
//! settings, scenario flags, sensitivity selection, sensitivity variables)
//! and coerced with the parser of that bucket. Keys outside the vocabulary
//! are ignored to stay compatible with existing specification files; they are
//! logged and collected in [`RunSpec::ignored_keys`].

use std::fs;
use std::path::Path;

use camp_core::errors::{CampaignError, ErrorInfo};
use tracing::debug;

use crate::spec::RunSpec;
use crate::vocab::{
    sensitivity_variable, RunSetting, ScenarioFlag, SensitivityMode, BOUNDS_SUFFIX,
};

#[derive(Debug, Clone, Copy)]
enum CountKey {
    Runs,
    Cores,
    SensitivityRuns,
    Steps,
}

#[derive(Debug, Clone, Copy)]
enum SpecKey {
    Count(CountKey),
    Setting(RunSetting),
    Scenario(ScenarioFlag),
    Mode,
    Variables,
    SobolScramble,
    SobolSeed,
    Baseline(&'static str),
    Bounds(&'static str),
    Unknown,
}

impl SpecKey {
    fn classify(key: &str) -> Self {
        match key {
            "runs" => return SpecKey::Count(CountKey::Runs),
            "cores" => return SpecKey::Count(CountKey::Cores),
            "sensitivity_runs" => return SpecKey::Count(CountKey::SensitivityRuns),
            "steps" => return SpecKey::Count(CountKey::Steps),
            "sensitivity" => return SpecKey::Mode,
            "sensitivity_variables" => return SpecKey::Variables,
            "sobol_scramble" => return SpecKey::SobolScramble,
            "sobol_seed" => return SpecKey::SobolSeed,
            _ => {}
        }
        if let Some(setting) = RunSetting::from_key(key) {
            return SpecKey::Setting(setting);
        }
        if let Some(flag) = ScenarioFlag::from_key(key) {
            return SpecKey::Scenario(flag);
        }
        if let Some(name) = sensitivity_variable(key) {
            return SpecKey::Baseline(name);
        }
        if let Some(name) = key.strip_suffix(BOUNDS_SUFFIX).and_then(sensitivity_variable) {
            return SpecKey::Bounds(name);
        }
        SpecKey::Unknown
    }
}

/// Reads and parses the specification at `path`.
pub fn load_spec<P: AsRef<Path>>(path: P) -> Result<RunSpec, CampaignError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|err| {
        CampaignError::SpecRead(
            ErrorInfo::new("spec-read", "failed to read specification")
                .with_context("path", path.display().to_string())
                .with_hint(err.to_string()),
        )
    })?;
    parse_spec_str(&text)
}

/// Parses specification text into a [`RunSpec`].
pub fn parse_spec_str(text: &str) -> Result<RunSpec, CampaignError> {
    let mut spec = RunSpec::default();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line_no = idx + 1;
        let Some((key, value)) = line.split_once(':') else {
            return Err(value_error(line_no, line, "", "expected `key: value`"));
        };
        let key = key.trim();
        let value = value.trim();
        apply_line(&mut spec, line_no, key, value)?;
    }
    Ok(spec)
}

fn apply_line(
    spec: &mut RunSpec,
    line_no: usize,
    key: &str,
    value: &str,
) -> Result<(), CampaignError> {
    let fail = |message: &str| value_error(line_no, key, value, message);
    match SpecKey::classify(key) {
        SpecKey::Count(count) => match count {
            CountKey::Runs => {
                spec.replicate_count = parse_int(value).ok_or_else(|| fail("expected integer"))?;
            }
            CountKey::Cores => {
                spec.concurrency =
                    parse_positive(value).ok_or_else(|| fail("expected integer >= 1"))?;
            }
            CountKey::SensitivityRuns => {
                spec.sensitivity_runs =
                    parse_positive(value).ok_or_else(|| fail("expected integer >= 1"))?;
            }
            CountKey::Steps => {
                let steps: u32 = parse_int(value).ok_or_else(|| fail("expected integer"))?;
                if steps == 0 {
                    return Err(fail("expected integer >= 1"));
                }
                spec.steps = steps;
            }
        },
        SpecKey::Setting(setting) => {
            let flag = parse_bool(value).ok_or_else(|| fail("expected boolean"))?;
            spec.run_settings.insert(setting, flag);
        }
        SpecKey::Scenario(scenario) => {
            let flag = parse_bool(value).ok_or_else(|| fail("expected boolean"))?;
            spec.scenario_flags.insert(scenario, flag);
        }
        SpecKey::Mode => {
            spec.sensitivity_mode = SensitivityMode::from_token(value).ok_or_else(|| {
                CampaignError::SensitivityMode(
                    ErrorInfo::new("sensitivity-mode", "unknown sensitivity mode")
                        .with_context("line", line_no.to_string())
                        .with_context("value", value)
                        .with_hint("expected one of: none, single, sobol"),
                )
            })?;
        }
        SpecKey::Variables => {
            spec.sensitivity_variables = parse_list(value)
                .map_err(|msg| fail(msg.as_str()))?
                .into_iter()
                .map(|item| unquote(&item).map_err(|msg| fail(msg.as_str())))
                .collect::<Result<_, _>>()?;
        }
        SpecKey::SobolScramble => {
            spec.sobol.scramble = parse_bool(value).ok_or_else(|| fail("expected boolean"))?;
        }
        SpecKey::SobolSeed => {
            spec.sobol.seed = Some(parse_int(value).ok_or_else(|| fail("expected integer"))?);
        }
        SpecKey::Baseline(name) => {
            let baseline = parse_float(value).ok_or_else(|| fail("expected finite float"))?;
            if let Some(entry) = spec.sensitivity.get_mut(name) {
                entry.baseline = baseline;
            }
        }
        SpecKey::Bounds(name) => {
            let items = parse_list(value).map_err(|msg| fail(msg.as_str()))?;
            let [lower, upper] = items.as_slice() else {
                return Err(fail("expected `[lower, upper]`"));
            };
            let lower = parse_float(lower).ok_or_else(|| fail("lower bound is not a float"))?;
            let upper = parse_float(upper).ok_or_else(|| fail("upper bound is not a float"))?;
            if lower > upper {
                return Err(fail("lower bound exceeds upper bound"));
            }
            if let Some(entry) = spec.sensitivity.get_mut(name) {
                entry.range = Some((lower, upper));
            }
        }
        SpecKey::Unknown => {
            debug!(line = line_no, key, "ignoring unrecognised specification key");
            spec.ignored_keys.push(key.to_string());
        }
    }
    Ok(())
}

fn value_error(line_no: usize, key: &str, value: &str, message: &str) -> CampaignError {
    CampaignError::SpecValue(
        ErrorInfo::new("spec-value", message)
            .with_context("line", line_no.to_string())
            .with_context("key", key)
            .with_context("value", value),
    )
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "True" | "true" | "1" | "yes" => Some(true),
        "False" | "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn parse_int<T: std::str::FromStr>(value: &str) -> Option<T> {
    value.parse().ok()
}

fn parse_positive(value: &str) -> Option<usize> {
    parse_int::<usize>(value).filter(|v| *v >= 1)
}

fn parse_float(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Splits a Python-style list literal (`[a, b, c]`) into trimmed items.
fn parse_list(value: &str) -> Result<Vec<String>, String> {
    let inner = value
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| "expected list literal `[...]`".to_string())?
        .trim();
    if inner.is_empty() {
        return Ok(Vec::new());
    }
    let mut items: Vec<String> = inner.split(',').map(|item| item.trim().to_string()).collect();
    // Python tolerates one trailing comma.
    if items.last().is_some_and(|last| last.is_empty()) {
        items.pop();
    }
    if items.iter().any(String::is_empty) {
        return Err("empty list item".to_string());
    }
    Ok(items)
}

fn unquote(item: &str) -> Result<String, String> {
    for quote in ['\'', '"'] {
        if let Some(stripped) = item
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return Ok(stripped.to_string());
        }
    }
    if item.contains(['\'', '"']) {
        return Err(format!("unbalanced quotes in `{item}`"));
    }
    Ok(item.to_string())
}
