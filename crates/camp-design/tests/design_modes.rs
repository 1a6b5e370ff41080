use std::collections::BTreeMap;

use camp_core::CampaignError;
use camp_design::{generate, generate_design, SamplingSeed};
use camp_spec::{parse_spec_str, SensitivityBounds, SensitivityMode, SobolOptions};
use proptest::prelude::*;

fn bounds_with(ranges: &[(&str, f64, f64)]) -> BTreeMap<String, SensitivityBounds> {
    let mut bounds = camp_spec::RunSpec::default().sensitivity;
    for (name, lower, upper) in ranges {
        bounds
            .get_mut(*name)
            .expect("recognised variable")
            .range = Some((*lower, *upper));
    }
    bounds
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|name| name.to_string()).collect()
}

#[test]
fn none_mode_yields_single_baseline_row() {
    let spec = parse_spec_str("runs: 3\nco2_price: 80.0\n").expect("spec");
    let design = generate(&spec).expect("design");
    assert_eq!(design.len(), 1);
    assert_eq!(design.seed, SamplingSeed::NotSampled);
    assert_eq!(design.rows[0], spec.baseline_row());
    assert_eq!(design.rows[0]["co2_price"], 80.0);
    assert_eq!(design.variables.len(), camp_spec::SENSITIVITY_VARIABLES.len());
}

#[test]
fn single_mode_sweeps_first_variable_inclusively() {
    let spec = parse_spec_str(
        "sensitivity: single\n\
         sensitivity_variables: ['co2_price', 'gas_price']\n\
         sensitivity_runs: 5\n\
         co2_price_bounds: [0, 10]\n",
    )
    .expect("spec");
    let design = generate(&spec).expect("design");
    let values: Vec<f64> = design.rows.iter().map(|row| row["co2_price"]).collect();
    assert_eq!(values, vec![0.0, 2.5, 5.0, 7.5, 10.0]);
    assert_eq!(design.varied, names(&["co2_price"]));
    for row in &design.rows {
        assert_eq!(row["gas_price"], 25.0);
        assert_eq!(row["discount_rate"], 0.05);
    }
}

#[test]
fn single_mode_with_one_row_uses_lower_bound() {
    let bounds = bounds_with(&[("gas_price", 10.0, 40.0)]);
    let design = generate_design(
        SensitivityMode::Single,
        &names(&["gas_price"]),
        &bounds,
        1,
        SobolOptions::default(),
    )
    .expect("design");
    assert_eq!(design.len(), 1);
    assert_eq!(design.rows[0]["gas_price"], 10.0);
}

#[test]
fn sobol_mode_rounds_base_down_and_expands() {
    let bounds = bounds_with(&[("co2_price", 20.0, 120.0), ("gas_price", 10.0, 40.0)]);
    let opts = SobolOptions {
        scramble: true,
        seed: Some(42),
    };
    let selected = names(&["co2_price", "gas_price"]);
    let design =
        generate_design(SensitivityMode::Sobol, &selected, &bounds, 11, opts).expect("design");
    assert_eq!(design.base_samples, Some(8));
    assert_eq!(design.len(), 8 * (2 * 2 + 2));
    assert_eq!(design.seed, SamplingSeed::Fixed(42));
    for row in &design.rows {
        assert!((20.0..=120.0).contains(&row["co2_price"]));
        assert!((10.0..=40.0).contains(&row["gas_price"]));
        assert_eq!(row["capex_factor"], 1.0);
    }

    let again =
        generate_design(SensitivityMode::Sobol, &selected, &bounds, 11, opts).expect("again");
    assert_eq!(design.rows, again.rows);
}

#[test]
fn unscrambled_sobol_is_deterministic() {
    let spec_text = "sensitivity: sobol\n\
                     sensitivity_variables: [discount_rate]\n\
                     sensitivity_runs: 4\n\
                     sobol_scramble: false\n\
                     discount_rate_bounds: [0.0, 0.1]\n";
    let first = generate(&parse_spec_str(spec_text).expect("spec")).expect("first");
    let second = generate(&parse_spec_str(spec_text).expect("spec")).expect("second");
    assert_eq!(first.seed, SamplingSeed::Unscrambled);
    assert_eq!(first.rows, second.rows);
    assert_eq!(first.len(), 4 * 4);
    // The unscrambled sequence starts at the origin, so the A row sits on the lower bound.
    assert_eq!(first.rows[0]["discount_rate"], 0.0);
}

#[test]
fn entropy_seed_is_recorded_for_replay() {
    let bounds = bounds_with(&[("learning_rate", 0.05, 0.2)]);
    let selected = names(&["learning_rate"]);
    let drawn = generate_design(
        SensitivityMode::Sobol,
        &selected,
        &bounds,
        8,
        SobolOptions::default(),
    )
    .expect("design");
    let SamplingSeed::Entropy(seed) = drawn.seed else {
        panic!("expected entropy seed, got {:?}", drawn.seed);
    };
    assert!(!drawn.seed.is_reproducible());

    let replay = generate_design(
        SensitivityMode::Sobol,
        &selected,
        &bounds,
        8,
        SobolOptions {
            scramble: true,
            seed: Some(seed),
        },
    )
    .expect("replay");
    assert_eq!(drawn.rows, replay.rows);
}

#[test]
fn missing_bounds_is_a_lookup_error() {
    let spec = parse_spec_str("sensitivity: sobol\nsensitivity_variables: [gas_price]\n")
        .expect("spec");
    let err = generate(&spec).expect_err("no bounds");
    assert!(matches!(err, CampaignError::SensitivityLookup(_)));
    assert_eq!(err.info().code, "sensitivity-no-bounds");
}

#[test]
fn unknown_and_empty_selections_are_rejected() {
    let bounds = bounds_with(&[]);
    let err = generate_design(
        SensitivityMode::Single,
        &names(&["oil_price"]),
        &bounds,
        3,
        SobolOptions::default(),
    )
    .expect_err("unknown");
    assert_eq!(err.info().code, "sensitivity-unknown-variable");

    let err = generate_design(SensitivityMode::Sobol, &[], &bounds, 3, SobolOptions::default())
        .expect_err("empty");
    assert_eq!(err.info().code, "sensitivity-empty-selection");
}

#[test]
fn duplicate_sobol_variable_is_rejected() {
    let bounds = bounds_with(&[("gas_price", 10.0, 40.0)]);
    let err = generate_design(
        SensitivityMode::Sobol,
        &names(&["gas_price", "gas_price"]),
        &bounds,
        4,
        SobolOptions::default(),
    )
    .expect_err("duplicate");
    assert_eq!(err.info().code, "sensitivity-duplicate-variable");
}

#[test]
fn design_serializes_seed_provenance() {
    let bounds = bounds_with(&[("gas_price", 10.0, 40.0)]);
    let design = generate_design(
        SensitivityMode::Sobol,
        &names(&["gas_price"]),
        &bounds,
        2,
        SobolOptions {
            scramble: true,
            seed: Some(7),
        },
    )
    .expect("design");
    let value = serde_json::to_value(&design).expect("json");
    assert_eq!(value["seed"]["source"], "fixed");
    assert_eq!(value["seed"]["seed"], 7);
    assert_eq!(value["mode"], "sobol");
}

proptest! {
    #[test]
    fn sobol_row_count_matches_saltelli_formula(requested in 1usize..300, vars in 1usize..=4) {
        let all = ["co2_price", "gas_price", "learning_rate", "risk_premium"];
        let ranges: Vec<(&str, f64, f64)> =
            all[..vars].iter().map(|name| (*name, 0.0, 1.0)).collect();
        let bounds = bounds_with(&ranges);
        let selected = names(&all[..vars]);
        let design = generate_design(
            SensitivityMode::Sobol,
            &selected,
            &bounds,
            requested,
            SobolOptions { scramble: false, seed: None },
        )
        .expect("design");
        let base = design.base_samples.expect("base");
        prop_assert!(base.is_power_of_two());
        prop_assert!(base <= requested && requested < 2 * base);
        prop_assert_eq!(design.len(), base * (2 * vars + 2));
    }
}
