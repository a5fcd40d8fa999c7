//! End-to-end tests of the network pipeline over synthetic cohorts with
//! known block structure.

use approx::assert_abs_diff_eq;
use coexnet::prelude::*;
use ndarray::Array2;
use std::collections::{HashMap, HashSet};

fn blocked_cohort() -> SyntheticCohort {
    // 40 samples, 3 implanted blocks of 30 features plus 10 noise
    // features, within-block correlation around 0.9.
    generate(&SyntheticConfig::default()).unwrap()
}

fn run_network(
    cohort: &SyntheticCohort,
    power: f64,
    min_module_size: usize,
) -> (ExpressionMatrix, Array2<f64>, ModuleSet) {
    let filtered = filter_features(&cohort.expression, &FilterParams::default())
        .unwrap()
        .matrix;
    let adj = adjacency(&filtered, power, NetworkMode::Unsigned).unwrap();
    let tom = topological_overlap(&adj).unwrap();
    // A mid-height cut separates the implanted blocks from the loose
    // noise attachments; the default top-fraction cut is tuned for real
    // cohorts where module and background heights sit much closer.
    let params = ModuleParams {
        min_module_size,
        cut_height_fraction: 0.6,
        ..ModuleParams::default()
    };
    let modules = detect_modules(filtered.values(), &tom, &params).unwrap();
    (filtered, tom, modules)
}

#[test]
fn implanted_blocks_are_recovered() {
    let cohort = blocked_cohort();
    let (filtered, _, modules) = run_network(&cohort, 4.0, 20);

    // Exactly the 3 implanted blocks come back as non-trivial modules.
    assert_eq!(modules.n_modules(), 3);

    // Module labels must match the ground-truth blocks up to renaming:
    // for each true block, all its members that were assigned land in a
    // single detected module, and the three blocks land in three
    // different ones.
    let mut block_to_module: HashMap<usize, HashSet<usize>> = HashMap::new();
    for (feature, &label) in filtered.feature_ids().iter().zip(modules.labels.iter()) {
        let true_block = cohort
            .block_labels
            .iter()
            .zip(cohort.expression.feature_ids().iter())
            .find(|(_, id)| *id == feature)
            .map(|(&b, _)| b)
            .unwrap();
        if true_block != 0 && label != UNASSIGNED {
            block_to_module.entry(true_block).or_default().insert(label);
        }
    }
    assert_eq!(block_to_module.len(), 3);
    let mut seen_modules = HashSet::new();
    for (_, detected) in &block_to_module {
        assert_eq!(detected.len(), 1, "a true block split across modules");
        seen_modules.extend(detected.iter().copied());
    }
    assert_eq!(seen_modules.len(), 3, "two true blocks merged");

    // Noise features go predominantly to the unassigned pool.
    let noise_unassigned = filtered
        .feature_ids()
        .iter()
        .zip(modules.labels.iter())
        .filter(|(id, &label)| id.starts_with("NOISE") && label == UNASSIGNED)
        .count();
    let noise_total = filtered
        .feature_ids()
        .iter()
        .filter(|id| id.starts_with("NOISE"))
        .count();
    assert!(
        noise_unassigned * 2 > noise_total,
        "only {}/{} noise features unassigned",
        noise_unassigned,
        noise_total
    );
}

#[test]
fn module_labels_partition_the_variables() {
    let cohort = blocked_cohort();
    let (filtered, _, modules) = run_network(&cohort, 4.0, 20);

    // One label per retained variable.
    assert_eq!(modules.labels.len(), filtered.n_features());
    // Every non-zero label appears in module_labels, and vice versa.
    let assigned: HashSet<usize> = modules
        .labels
        .iter()
        .copied()
        .filter(|&l| l != UNASSIGNED)
        .collect();
    let declared: HashSet<usize> = modules.module_labels.iter().copied().collect();
    assert_eq!(assigned, declared);
    // Labels are 1..=m.
    assert_eq!(
        modules.module_labels,
        (1..=modules.n_modules()).collect::<Vec<_>>()
    );
}

#[test]
fn adjacency_and_tom_invariants_hold() {
    let cohort = blocked_cohort();
    let filtered = filter_features(&cohort.expression, &FilterParams::default())
        .unwrap()
        .matrix;

    for mode in [NetworkMode::Unsigned, NetworkMode::Signed] {
        let adj = adjacency(&filtered, 4.0, mode).unwrap();
        let tom = topological_overlap(&adj).unwrap();
        let p = adj.nrows();
        for i in 0..p {
            assert_eq!(tom[[i, i]], 1.0);
            for j in 0..p {
                assert!((0.0..=1.0).contains(&adj[[i, j]]), "adjacency out of range");
                assert!((0.0..=1.0).contains(&tom[[i, j]]), "TOM out of range");
                assert_abs_diff_eq!(adj[[i, j]], adj[[j, i]], epsilon = 1e-10);
                assert_abs_diff_eq!(tom[[i, j]], tom[[j, i]], epsilon = 1e-10);
            }
        }
    }
}

#[test]
fn raising_the_power_never_raises_mean_adjacency() {
    let cohort = blocked_cohort();
    let filtered = filter_features(&cohort.expression, &FilterParams::default())
        .unwrap()
        .matrix;

    let mut previous_mean = f64::INFINITY;
    for power in [1.0, 2.0, 4.0, 8.0, 16.0] {
        let adj = adjacency(&filtered, power, NetworkMode::Unsigned).unwrap();
        let p = adj.nrows() as f64;
        let mean = adj.sum() / (p * (p - 1.0));
        assert!(
            mean <= previous_mean + 1e-12,
            "mean adjacency rose from {} to {} at power {}",
            previous_mean,
            mean,
            power
        );
        previous_mean = mean;
    }
}

#[test]
fn pipeline_is_deterministic_across_reruns() {
    let cohort = blocked_cohort();
    let (_, _, first) = run_network(&cohort, 4.0, 20);
    let (_, _, second) = run_network(&cohort, 4.0, 20);

    assert_eq!(first.labels, second.labels);
    assert_eq!(first.module_labels, second.module_labels);
    for (a, b) in first.eigengenes.iter().zip(second.eigengenes.iter()) {
        assert_abs_diff_eq!(a, b, epsilon = 1e-12);
    }
}

#[test]
fn associations_find_the_status_linked_module() {
    let cohort = blocked_cohort();
    let (filtered, _, modules) = run_network(&cohort, 4.0, 20);
    let traits = cohort.traits.aligned_to(&filtered).unwrap();

    let table =
        module_trait_associations(&modules.eigengenes, &modules.module_labels, &traits).unwrap();

    // The binary status trait derives from block 1's latent factor, so
    // exactly one module should associate strongly with it.
    let status_col = table
        .trait_names
        .iter()
        .position(|t| t == "status")
        .unwrap();
    let strong: Vec<usize> = (0..table.module_labels.len())
        .filter(|&m| table.correlations[[m, status_col]].abs() > 0.6)
        .collect();
    assert_eq!(strong.len(), 1, "expected exactly one status-linked module");
    assert!(table.p_values[[strong[0], status_col]] < 1e-3);
}

#[test]
fn membership_ranks_the_linked_module_features_highest() {
    let cohort = blocked_cohort();
    let (filtered, _, modules) = run_network(&cohort, 4.0, 20);
    let traits = cohort.traits.aligned_to(&filtered).unwrap();

    let table = score_membership(&filtered, &modules, &traits, "status").unwrap();

    // Features assigned to a module correlate more with their own
    // eigengene than with the other modules' eigengenes, on average.
    let mut own_total = 0.0;
    let mut other_total = 0.0;
    let mut own_count = 0usize;
    let mut other_count = 0usize;
    for (f, &label) in table.labels.iter().enumerate() {
        if label == UNASSIGNED {
            continue;
        }
        for (m, &module) in table.module_labels.iter().enumerate() {
            if module == label {
                own_total += table.membership[[f, m]].abs();
                own_count += 1;
            } else {
                other_total += table.membership[[f, m]].abs();
                other_count += 1;
            }
        }
    }
    assert!(own_total / own_count as f64 > 0.7);
    assert!(own_total / own_count as f64 > 2.0 * (other_total / other_count as f64));
}

#[test]
fn merge_terminates_and_collapses_duplicated_structure() {
    // Two implanted blocks driven by the same seed-level factor would be
    // pathological; instead check termination on the standard cohort by
    // forcing an aggressive merge threshold.
    let cohort = blocked_cohort();
    let filtered = filter_features(&cohort.expression, &FilterParams::default())
        .unwrap()
        .matrix;
    let adj = adjacency(&filtered, 4.0, NetworkMode::Unsigned).unwrap();
    let tom = topological_overlap(&adj).unwrap();
    let params = ModuleParams {
        min_module_size: 20,
        merge_cut_height: 0.99,
        ..ModuleParams::default()
    };
    // merge threshold 0.01: nearly everything correlated merges; the
    // loop must still terminate and leave a valid partition.
    let modules = detect_modules(filtered.values(), &tom, &params).unwrap();
    assert!(modules.n_modules() >= 1);
    assert_eq!(modules.labels.len(), filtered.n_features());
}

#[test]
fn constant_binary_trait_is_rejected() {
    let cohort = blocked_cohort();
    let (filtered, _, modules) = run_network(&cohort, 4.0, 20);

    let n = filtered.n_samples();
    let traits = TraitMatrix::new(
        filtered.sample_ids().to_vec(),
        vec!["all_cases".to_string()],
        Array2::from_elem((n, 1), 1.0),
    )
    .unwrap();
    match module_trait_associations(&modules.eigengenes, &modules.module_labels, &traits) {
        Err(CoexError::ConstantTrait { name }) => assert_eq!(name, "all_cases"),
        other => panic!("expected ConstantTrait, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn all_constant_matrix_is_rejected_by_the_filter() {
    let values = Array2::from_elem((5, 10), 3.25);
    let expression = ExpressionMatrix::new(
        (0..5).map(|i| format!("s{}", i)).collect(),
        (0..10).map(|i| format!("f{}", i)).collect(),
        values,
    )
    .unwrap();
    assert!(matches!(
        filter_features(&expression, &FilterParams::default()),
        Err(CoexError::EmptyFeatureSet)
    ));
}

#[test]
fn pure_noise_yields_no_modules() {
    let cohort = generate(&SyntheticConfig {
        n_samples: 30,
        block_sizes: vec![],
        n_noise: 60,
        block_correlation: 0.0,
        seed: 7,
    })
    .unwrap();
    let filtered = filter_features(&cohort.expression, &FilterParams::default())
        .unwrap()
        .matrix;
    let adj = adjacency(&filtered, 6.0, NetworkMode::Unsigned).unwrap();
    let tom = topological_overlap(&adj).unwrap();
    let params = ModuleParams {
        min_module_size: 30,
        // A low cut forces every branch below the minimum size.
        cut_height_fraction: 0.05,
        ..ModuleParams::default()
    };
    assert!(matches!(
        detect_modules(filtered.values(), &tom, &params),
        Err(CoexError::NoModulesFound)
    ));
}

#[test]
fn univariate_screen_flags_the_status_block() {
    let cohort = blocked_cohort();
    let traits = cohort.traits.aligned_to(&cohort.expression).unwrap();
    let table = two_group_screen(&cohort.expression, &traits, "status").unwrap();

    assert_eq!(table.rows.len(), cohort.expression.n_features());
    // Block-1 features track the factor behind the status split, so they
    // should dominate the significant tail.
    let significant_block1 = table
        .rows
        .iter()
        .filter(|r| r.feature_id.starts_with("B1") && r.q_value < 0.05)
        .count();
    let significant_noise = table
        .rows
        .iter()
        .filter(|r| r.feature_id.starts_with("NOISE") && r.q_value < 0.05)
        .count();
    assert!(
        significant_block1 > 20,
        "only {} block-1 features significant",
        significant_block1
    );
    assert!(significant_noise <= 2);
}

#[test]
fn power_selection_returns_a_diagnostic_row_per_candidate() {
    let cohort = blocked_cohort();
    let filtered = filter_features(&cohort.expression, &FilterParams::default())
        .unwrap()
        .matrix;
    let correlations = coexnet::correlation::column_correlation_matrix(
        filtered.values(),
        filtered.feature_ids(),
    )
    .unwrap();

    let criteria = TopologyCriteria::default();
    let powers = default_candidate_powers();
    let fits = evaluate_powers(&correlations, &powers, NetworkMode::Unsigned, &criteria);
    assert_eq!(fits.len(), powers.len());
    for fit in &fits {
        assert!(fit.fit_index.is_finite());
        assert!(fit.mean_connectivity >= 0.0);
        assert!(fit.max_connectivity >= fit.median_connectivity);
    }
    // Mean connectivity decays monotonically with the power.
    for pair in fits.windows(2) {
        assert!(pair[1].mean_connectivity <= pair[0].mean_connectivity + 1e-9);
    }
}
