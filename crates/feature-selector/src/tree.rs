//! A small variance-reduction regression forest used purely as an
//! importance oracle for Boruta (spec §4.7.4) and the RF leg of stability
//! scoring (spec §4.7.5). Boruta's shadow-permutation protocol needs tight
//! control over per-iteration, per-feature importances with a known random
//! seed — a generic black-box regressor doesn't expose that cleanly, so
//! this stays a small from-scratch CART-style ensemble rather than reaching
//! for a library tree (the library-backed learners live in `alpha-ensemble`,
//! which predicts rather than ranks).

use rand::Rng;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;

enum Tree {
    Leaf(f64),
    Split(Box<Tree>, Box<Tree>),
}

fn variance(ys: &[f64]) -> f64 {
    if ys.is_empty() {
        return 0.0;
    }
    let mean = ys.iter().sum::<f64>() / ys.len() as f64;
    ys.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / ys.len() as f64
}

/// Build one randomised regression tree, accumulating impurity-decrease
/// importance (weighted by node sample count) into `importances`.
fn build_tree(
    rows: &[&Vec<f64>],
    ys: &[f64],
    depth: usize,
    max_depth: usize,
    n_features_try: usize,
    rng: &mut ChaCha8Rng,
    importances: &mut [f64],
) -> Tree {
    if depth >= max_depth || rows.len() < 4 || variance(ys) < 1e-12 {
        return Tree::Leaf(ys.iter().sum::<f64>() / ys.len().max(1) as f64);
    }

    let p = rows[0].len();
    let mut candidate_features: Vec<usize> = (0..p).collect();
    // Fisher-Yates partial shuffle to pick n_features_try distinct indices.
    for i in 0..n_features_try.min(p) {
        let j = rng.gen_range(i..p);
        candidate_features.swap(i, j);
    }
    let candidates = &candidate_features[..n_features_try.min(p)];

    let parent_var = variance(ys);
    let mut best: Option<(usize, f64, f64)> = None; // (feature, threshold, decrease)

    for &f in candidates {
        let mut vals: Vec<f64> = rows.iter().map(|r| r[f]).collect();
        vals.sort_by(|a, b| a.partial_cmp(b).unwrap());
        vals.dedup();
        if vals.len() < 2 {
            continue;
        }
        // Try a handful of candidate split points rather than every unique
        // value, to keep this cheap across many Boruta iterations.
        let n_try = vals.len().min(8);
        for k in 1..=n_try {
            let idx = k * (vals.len() - 1) / (n_try + 1).max(1);
            let threshold = vals[idx];
            let left: Vec<f64> = rows
                .iter()
                .zip(ys)
                .filter(|(r, _)| r[f] <= threshold)
                .map(|(_, y)| *y)
                .collect();
            let right: Vec<f64> = rows
                .iter()
                .zip(ys)
                .filter(|(r, _)| r[f] > threshold)
                .map(|(_, y)| *y)
                .collect();
            if left.len() < 2 || right.len() < 2 {
                continue;
            }
            let weighted = (left.len() as f64 * variance(&left) + right.len() as f64 * variance(&right))
                / rows.len() as f64;
            let decrease = parent_var - weighted;
            if best.map(|(_, _, d)| decrease > d).unwrap_or(true) {
                best = Some((f, threshold, decrease));
            }
        }
    }

    let Some((feature, threshold, decrease)) = best else {
        return Tree::Leaf(ys.iter().sum::<f64>() / ys.len().max(1) as f64);
    };

    if decrease <= 0.0 {
        return Tree::Leaf(ys.iter().sum::<f64>() / ys.len().max(1) as f64);
    }

    importances[feature] += decrease * rows.len() as f64;

    let mut left_rows = Vec::new();
    let mut left_ys = Vec::new();
    let mut right_rows = Vec::new();
    let mut right_ys = Vec::new();
    for (r, y) in rows.iter().zip(ys) {
        if r[feature] <= threshold {
            left_rows.push(*r);
            left_ys.push(*y);
        } else {
            right_rows.push(*r);
            right_ys.push(*y);
        }
    }

    let left = build_tree(&left_rows, &left_ys, depth + 1, max_depth, n_features_try, rng, importances);
    let right = build_tree(&right_rows, &right_ys, depth + 1, max_depth, n_features_try, rng, importances);

    Tree::Split(Box::new(left), Box::new(right))
}

/// Fit `n_trees` randomised regression trees and return normalised
/// per-feature importance (sums to 1 unless every tree is a pure leaf, in
/// which case all-zero).
pub fn forest_importance(rows: &[Vec<f64>], ys: &[f64], n_trees: usize, max_depth: usize, seed: u64) -> Vec<f64> {
    let p = rows.first().map(|r| r.len()).unwrap_or(0);
    if p == 0 || rows.is_empty() {
        return Vec::new();
    }
    let n_features_try = ((p as f64).sqrt().ceil() as usize).max(1).min(p);
    let mut importances = vec![0.0; p];
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    for _ in 0..n_trees.max(1) {
        let n = rows.len();
        let boot_idx: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
        let boot_rows: Vec<&Vec<f64>> = boot_idx.iter().map(|&i| &rows[i]).collect();
        let boot_ys: Vec<f64> = boot_idx.iter().map(|&i| ys[i]).collect();
        let _ = build_tree(&boot_rows, &boot_ys, 0, max_depth, n_features_try, &mut rng, &mut importances);
    }

    let total: f64 = importances.iter().sum();
    if total > 0.0 {
        importances.iter().map(|v| v / total).collect()
    } else {
        importances
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn informative_feature_gets_more_importance_than_noise() {
        let mut rows = Vec::new();
        let mut ys = Vec::new();
        let mut state = 3u64;
        let mut noise = || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            (state >> 11) as f64 / (1u64 << 53) as f64
        };
        for i in 0..200 {
            let x1 = (i as f64 * 0.05).sin();
            let x2 = noise();
            rows.push(vec![x1, x2]);
            ys.push(3.0 * x1 + 0.01 * noise());
        }
        let imp = forest_importance(&rows, &ys, 30, 5, 7);
        assert!(imp[0] > imp[1]);
    }
}
