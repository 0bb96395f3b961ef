//! Boruta feature validation (spec §4.7 step 4) and the shadow-permutation
//! interaction-feature check (spec §4.7 step 2): compare each real feature's
//! importance against the maximum importance among permuted "shadow" copies
//! across many iterations, then classify confirmed/tentative/rejected by a
//! binomial test against p=0.5 at alpha=0.05 (the null: a feature is no
//! better than a shadow about half the time).

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use statrs::distribution::{Binomial, DiscreteCDF};

use crate::tree::forest_importance;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorutaVerdict {
    Confirmed,
    Tentative,
    Rejected,
}

pub struct BorutaResult {
    /// Per real feature, `(hits, verdict)` where `hits` counts the
    /// iterations where the real feature's importance exceeded the max
    /// shadow importance.
    pub hits: Vec<usize>,
    pub verdicts: Vec<BorutaVerdict>,
    pub iterations: usize,
}

/// Run the Boruta procedure over `rows`/`ys` with `n_iterations` rounds of
/// shadow shuffling, `n_trees` trees of `max_depth` per round. `seed` makes
/// the whole run deterministic for a given (instrument, decision date,
/// iteration count) per spec §5's determinism requirement.
pub fn run(
    rows: &[Vec<f64>],
    ys: &[f64],
    n_iterations: usize,
    n_trees: usize,
    max_depth: usize,
    seed: u64,
) -> BorutaResult {
    let p = rows.first().map(|r| r.len()).unwrap_or(0);
    let mut hits = vec![0usize; p];
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    for iter in 0..n_iterations {
        let mut augmented: Vec<Vec<f64>> = rows.to_vec();
        // Append one shuffled shadow copy per real feature.
        for f in 0..p {
            let mut shadow_col: Vec<f64> = rows.iter().map(|r| r[f]).collect();
            shadow_col.shuffle(&mut rng);
            for (i, row) in augmented.iter_mut().enumerate() {
                row.push(shadow_col[i]);
            }
        }
        let importances = forest_importance(&augmented, ys, n_trees, max_depth, seed.wrapping_add(iter as u64));
        if importances.len() < 2 * p {
            continue;
        }
        let max_shadow = importances[p..2 * p].iter().cloned().fold(0.0f64, f64::max);
        for f in 0..p {
            if importances[f] > max_shadow {
                hits[f] += 1;
            }
        }
    }

    let verdicts = classify(&hits, n_iterations);
    BorutaResult {
        hits,
        verdicts,
        iterations: n_iterations,
    }
}

/// Two-sided binomial test of each feature's hit count against p=0.5,
/// alpha=0.05: confirmed if significantly above chance, rejected if
/// significantly below, tentative otherwise.
fn classify(hits: &[usize], n_iterations: usize) -> Vec<BorutaVerdict> {
    if n_iterations == 0 {
        return vec![BorutaVerdict::Tentative; hits.len()];
    }
    let binom = Binomial::new(0.5, n_iterations as u64).expect("valid binomial params");
    hits.iter()
        .map(|&h| {
            // P(X >= h) for the upper tail, P(X <= h) for the lower tail.
            let upper_tail = 1.0 - binom.cdf(h.saturating_sub(1) as u64);
            let lower_tail = binom.cdf(h as u64);
            if upper_tail < 0.05 {
                BorutaVerdict::Confirmed
            } else if lower_tail < 0.05 {
                BorutaVerdict::Rejected
            } else {
                BorutaVerdict::Tentative
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn informative_feature_confirmed_noise_rejected_or_tentative() {
        let mut rows = Vec::new();
        let mut ys = Vec::new();
        let mut state = 5u64;
        let mut noise = || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            (state >> 11) as f64 / (1u64 << 53) as f64
        };
        for i in 0..150 {
            let x1 = (i as f64 * 0.07).sin();
            let x2 = noise();
            rows.push(vec![x1, x2]);
            ys.push(4.0 * x1 + 0.01 * noise());
        }
        let result = run(&rows, &ys, 20, 30, 5, 42);
        assert_eq!(result.verdicts[0], BorutaVerdict::Confirmed);
        assert_ne!(result.verdicts[1], BorutaVerdict::Confirmed);
    }
}
