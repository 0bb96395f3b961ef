//! Elastic-Net selection (spec §4.7 step 3): coordinate descent over a grid
//! of `l1_ratio` and `alpha`, cross-validated, retaining non-zero
//! coefficients as the linear subset. Also emits the coefficient path used
//! by the "monotone sparse" invariant (spec §8.6).

use crate::dataset::Dataset;

const MAX_ITER: usize = 200;
const TOL: f64 = 1e-6;

/// Fit one elastic-net model at a fixed `(alpha, l1_ratio)` via coordinate
/// descent on standardised columns. `x` is `n x p` row-major, already
/// standardised by the caller; `y` is left in its natural units (the
/// intercept absorbs its mean).
pub fn fit(x: &[Vec<f64>], y: &[f64], alpha: f64, l1_ratio: f64) -> Vec<f64> {
    let n = x.len();
    let p = if n > 0 { x[0].len() } else { 0 };
    if n == 0 || p == 0 {
        return vec![0.0; p];
    }

    let y_mean = y.iter().sum::<f64>() / n as f64;
    let mut residual: Vec<f64> = y.iter().map(|v| v - y_mean).collect();
    let mut beta = vec![0.0; p];

    for _ in 0..MAX_ITER {
        let mut max_delta = 0.0f64;
        for j in 0..p {
            let old_beta_j = beta[j];
            // Add back feature j's current contribution to the residual.
            if old_beta_j != 0.0 {
                for i in 0..n {
                    residual[i] += x[i][j] * old_beta_j;
                }
            }
            let rho: f64 = (0..n).map(|i| x[i][j] * residual[i]).sum::<f64>() / n as f64;
            let l1 = alpha * l1_ratio;
            let l2 = alpha * (1.0 - l1_ratio);
            let new_beta_j = soft_threshold(rho, l1) / (1.0 + l2);
            for i in 0..n {
                residual[i] -= x[i][j] * new_beta_j;
            }
            max_delta = max_delta.max((new_beta_j - old_beta_j).abs());
            beta[j] = new_beta_j;
        }
        if max_delta < TOL {
            break;
        }
    }
    beta
}

fn soft_threshold(z: f64, gamma: f64) -> f64 {
    if z > gamma {
        z - gamma
    } else if z < -gamma {
        z + gamma
    } else {
        0.0
    }
}

fn alpha_grid(n_alphas: usize, x: &[Vec<f64>], y: &[f64]) -> Vec<f64> {
    let n = x.len().max(1);
    let p = if x.is_empty() { 0 } else { x[0].len() };
    let y_mean = crate::dataset::mean(y);
    let alpha_max = (0..p)
        .map(|j| {
            (0..n)
                .map(|i| x[i][j] * (y[i] - y_mean))
                .sum::<f64>()
                .abs()
                / n as f64
        })
        .fold(0.0f64, f64::max)
        .max(1e-4);
    let alpha_min = alpha_max * 1e-3;
    if n_alphas <= 1 {
        return vec![alpha_max];
    }
    (0..n_alphas)
        .map(|k| {
            let t = k as f64 / (n_alphas - 1) as f64;
            (alpha_max.ln() * (1.0 - t) + alpha_min.ln() * t).exp()
        })
        .collect()
}

fn k_fold_indices(n: usize, k: usize) -> Vec<(Vec<usize>, Vec<usize>)> {
    let k = k.max(2).min(n.max(2));
    let mut folds = vec![Vec::new(); k];
    for i in 0..n {
        folds[i % k].push(i);
    }
    (0..k)
        .map(|f| {
            let test = folds[f].clone();
            let train: Vec<usize> = (0..n).filter(|i| !test.contains(i)).collect();
            (train, test)
        })
        .collect()
}

fn r_squared(preds: &[f64], actual: &[f64]) -> f64 {
    let mean = crate::dataset::mean(actual);
    let ss_tot: f64 = actual.iter().map(|v| (v - mean).powi(2)).sum();
    let ss_res: f64 = preds.iter().zip(actual).map(|(p, a)| (a - p).powi(2)).sum();
    if ss_tot <= 0.0 {
        0.0
    } else {
        1.0 - ss_res / ss_tot
    }
}

fn predict(x: &[Vec<f64>], beta: &[f64], intercept: f64) -> Vec<f64> {
    x.iter()
        .map(|row| intercept + row.iter().zip(beta).map(|(v, b)| v * b).sum::<f64>())
        .collect()
}

/// Cross-validated elastic-net selection (spec §4.7.3): grid search over
/// `l1_ratios x` a 50-point (or `n_alphas`-point) alpha grid, 5-fold CV by
/// out-of-fold R². Returns the best `(alpha, l1_ratio, coefficients)` fit on
/// the full (standardised) dataset, plus the `feature_names` with non-zero
/// coefficients (the "linear set").
pub struct ElasticNetFit {
    pub alpha: f64,
    pub l1_ratio: f64,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    pub selected: Vec<String>,
    /// 100-point coefficient-path samples across the alpha grid at the
    /// best l1_ratio, `(alpha, coefficients)` sorted by descending alpha —
    /// the "monotone sparse" path (spec §8.6).
    pub coefficient_path: Vec<(f64, Vec<f64>)>,
}

pub fn select(dataset: &Dataset, l1_ratios: &[f64], n_alphas: usize) -> ElasticNetFit {
    let (std_ds, _stats) = dataset.standardised();
    let x = &std_ds.rows;
    let y = &std_ds.y;
    let y_mean = crate::dataset::mean(y);

    let mut best = (f64::MIN, 1.0, l1_ratios.first().copied().unwrap_or(0.5));
    let folds = k_fold_indices(x.len(), 5);

    for &l1_ratio in l1_ratios {
        let grid = alpha_grid(n_alphas, x, y);
        for &alpha in &grid {
            let mut oof_preds = vec![0.0; x.len()];
            for (train_idx, test_idx) in &folds {
                let train_x: Vec<Vec<f64>> = train_idx.iter().map(|&i| x[i].clone()).collect();
                let train_y: Vec<f64> = train_idx.iter().map(|&i| y[i]).collect();
                let beta = fit(&train_x, &train_y, alpha, l1_ratio);
                let intercept = crate::dataset::mean(&train_y);
                for &i in test_idx {
                    oof_preds[i] = intercept + x[i].iter().zip(&beta).map(|(v, b)| v * b).sum::<f64>();
                }
            }
            let score = r_squared(&oof_preds, y);
            if score > best.0 {
                best = (score, alpha, l1_ratio);
            }
        }
    }

    let (_, best_alpha, best_l1_ratio) = best;
    let beta = fit(x, y, best_alpha, best_l1_ratio);
    let selected: Vec<String> = dataset
        .feature_names
        .iter()
        .zip(&beta)
        .filter(|(_, b)| b.abs() > 1e-10)
        .map(|(name, _)| name.clone())
        .collect();

    let path_grid = alpha_grid(100.max(n_alphas), x, y);
    let mut coefficient_path: Vec<(f64, Vec<f64>)> = path_grid
        .iter()
        .map(|&a| (a, fit(x, y, a, best_l1_ratio)))
        .collect();
    coefficient_path.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap());

    let _ = predict(x, &beta, y_mean); // kept for symmetry with scoring above
    ElasticNetFit {
        alpha: best_alpha,
        l1_ratio: best_l1_ratio,
        coefficients: beta,
        intercept: y_mean,
        selected,
        coefficient_path,
    }
}

/// A cheap variant used inside bootstrap stability subsampling (spec §4.7.5:
/// "fast 20-alpha variant") — single `l1_ratio`, smaller grid, no CV (just
/// fit at the grid midpoint), since stability only needs the selected set,
/// not a tuned model.
pub fn fast_select(dataset: &Dataset, l1_ratio: f64) -> Vec<String> {
    let (std_ds, _) = dataset.standardised();
    let grid = alpha_grid(20, &std_ds.rows, &std_ds.y);
    let mid_alpha = grid[grid.len() / 2];
    let beta = fit(&std_ds.rows, &std_ds.y, mid_alpha, l1_ratio);
    dataset
        .feature_names
        .iter()
        .zip(&beta)
        .filter(|(_, b)| b.abs() > 1e-10)
        .map(|(name, _)| name.clone())
        .collect()
}
