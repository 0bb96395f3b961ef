//! Purged k-fold cross-validation and the 12-month hyperparameter refit
//! cadence (spec §4.8): `n_splits=5`, a `purge_gap=3`-observation buffer
//! between each train/test boundary so no feature row leaks information
//! across the boundary it wasn't yet entitled to, the best config per model
//! cached by OOS R².

use chrono::{Datelike, NaiveDate};

use crate::learners::{self, BoostedTreeConfig, FittedLearner};

pub const N_SPLITS: usize = 5;
pub const PURGE_GAP: usize = 3;
pub const REFIT_INTERVAL_MONTHS: i64 = 12;

/// Contiguous (train, test) index ranges with `PURGE_GAP` observations
/// dropped from the end of train and the start of test around each split
/// boundary.
pub fn purged_k_fold(n: usize, n_splits: usize, purge_gap: usize) -> Vec<(Vec<usize>, Vec<usize>)> {
    if n < n_splits * 2 {
        return Vec::new();
    }
    let fold_size = n / n_splits;
    let mut folds = Vec::with_capacity(n_splits);
    for k in 0..n_splits {
        let test_start = k * fold_size;
        let test_end = if k == n_splits - 1 { n } else { test_start + fold_size };
        let train: Vec<usize> = (0..n)
            .filter(|&i| {
                let before_gap = i + purge_gap < test_start;
                let after_gap = i >= test_end + purge_gap;
                before_gap || after_gap
            })
            .collect();
        let test: Vec<usize> = (test_start..test_end).collect();
        if train.len() < 10 || test.is_empty() {
            continue;
        }
        folds.push((train, test));
    }
    folds
}

fn r_squared(y: &[f64], pred: &[f64]) -> f64 {
    let mean = y.iter().sum::<f64>() / y.len() as f64;
    let ss_tot: f64 = y.iter().map(|v| (v - mean).powi(2)).sum();
    let ss_res: f64 = y.iter().zip(pred).map(|(v, p)| (v - p).powi(2)).sum();
    if ss_tot < 1e-12 {
        0.0
    } else {
        1.0 - ss_res / ss_tot
    }
}

fn cv_r2<F>(rows: &[Vec<f64>], y: &[f64], seed: u64, fit: F) -> f64
where
    F: Fn(&[Vec<f64>], &[f64], u64) -> Option<Box<dyn FittedLearner>>,
{
    let folds = purged_k_fold(rows.len(), N_SPLITS, PURGE_GAP);
    if folds.is_empty() {
        return f64::NEG_INFINITY;
    }
    let mut scores = Vec::with_capacity(folds.len());
    for (train_idx, test_idx) in &folds {
        let train_rows: Vec<Vec<f64>> = train_idx.iter().map(|&i| rows[i].clone()).collect();
        let train_y: Vec<f64> = train_idx.iter().map(|&i| y[i]).collect();
        let Some(model) = fit(&train_rows, &train_y, seed) else {
            continue;
        };
        let test_y: Vec<f64> = test_idx.iter().map(|&i| y[i]).collect();
        let pred: Vec<f64> = test_idx.iter().map(|&i| model.predict_one(&rows[i])).collect();
        scores.push(r_squared(&test_y, &pred));
    }
    if scores.is_empty() {
        f64::NEG_INFINITY
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    }
}

pub const RIDGE_LAMBDA_GRID: [f64; 5] = [1.0, 5.0, 10.0, 20.0, 50.0];

/// Best ridge λ by purged CV R² (spec §4.8).
pub fn select_ridge_lambda(rows: &[Vec<f64>], y: &[f64]) -> f64 {
    RIDGE_LAMBDA_GRID
        .iter()
        .copied()
        .max_by(|&a, &b| {
            let ra = cv_r2(rows, y, 0, |r, yy, _| learners::fit_ridge(r, yy, a).map(|m| Box::new(m) as Box<dyn FittedLearner>));
            let rb = cv_r2(rows, y, 0, |r, yy, _| learners::fit_ridge(r, yy, b).map(|m| Box::new(m) as Box<dyn FittedLearner>));
            ra.partial_cmp(&rb).unwrap()
        })
        .unwrap_or(10.0)
}

#[derive(Debug, Clone, Copy)]
pub struct RandomForestGridPoint {
    pub n_trees: usize,
    pub max_depth: usize,
}

pub const RF_GRID: [RandomForestGridPoint; 3] = [
    RandomForestGridPoint { n_trees: 50, max_depth: 4 },
    RandomForestGridPoint { n_trees: 100, max_depth: 5 },
    RandomForestGridPoint { n_trees: 150, max_depth: 6 },
];

pub fn select_random_forest_config(rows: &[Vec<f64>], y: &[f64], seed: u64) -> RandomForestGridPoint {
    RF_GRID
        .iter()
        .copied()
        .max_by(|a, b| {
            let ra = cv_r2(rows, y, seed, |r, yy, s| {
                learners::fit_random_forest(r, yy, a.n_trees, a.max_depth, s).map(|m| Box::new(m) as Box<dyn FittedLearner>)
            });
            let rb = cv_r2(rows, y, seed, |r, yy, s| {
                learners::fit_random_forest(r, yy, b.n_trees, b.max_depth, s).map(|m| Box::new(m) as Box<dyn FittedLearner>)
            });
            ra.partial_cmp(&rb).unwrap()
        })
        .unwrap_or(RF_GRID[1])
}

/// Small grid around the GBM/XGBoost defaults (spec §4.8: "a small grid per
/// model"), varying learning rate and tree count only.
pub fn select_boosted_tree_config(rows: &[Vec<f64>], y: &[f64], base: BoostedTreeConfig, seed: u64) -> BoostedTreeConfig {
    let candidates = [
        base,
        BoostedTreeConfig { learning_rate: base.learning_rate * 0.5, ..base },
        BoostedTreeConfig { n_estimators: (base.n_estimators as f64 * 1.5) as usize, ..base },
    ];
    candidates
        .into_iter()
        .max_by(|a, b| {
            let ra = cv_r2(rows, y, seed, |r, yy, s| learners::fit_boosted_tree(r, yy, *a, s).map(|m| Box::new(m) as Box<dyn FittedLearner>));
            let rb = cv_r2(rows, y, seed, |r, yy, s| learners::fit_boosted_tree(r, yy, *b, s).map(|m| Box::new(m) as Box<dyn FittedLearner>));
            ra.partial_cmp(&rb).unwrap()
        })
        .unwrap_or(base)
}

/// One instrument's cached best hyperparameters plus the date they were
/// last refreshed, owned by the production engine's hyperparameter cache
/// (spec §4.11).
#[derive(Debug, Clone)]
pub struct CachedHyperparams {
    pub ridge_lambda: f64,
    pub rf: RandomForestGridPoint,
    pub gbm: BoostedTreeConfig,
    pub xgboost: BoostedTreeConfig,
    pub refreshed_at: NaiveDate,
}

impl CachedHyperparams {
    pub fn is_due(&self, at: NaiveDate) -> bool {
        months_between(self.refreshed_at, at) >= REFIT_INTERVAL_MONTHS
    }
}

fn months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to.year() as i64 - from.year() as i64) * 12 + (to.month() as i64 - from.month() as i64)
}
