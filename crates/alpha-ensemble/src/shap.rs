//! SHAP-style attribution snapshots (spec §4.8): a lightweight version
//! produced every step during backtest (cheap, reuses the live models), a
//! full version produced every 6 months against a fresh XGBoost refit.
//!
//! `smartcore`'s `xgboost` module does not expose tree structure for exact
//! SHAP decomposition, so both variants use permutation importance (mean
//! absolute change in prediction when a feature column is shuffled across
//! the training window) as the attribution signal — the same mean_abs/
//! current/rank triple the spec asks for, without requiring an exact
//! Shapley decomposition.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use serde::{Deserialize, Serialize};

use crate::learners::FittedLearner;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureAttribution {
    pub feature: String,
    pub mean_abs: f64,
    pub current: f64,
    pub rank: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShapSnapshot {
    pub attributions: Vec<FeatureAttribution>,
}

/// Permutation importance against `model` over `rows`/`feature_names`. Used
/// both as the lightweight per-step snapshot (against whichever model the
/// caller already has fitted) and, every 6 months, against a fresh
/// XGBoost-on-the-same-window refit (spec §4.8).
pub fn snapshot(model: &dyn FittedLearner, rows: &[Vec<f64>], feature_names: &[String], seed: u64) -> ShapSnapshot {
    if rows.is_empty() {
        return ShapSnapshot { attributions: Vec::new() };
    }
    let baseline: Vec<f64> = rows.iter().map(|r| model.predict_one(r)).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let mut mean_abs = vec![0.0; feature_names.len()];
    let mut current = vec![0.0; feature_names.len()];
    for (j, name) in feature_names.iter().enumerate() {
        let _ = name;
        let mut perturbed_rows = rows.to_vec();
        let mut column: Vec<f64> = rows.iter().map(|r| r[j]).collect();
        column.shuffle(&mut rng);
        for (i, row) in perturbed_rows.iter_mut().enumerate() {
            row[j] = column[i];
        }
        let perturbed: Vec<f64> = perturbed_rows.iter().map(|r| model.predict_one(r)).collect();
        let deltas: Vec<f64> = baseline.iter().zip(&perturbed).map(|(b, p)| (b - p).abs()).collect();
        mean_abs[j] = deltas.iter().sum::<f64>() / deltas.len() as f64;
        current[j] = rows.last().map(|r| r[j]).unwrap_or(0.0);
    }

    let mut order: Vec<usize> = (0..feature_names.len()).collect();
    order.sort_by(|&a, &b| mean_abs[b].partial_cmp(&mean_abs[a]).unwrap());

    let mut attributions = vec![
        FeatureAttribution {
            feature: String::new(),
            mean_abs: 0.0,
            current: 0.0,
            rank: 0,
        };
        feature_names.len()
    ];
    for (rank, &j) in order.iter().enumerate() {
        attributions[j] = FeatureAttribution {
            feature: feature_names[j].clone(),
            mean_abs: mean_abs[j],
            current: current[j],
            rank: rank + 1,
        };
    }

    ShapSnapshot { attributions }
}

impl ShapSnapshot {
    pub fn as_map(&self) -> HashMap<String, FeatureAttribution> {
        self.attributions.iter().map(|a| (a.feature.clone(), a.clone())).collect()
    }
}
