//! Ensemble combination (spec §4.8): per-model weights proportional to a
//! rolling, exponentially-decayed OOS correlation between prediction and
//! realisation, falling back to uniform 0.25 each when no model has
//! accumulated enough history.

use std::collections::HashMap;

pub const HALFLIFE_MONTHS: f64 = 24.0;
pub const OOS_WINDOW: usize = 36;
pub const MIN_OOS_POINTS: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    Ridge,
    Gbm,
    RandomForest,
    XgBoost,
}

impl ModelKind {
    pub const ALL: [ModelKind; 4] = [ModelKind::Ridge, ModelKind::Gbm, ModelKind::RandomForest, ModelKind::XgBoost];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Ridge => "ridge",
            ModelKind::Gbm => "gbm",
            ModelKind::RandomForest => "random_forest",
            ModelKind::XgBoost => "xgboost",
        }
    }
}

/// One (prediction, realisation) OOS pair, most recent last.
#[derive(Debug, Clone, Copy)]
pub struct OosPair {
    pub predicted: f64,
    pub realised: f64,
}

/// Per-model rolling OOS history, capped at `OOS_WINDOW` pairs.
#[derive(Debug, Clone, Default)]
pub struct OosHistory {
    pub pairs: HashMap<ModelKind, Vec<OosPair>>,
}

impl OosHistory {
    pub fn push(&mut self, model: ModelKind, pair: OosPair) {
        let entry = self.pairs.entry(model).or_default();
        entry.push(pair);
        if entry.len() > OOS_WINDOW {
            let drop = entry.len() - OOS_WINDOW;
            entry.drain(0..drop);
        }
    }

    fn weighted_correlation(&self, model: ModelKind) -> Option<f64> {
        let pairs = self.pairs.get(&model)?;
        if pairs.len() < MIN_OOS_POINTS {
            return None;
        }
        let n = pairs.len();
        // Most recent pair (index n-1) gets the highest weight; exponential
        // decay walking backwards in time.
        let decay = 0.5f64.powf(1.0 / HALFLIFE_MONTHS);
        let weights: Vec<f64> = (0..n).map(|i| decay.powi((n - 1 - i) as i32)).collect();
        let w_sum: f64 = weights.iter().sum();

        let preds: Vec<f64> = pairs.iter().map(|p| p.predicted).collect();
        let reals: Vec<f64> = pairs.iter().map(|p| p.realised).collect();

        let wmean = |xs: &[f64]| xs.iter().zip(&weights).map(|(x, w)| x * w).sum::<f64>() / w_sum;
        let pred_mean = wmean(&preds);
        let real_mean = wmean(&reals);

        let mut cov = 0.0;
        let mut var_p = 0.0;
        let mut var_r = 0.0;
        for i in 0..n {
            let dp = preds[i] - pred_mean;
            let dr = reals[i] - real_mean;
            cov += weights[i] * dp * dr;
            var_p += weights[i] * dp * dp;
            var_r += weights[i] * dr * dr;
        }
        if var_p < 1e-12 || var_r < 1e-12 {
            return Some(0.0);
        }
        Some(cov / (var_p.sqrt() * var_r.sqrt()))
    }

    /// Per-model ensemble weights (spec §4.8): clamp each weighted
    /// correlation at zero from below, normalise to sum to 1; fall back to
    /// uniform 0.25 each if no model clears `MIN_OOS_POINTS`.
    pub fn weights(&self) -> HashMap<ModelKind, f64> {
        let scores: HashMap<ModelKind, Option<f64>> =
            ModelKind::ALL.iter().map(|&m| (m, self.weighted_correlation(m))).collect();

        if scores.values().all(|s| s.is_none()) {
            return ModelKind::ALL.iter().map(|&m| (m, 0.25)).collect();
        }

        let clamped: HashMap<ModelKind, f64> = scores
            .into_iter()
            .map(|(m, s)| (m, s.unwrap_or(0.0).max(0.0)))
            .collect();
        let total: f64 = clamped.values().sum();
        if total < 1e-12 {
            return ModelKind::ALL.iter().map(|&m| (m, 0.25)).collect();
        }
        clamped.into_iter().map(|(m, s)| (m, s / total)).collect()
    }
}

/// Combine per-model predictions with the given weights (spec §4.8:
/// `mu = Σ w_m · mu_m`).
pub fn combine(predictions: &HashMap<ModelKind, f64>, weights: &HashMap<ModelKind, f64>) -> f64 {
    ModelKind::ALL
        .iter()
        .map(|m| predictions.get(m).copied().unwrap_or(0.0) * weights.get(m).copied().unwrap_or(0.0))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_fallback_below_min_points() {
        let mut history = OosHistory::default();
        for i in 0..5 {
            history.push(ModelKind::Ridge, OosPair { predicted: i as f64, realised: i as f64 });
        }
        let weights = history.weights();
        for m in ModelKind::ALL {
            assert!((weights[&m] - 0.25).abs() < 1e-9);
        }
    }

    #[test]
    fn higher_correlation_model_gets_more_weight() {
        let mut history = OosHistory::default();
        for i in 0..20 {
            let real = (i as f64 * 0.3).sin();
            history.push(ModelKind::Ridge, OosPair { predicted: real, realised: real });
            history.push(ModelKind::Gbm, OosPair { predicted: -real, realised: real });
            history.push(ModelKind::RandomForest, OosPair { predicted: 0.0, realised: real });
            history.push(ModelKind::XgBoost, OosPair { predicted: 0.0, realised: real });
        }
        let weights = history.weights();
        assert!(weights[&ModelKind::Ridge] > weights[&ModelKind::RandomForest]);
    }

    #[test]
    fn weights_sum_to_one() {
        let mut history = OosHistory::default();
        for i in 0..20 {
            let real = (i as f64 * 0.2).cos();
            for m in ModelKind::ALL {
                history.push(m, OosPair { predicted: real * 0.5, realised: real });
            }
        }
        let weights = history.weights();
        let total: f64 = weights.values().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }
}
