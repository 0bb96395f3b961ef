//! Ensemble Alpha Models (spec §4.8, §4.9): four learners per instrument
//! (Ridge/GBM/RandomForest/XGBoost), purged-CV hyperparameter refresh,
//! OOS-correlation-weighted ensemble combination, soft IC gating, SHAP
//! attribution snapshots, and the score-demeaning + regime-scaling stage
//! that turns per-instrument `mu_m` into the production `mu` vector.

pub mod demean;
pub mod ensemble;
pub mod hyperparam;
pub mod ic;
pub mod learners;
pub mod shap;

use std::collections::HashMap;

use chrono::NaiveDate;
use macro_core::types::{Instrument, RegimeProbabilities};
use macro_core::EngineConfig;

use ensemble::{ModelKind, OosHistory};
use hyperparam::CachedHyperparams;
use learners::{BoostedTreeConfig, FittedLearner};

/// One instrument's fitted ensemble at a given decision date: the four
/// component models plus whatever the ensemble combiner needs to score a
/// new feature row (spec §4.8's per-step `predict`/`ensemble_combine`).
pub struct InstrumentEnsemble {
    pub instrument: Instrument,
    pub ridge: learners::RidgeModel,
    pub gbm: learners::BoostedTreeModel,
    pub random_forest: learners::RandomForestModel,
    pub xgboost: learners::BoostedTreeModel,
}

/// Fit all four learners for one instrument over its training window
/// (spec §4.8: 36 months default/minimum, rolling or expanding per
/// `cfg.expanding_window`), using the cached hyperparameters if fresh or
/// refreshing them via purged k-fold CV if `hyperparams.is_due(date)`.
pub fn fit_instrument(
    instrument: Instrument,
    linear_rows: &[Vec<f64>],
    nonlinear_rows: &[Vec<f64>],
    y: &[f64],
    date: NaiveDate,
    hyperparams: &mut Option<CachedHyperparams>,
    seed: u64,
) -> Option<InstrumentEnsemble> {
    let due = hyperparams.as_ref().map(|h| h.is_due(date)).unwrap_or(true);
    if due {
        let ridge_lambda = hyperparam::select_ridge_lambda(linear_rows, y);
        let rf = hyperparam::select_random_forest_config(nonlinear_rows, y, seed);
        let gbm = hyperparam::select_boosted_tree_config(nonlinear_rows, y, BoostedTreeConfig::gbm_default(), seed);
        let xgboost = hyperparam::select_boosted_tree_config(nonlinear_rows, y, BoostedTreeConfig::xgboost_default(), seed.wrapping_add(1));
        *hyperparams = Some(CachedHyperparams {
            ridge_lambda,
            rf,
            gbm,
            xgboost,
            refreshed_at: date,
        });
    }
    let params = hyperparams.as_ref()?;

    let ridge = learners::fit_ridge(linear_rows, y, params.ridge_lambda)?;
    let random_forest = learners::fit_random_forest(nonlinear_rows, y, params.rf.n_trees, params.rf.max_depth, seed)?;
    let gbm = learners::fit_boosted_tree(nonlinear_rows, y, params.gbm, seed)?;
    let xgboost = learners::fit_boosted_tree(nonlinear_rows, y, params.xgboost, seed.wrapping_add(1))?;

    Some(InstrumentEnsemble {
        instrument,
        ridge,
        gbm,
        random_forest,
        xgboost,
    })
}

impl InstrumentEnsemble {
    /// Per-model predictions for one feature row pair (spec §4.8:
    /// `mu_m[inst] = predict(each of Ridge/GBM/RF/XGB)`). `linear_row` feeds
    /// Ridge, `nonlinear_row` feeds the three tree-based learners.
    pub fn predict_all(&self, linear_row: &[f64], nonlinear_row: &[f64]) -> HashMap<ModelKind, f64> {
        HashMap::from([
            (ModelKind::Ridge, self.ridge.predict_one(linear_row)),
            (ModelKind::Gbm, self.gbm.predict_one(nonlinear_row)),
            (ModelKind::RandomForest, self.random_forest.predict_one(nonlinear_row)),
            (ModelKind::XgBoost, self.xgboost.predict_one(nonlinear_row)),
        ])
    }

    fn model_for(&self, kind: ModelKind) -> &dyn FittedLearner {
        match kind {
            ModelKind::Ridge => &self.ridge,
            ModelKind::Gbm => &self.gbm,
            ModelKind::RandomForest => &self.random_forest,
            ModelKind::XgBoost => &self.xgboost,
        }
    }

    /// A lightweight SHAP snapshot against the already-fitted XGBoost
    /// learner (spec §4.8: cheap per-step history during backtest).
    pub fn shap_lightweight(&self, nonlinear_rows: &[Vec<f64>], feature_names: &[String], seed: u64) -> shap::ShapSnapshot {
        shap::snapshot(self.model_for(ModelKind::XgBoost), nonlinear_rows, feature_names, seed)
    }
}

/// `mu[inst] = ensemble_combine(mu_m[inst])` (spec §4.8) followed by IC
/// gating — the per-instrument half of the per-step flow, before score
/// demeaning and regime scaling (both of which need every instrument's
/// `mu` at once and so are applied by the caller across the whole vector,
/// see [`demean::apply_score_demeaning`] / [`demean::apply_regime_scaling`]).
pub fn ensemble_combine_and_gate(
    predictions: &HashMap<ModelKind, f64>,
    oos_history: &OosHistory,
    ic_series_predicted: &[f64],
    ic_series_realised: &[f64],
    cfg: &EngineConfig,
) -> (f64, HashMap<ModelKind, f64>) {
    let weights = oos_history.weights();
    let combined = ensemble::combine(predictions, &weights);

    let gated = match ic::information_coefficient(ic_series_predicted, ic_series_realised, cfg.ic_gating_min_obs) {
        Some(ic_value) => combined * ic::gate_scale(ic_value, cfg.ic_gating_threshold, cfg.ic_gating_floor),
        None => combined,
    };

    (gated, weights)
}

/// The full per-step flow across all six instruments (spec §4.8): score
/// demean then regime-scale the raw `mu` vector. The per-instrument
/// ensemble fit/predict/IC-gate happens upstream via
/// [`fit_instrument`]/[`ensemble_combine_and_gate`]; this is the
/// cross-instrument tail of the pipeline.
pub fn finalise_mu(
    mu: &HashMap<Instrument, f64>,
    score_buffer: &mut demean::ScoreBuffer,
    regime: &RegimeProbabilities,
    cfg: &EngineConfig,
) -> (HashMap<Instrument, f64>, f64, f64) {
    let raw_score: f64 = mu.values().sum();
    score_buffer.push(raw_score);
    let demeaned_score = score_buffer.demeaned(raw_score, cfg.std_floor);

    let scaled = demean::apply_score_demeaning(mu, raw_score, demeaned_score, cfg.score_demeaning_threshold);
    let regime_adjusted = demean::apply_regime_scaling(&scaled, regime);

    (regime_adjusted, raw_score, demeaned_score)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn md(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn synthetic(n: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
        let mut rows = Vec::new();
        let mut y = Vec::new();
        for i in 0..n {
            let a = (i as f64 * 0.1).sin();
            let b = (i as f64 * 0.05).cos();
            rows.push(vec![a, b]);
            y.push(0.6 * a - 0.2 * b);
        }
        (rows, y)
    }

    #[test]
    fn fit_instrument_produces_all_four_models() {
        let (rows, y) = synthetic(80);
        let mut cache = None;
        let fitted = fit_instrument(Instrument::Front, &rows, &rows, &y, md(2021, 1), &mut cache, 42);
        assert!(fitted.is_some());
        assert!(cache.is_some());
    }

    #[test]
    fn finalise_mu_preserves_instrument_keys() {
        let cfg = EngineConfig::default();
        let mu = HashMap::from([(Instrument::Fx, 0.1), (Instrument::Front, -0.2)]);
        let mut buffer = demean::ScoreBuffer::new(cfg.score_demeaning_window);
        let regime = RegimeProbabilities::uniform_fallback();
        let (out, _raw, _demeaned) = finalise_mu(&mu, &mut buffer, &regime, &cfg);
        assert_eq!(out.len(), mu.len());
        assert!(out.contains_key(&Instrument::Fx));
    }
}
