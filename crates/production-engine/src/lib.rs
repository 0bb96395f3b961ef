//! Production Engine (spec §4.8, §4.12): the single `step` operation —
//! equilibrium recompute, regime refresh, per-instrument feature selection
//! and ensemble fit/predict, cross-instrument score demeaning and regime
//! scaling, optimisation, and risk overlays — that live trading and the
//! backtest harness both drive identically (spec §5: deterministic given
//! its inputs and the engine's own cached state).

pub mod caches;
pub mod dataset;
pub mod engineered;
pub mod feature_map;

use std::collections::HashMap;

use macro_core::types::{GlobalRegime, Instrument, MonthKey};
use macro_core::{EngineConfig, EquilibriumEstimate, Panel, RegimeProbabilities};
use tracing::debug;

use alpha_ensemble::ensemble::ModelKind;
use alpha_ensemble::shap::ShapSnapshot;
use feature_selector::snapshot::{Snapshot, SnapshotHistory};

use caches::{EngineCaches, FeatureSubsetEntry};
use regime_model::RegimeModel;

/// Everything the production engine produced this step, beyond the
/// adjusted weights: the intermediate values the harness needs to build a
/// `RunRecord` and the diagnostics a careful operator would want logged.
pub struct StepOutput {
    pub weights: HashMap<Instrument, f64>,
    pub mu: HashMap<Instrument, f64>,
    pub regime: RegimeProbabilities,
    pub equilibrium: EquilibriumEstimate,
    pub ic_scores: HashMap<Instrument, f64>,
    pub ensemble_weights: HashMap<Instrument, HashMap<String, f64>>,
    pub model_predictions: HashMap<Instrument, HashMap<ModelKind, f64>>,
    pub raw_score: f64,
    pub demeaned_score: f64,
    pub transaction_cost: f64,
    pub turnover: f64,
    pub covariance: Vec<f64>,
    pub drawdown_scale: f64,
    pub vol_scale: f64,
    pub vol_forecast_annual: f64,
    pub circuit_breaker_fired: bool,
    pub feature_selection_reran: Vec<Instrument>,
    pub new_snapshots: Vec<Snapshot>,
    /// Permutation-importance SHAP snapshot per instrument (spec §4.8),
    /// computed every step against the already-fitted XGBoost learner. The
    /// harness decides which of these are worth persisting (spec §4.13:
    /// every 6 months) — this crate just makes them available.
    pub shap_snapshots: HashMap<Instrument, ShapSnapshot>,
}

/// The production engine (spec §4.12): owns the mutable cross-step state
/// (`EngineCaches`) and nothing else. Every other input to `step` — the raw
/// and feature panels, the overlay's own equity history, the config — is
/// supplied by the caller, so the engine holds no reference to any
/// particular `DataSource` and is equally at home driven by the backtest
/// harness or a live-trading wrapper.
pub struct ProductionEngine {
    caches: EngineCaches,
}

impl ProductionEngine {
    pub fn new(cfg: &EngineConfig) -> Self {
        Self {
            caches: EngineCaches::new(cfg.score_demeaning_window),
        }
    }

    pub fn caches(&self) -> &EngineCaches {
        &self.caches
    }

    /// Records the realised return for `instrument` once the harness learns
    /// it (spec §4.8: "store (predicted, realised) pairs in OOS history for
    /// IC computation and ensemble weighting"). Must be called exactly once
    /// per instrument per elapsed month, strictly after the `step` that
    /// produced `predictions`/`combined_mu` for that month.
    pub fn record_realised(&mut self, instrument: Instrument, predictions: &HashMap<ModelKind, f64>, combined_mu: f64, realised: f64) {
        let oos = self.caches.oos_history.entry(instrument).or_default();
        for (&model, &predicted) in predictions {
            oos.push(model, alpha_ensemble::ensemble::OosPair { predicted, realised });
        }

        let ic = self.caches.ic_history.entry(instrument).or_default();
        ic.push((combined_mu, realised));
        const IC_HISTORY_CAP: usize = 36;
        if ic.len() > IC_HISTORY_CAP {
            let drop = ic.len() - IC_HISTORY_CAP;
            ic.drain(0..drop);
        }
    }

    /// The full per-step flow (spec §4.8's pseudocode). `cutoff` is the
    /// information-availability boundary: everything this call consults is
    /// `<= cutoff`, and the resulting weights are the allocation decided
    /// *as of* `cutoff`, meant to earn the following month's return.
    /// `snapshot_history` is read-only here — the harness owns pushing
    /// `new_snapshots` into its persisted copy after the step returns.
    pub fn step(
        &mut self,
        cutoff: MonthKey,
        raw: &Panel,
        features: &Panel,
        returns: &Panel,
        prev_weights: &HashMap<Instrument, f64>,
        overlay_drawdown: f64,
        overlay_monthly_returns: &[f64],
        snapshot_history: &SnapshotHistory,
        cfg: &EngineConfig,
    ) -> StepOutput {
        if self.caches.regime_refit_due(cutoff, cfg.regime_refit_interval) {
            self.caches.regime_model = Some(RegimeModel::fit(raw, cutoff));
        }
        let regime_model = self
            .caches
            .regime_model
            .clone()
            .expect("regime_refit_due guarantees Some on or before this point");

        // Phase one (spec §4.5): a neutral-prior estimate computed before
        // this month's regime probabilities are known, purely so the
        // two-pass protocol is explicit at this boundary rather than
        // implicit inside the equilibrium crate.
        let initial = equilibrium_rate::initial_estimate(raw, cutoff);
        let regime = regime_model.probs_at(raw, cutoff);
        let output_gap = raw.column(equilibrium_rate::inputs::OUTPUT_GAP).and_then(|s| s.value_as_of(cutoff));
        let equilibrium = equilibrium_rate::recompute_with_regime(raw, cutoff, &regime, None, output_gap);
        if (equilibrium.r_star_composite - initial.r_star_composite).abs() > 1.0 {
            debug!(
                date = %cutoff,
                initial = initial.r_star_composite,
                recomputed = equilibrium.r_star_composite,
                "equilibrium composite shifted materially once this month's regime probabilities arrived",
            );
        }
        self.caches.equilibrium = Some(equilibrium.clone());

        let augmented_features = engineered::augment(features, raw, &regime_model, cutoff);

        let dominant = regime.global_dominant();
        let cooldown = cfg.feature_selection.regime_refit_cooldown_months;

        let mut mu = HashMap::new();
        let mut ensemble_weights = HashMap::new();
        let mut ic_scores = HashMap::new();
        let mut feature_selection_reran = Vec::new();
        let mut new_snapshots = Vec::new();
        let mut model_predictions = HashMap::new();
        let mut shap_snapshots = HashMap::new();

        for &inst in &Instrument::ALL {
            let Some(out) = self.step_instrument(inst, cutoff, &augmented_features, returns, dominant, cooldown, snapshot_history, cfg) else {
                continue;
            };
            mu.insert(inst, out.mu);
            ensemble_weights.insert(inst, out.ensemble_weights);
            model_predictions.insert(inst, out.model_predictions);
            if let Some(ic) = out.ic {
                ic_scores.insert(inst, ic);
            }
            if out.feature_selection_reran {
                feature_selection_reran.push(inst);
            }
            if let Some(snap) = out.new_snapshot {
                new_snapshots.push(snap);
            }
            if let Some(shap) = out.shap {
                shap_snapshots.insert(inst, shap);
            }
        }

        let (mu_final, raw_score, demeaned_score) = alpha_ensemble::finalise_mu(&mu, &mut self.caches.score_buffer, &regime, cfg);

        let monthly_returns = returns_matrix(returns, cutoff, cfg.cov_window_months);
        let optimise_inputs = portfolio_optimiser::OptimiseInputs {
            mu: &mu_final,
            ic_scores: &ic_scores,
            monthly_returns: &monthly_returns,
            prev_weights,
            regime: &regime,
            cfg,
        };
        let optimised = portfolio_optimiser::optimise(&optimise_inputs);

        let overlay = risk_overlays::apply(&optimised.weights, overlay_drawdown, overlay_monthly_returns, &regime, cfg);

        StepOutput {
            weights: overlay.weights,
            mu: mu_final,
            regime,
            equilibrium,
            ic_scores,
            ensemble_weights,
            model_predictions,
            raw_score,
            demeaned_score,
            transaction_cost: optimised.transaction_cost,
            turnover: optimised.turnover,
            covariance: optimised.covariance.iter().copied().collect(),
            drawdown_scale: overlay.drawdown_scale,
            vol_scale: overlay.vol_scale,
            vol_forecast_annual: overlay.vol_forecast_annual,
            circuit_breaker_fired: overlay.circuit_breaker_fired,
            feature_selection_reran,
            new_snapshots,
            shap_snapshots,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn step_instrument(
        &mut self,
        inst: Instrument,
        cutoff: MonthKey,
        features: &Panel,
        returns: &Panel,
        dominant: GlobalRegime,
        cooldown: usize,
        snapshot_history: &SnapshotHistory,
        cfg: &EngineConfig,
    ) -> Option<InstrumentStepOutput> {
        let inst_name = inst.as_str();

        let full_dataset = dataset::training_dataset(features, returns, inst, cutoff);
        if full_dataset.n() < cfg.min_training_months {
            return None;
        }
        let windowed = windowed_dataset(&full_dataset, cfg);

        let base_cols = feature_map::base_features(inst);
        let base_names: Vec<String> = base_cols
            .iter()
            .copied()
            .filter(|n| windowed.feature_names.iter().any(|f| f.as_str() == *n))
            .map(|n| n.to_string())
            .collect();
        if base_names.is_empty() {
            return None;
        }
        let (base_rows, base_y) = dataset::restrict_columns(&windowed, &base_names);
        let base_ds = feature_selector::Dataset {
            feature_names: base_names,
            rows: base_rows,
            y: base_y,
        };

        let due = self
            .caches
            .feature_subsets
            .get(&inst)
            .map(|e| e.is_due(cutoff, dominant, cooldown))
            .unwrap_or(true);

        let mut new_snapshot = None;
        if due {
            let previous = snapshot_history.previous_for(inst_name, cutoff).map(|s| s.classes.clone());
            let result = feature_selector::run(&base_ds, cutoff, inst_name, cfg, previous.as_ref());
            new_snapshot = Some(Snapshot {
                date: cutoff,
                instrument: inst_name.to_string(),
                classes: result.stability.iter().map(|f| (f.feature.clone(), f.class)).collect(),
            });
            self.caches.feature_subsets.insert(
                inst,
                FeatureSubsetEntry {
                    result,
                    last_updated: cutoff,
                    last_regime: dominant,
                },
            );
        }

        let entry = self.caches.feature_subsets.get(&inst)?;
        let linear_set = entry.result.linear_set.clone();
        let nonlinear_set = entry.result.nonlinear_set.clone();
        let merged_set = entry.result.merged_set.clone();

        if linear_set.is_empty() && nonlinear_set.is_empty() {
            return None;
        }
        let expanded = dataset::expand_with_interactions(&base_ds, &merged_set);
        let (linear_rows, y_l) = dataset::restrict_columns(&expanded, &linear_set);
        let (nonlinear_rows, _) = dataset::restrict_columns(&expanded, &nonlinear_set);

        let seed = step_seed(cutoff, inst_name);
        let hyperparams = self.caches.hyperparams.entry(inst).or_insert(None);
        let ensemble = alpha_ensemble::fit_instrument(inst, &linear_rows, &nonlinear_rows, &y_l, cutoff, hyperparams, seed)?;

        let (linear_row, nonlinear_row) = dataset::prediction_rows(features, cutoff, &linear_set, &nonlinear_set)?;
        let model_predictions = ensemble.predict_all(&linear_row, &nonlinear_row);

        let oos_history = self.caches.oos_history.get(&inst).cloned().unwrap_or_default();
        let ic_pairs = self.caches.ic_history.get(&inst).cloned().unwrap_or_default();
        let ic_predicted: Vec<f64> = ic_pairs.iter().map(|(p, _)| *p).collect();
        let ic_realised: Vec<f64> = ic_pairs.iter().map(|(_, r)| *r).collect();
        let ic = alpha_ensemble::ic::information_coefficient(&ic_predicted, &ic_realised, cfg.ic_gating_min_obs);
        let (combined, ensemble_weights) = alpha_ensemble::ensemble_combine_and_gate(&model_predictions, &oos_history, &ic_predicted, &ic_realised, cfg);
        let shap = Some(ensemble.shap_lightweight(&nonlinear_rows, &nonlinear_set, seed));

        Some(InstrumentStepOutput {
            mu: combined,
            ic,
            ensemble_weights: ensemble_weights.into_iter().map(|(k, v)| (k.as_str().to_string(), v)).collect(),
            model_predictions,
            feature_selection_reran: due,
            new_snapshot,
            shap,
        })
    }
}

struct InstrumentStepOutput {
    mu: f64,
    ic: Option<f64>,
    ensemble_weights: HashMap<String, f64>,
    model_predictions: HashMap<ModelKind, f64>,
    feature_selection_reran: bool,
    new_snapshot: Option<Snapshot>,
    shap: Option<ShapSnapshot>,
}

/// Rolling/expanding training window (spec §4.7: 36-month default/minimum).
/// `Dataset` rows carry no dates of their own — `training_dataset` already
/// built them in chronological order, so an expanding window keeps
/// everything and a rolling one keeps the trailing `training_window_months`
/// rows.
fn windowed_dataset(ds: &feature_selector::Dataset, cfg: &EngineConfig) -> feature_selector::Dataset {
    if cfg.expanding_window {
        return ds.clone();
    }
    let n = ds.n();
    let take = cfg.training_window_months.min(n);
    let start = n - take;
    feature_selector::Dataset {
        feature_names: ds.feature_names.clone(),
        rows: ds.rows[start..].to_vec(),
        y: ds.y[start..].to_vec(),
    }
}

/// Trailing `window_months` of per-instrument returns, most recent last,
/// for the optimiser's covariance estimate (spec §4.10). A date with a
/// missing instrument return contributes 0.0 for that column rather than
/// dropping the row — consistent with the book carrying a flat position in
/// an instrument whose return failed to load that month.
fn returns_matrix(returns: &Panel, cutoff: MonthKey, window_months: usize) -> Vec<Vec<f64>> {
    let windowed = returns.window(cutoff, window_months);
    windowed
        .index()
        .into_iter()
        .map(|d| {
            Instrument::ALL
                .iter()
                .map(|&inst| windowed.column(instrument_returns::column_name(inst)).and_then(|s| s.get(d)).unwrap_or(0.0))
                .collect()
        })
        .collect()
}

/// A step-dependent, instrument-dependent deterministic seed (spec §5),
/// the same construction `feature-selector` uses so every random call this
/// crate drives (forest bagging, boosted-tree subsampling) reproduces
/// byte-for-byte for a given `(date, instrument)`.
fn step_seed(date: MonthKey, instrument: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    date.hash(&mut hasher);
    instrument.hash(&mut hasher);
    hasher.finish()
}
