//! The engine's mutable state (spec §4.12): four named caches plus the two
//! pieces of per-instrument model state (OOS history, regime model) that
//! must persist across steps for the pipeline to be anything other than a
//! pure function recomputing everything from scratch each month. The four
//! spec-named caches are `equilibrium`, `feature_subsets`, `score_buffer`
//! and `hyperparams`; `regime_model` and `oos_history` are additional state
//! this crate owns for the same reason feature_subsets and hyperparams are
//! cached — refitting an HMM or discarding OOS history every month would
//! make the "12-month cadence" and "36-point window" language in the spec
//! meaningless.

use std::collections::HashMap;

use alpha_ensemble::demean::ScoreBuffer;
use alpha_ensemble::ensemble::OosHistory;
use alpha_ensemble::hyperparam::CachedHyperparams;
use chrono::NaiveDate;
use feature_selector::FeatureSelectionResult;
use macro_core::types::{GlobalRegime, Instrument};
use macro_core::EquilibriumEstimate;
use regime_model::RegimeModel;

/// Cached feature-selection result for one instrument, refreshed subject
/// to a cooldown and an immediate regime-change trigger (spec §4.7 step 7,
/// §4.12 cache (b)).
pub struct FeatureSubsetEntry {
    pub result: FeatureSelectionResult,
    pub last_updated: NaiveDate,
    pub last_regime: GlobalRegime,
}

impl FeatureSubsetEntry {
    /// Whether this entry is stale enough (cooldown elapsed, or the
    /// dominant global regime has changed) to warrant a fresh selection run.
    pub fn is_due(&self, at: NaiveDate, current_regime: GlobalRegime, cooldown_months: usize) -> bool {
        let elapsed = months_between(self.last_updated, at);
        elapsed >= cooldown_months as i64 || !same_regime(self.last_regime, current_regime)
    }
}

fn same_regime(a: GlobalRegime, b: GlobalRegime) -> bool {
    matches!(
        (a, b),
        (GlobalRegime::Carry, GlobalRegime::Carry)
            | (GlobalRegime::RiskOff, GlobalRegime::RiskOff)
            | (GlobalRegime::Stress, GlobalRegime::Stress)
    )
}

fn months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    use chrono::Datelike;
    (to.year() as i64 - from.year() as i64) * 12 + (to.month() as i64 - from.month() as i64)
}

/// All mutable state the production engine owns across steps.
pub struct EngineCaches {
    pub equilibrium: Option<EquilibriumEstimate>,
    pub regime_model: Option<RegimeModel>,
    pub feature_subsets: HashMap<Instrument, FeatureSubsetEntry>,
    pub hyperparams: HashMap<Instrument, Option<CachedHyperparams>>,
    pub oos_history: HashMap<Instrument, OosHistory>,
    /// (predicted combined `mu`, realised return) pairs per instrument,
    /// capped at 36 — the IC computation's own input, kept separate from
    /// `oos_history`'s per-model pairs since IC gating measures the
    /// ensemble's combined signal, not any one learner's.
    pub ic_history: HashMap<Instrument, Vec<(f64, f64)>>,
    pub score_buffer: ScoreBuffer,
}

impl EngineCaches {
    pub fn new(score_demeaning_window: usize) -> Self {
        Self {
            equilibrium: None,
            regime_model: None,
            feature_subsets: HashMap::new(),
            hyperparams: Instrument::ALL.iter().map(|&i| (i, None)).collect(),
            oos_history: Instrument::ALL.iter().map(|&i| (i, OosHistory::default())).collect(),
            ic_history: Instrument::ALL.iter().map(|&i| (i, Vec::new())).collect(),
            score_buffer: ScoreBuffer::new(score_demeaning_window),
        }
    }

    /// Whether the regime HMMs are due for a refit, on the same
    /// `regime_refit_interval`-month cadence as the composite r* model
    /// (spec §4.6, §4.12).
    pub fn regime_refit_due(&self, at: NaiveDate, interval_months: usize) -> bool {
        match &self.regime_model {
            None => true,
            Some(model) => months_between(model.fitted_at, at) >= interval_months as i64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use feature_selector::dataset::Dataset;

    fn md(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn dummy_result(date: NaiveDate) -> FeatureSelectionResult {
        feature_selector::run(
            &Dataset {
                feature_names: vec!["a".into()],
                rows: vec![vec![1.0]; 20],
                y: vec![0.1; 20],
            },
            date,
            "front",
            &macro_core::EngineConfig::default(),
            None,
        )
    }

    #[test]
    fn cooldown_suppresses_reselection_within_window() {
        let entry = FeatureSubsetEntry {
            result: dummy_result(md(2020, 1)),
            last_updated: md(2020, 1),
            last_regime: GlobalRegime::Carry,
        };
        assert!(!entry.is_due(md(2020, 3), GlobalRegime::Carry, 6));
        assert!(entry.is_due(md(2020, 8), GlobalRegime::Carry, 6));
    }

    #[test]
    fn regime_change_forces_immediate_reselection() {
        let entry = FeatureSubsetEntry {
            result: dummy_result(md(2020, 1)),
            last_updated: md(2020, 1),
            last_regime: GlobalRegime::Carry,
        };
        assert!(entry.is_due(md(2020, 2), GlobalRegime::Stress, 6));
    }
}
