//! `RunResult` (spec §6): the single output object the core emits. The
//! serving layer (out of scope) reads this; nothing here prescribes how it
//! gets turned into JSON for an HTTP response beyond deriving `Serialize`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use alpha_ensemble::shap::ShapSnapshot;
use feature_selector::stability::{FeatureStability, InstabilityAlert};
use macro_core::types::{Instrument, MonthKey};
use macro_core::{AllocationDecision, EngineConfig, EquilibriumEstimate, RegimeProbabilities, RunRecord};

use crate::attribution::InstrumentAttribution;
use crate::summary::EquitySummary;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributionRow {
    pub instrument: Instrument,
    pub hit_rate: f64,
    pub total_pnl: f64,
    pub months: usize,
}

impl From<(Instrument, &InstrumentAttribution)> for AttributionRow {
    fn from((instrument, a): (Instrument, &InstrumentAttribution)) -> Self {
        Self {
            instrument,
            hit_rate: a.hit_rate,
            total_pnl: a.total_pnl,
            months: a.months,
        }
    }
}

/// Occupancy percentages for each regime state over the backtest window
/// (spec §4.13 summary statistics "regime occupancy percentages").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegimeOccupancy {
    pub pct_carry: f64,
    pub pct_riskoff: f64,
    pub pct_stress: f64,
    pub pct_domestic_calm: f64,
    pub pct_domestic_stress: f64,
}

pub fn occupancy(records: &[RegimeProbabilities]) -> RegimeOccupancy {
    if records.is_empty() {
        return RegimeOccupancy::default();
    }
    let n = records.len() as f64;
    RegimeOccupancy {
        pct_carry: records.iter().filter(|r| matches!(r.global_dominant(), macro_core::types::GlobalRegime::Carry)).count() as f64 / n,
        pct_riskoff: records.iter().filter(|r| matches!(r.global_dominant(), macro_core::types::GlobalRegime::RiskOff)).count() as f64 / n,
        pct_stress: records.iter().filter(|r| matches!(r.global_dominant(), macro_core::types::GlobalRegime::Stress)).count() as f64 / n,
        pct_domestic_calm: records
            .iter()
            .filter(|r| matches!(r.domestic_dominant(), macro_core::types::DomesticRegime::Calm))
            .count() as f64
            / n,
        pct_domestic_stress: records
            .iter()
            .filter(|r| matches!(r.domestic_dominant(), macro_core::types::DomesticRegime::Stress))
            .count() as f64
            / n,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreDemeaningStats {
    pub mean_raw: f64,
    pub std_raw: f64,
    pub pct_passthrough: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestSummary {
    pub overlay: EquitySummary,
    pub total: EquitySummary,
    pub benchmark: Option<EquitySummary>,
    pub ic_table: HashMap<Instrument, f64>,
    pub attribution: Vec<AttributionRow>,
    pub total_transaction_cost: f64,
    pub average_monthly_turnover: f64,
    pub ensemble_weight_distribution: HashMap<Instrument, HashMap<String, f64>>,
    pub regime_occupancy: RegimeOccupancy,
    pub score_demeaning: ScoreDemeaningStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestBlock {
    pub timeseries: Vec<RunRecord>,
    pub summary: BacktestSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressSummary {
    pub window: (MonthKey, MonthKey),
    pub summary: BacktestSummary,
    pub average_regime: RegimeOccupancy,
}

/// Per-instrument feature-selection report for the latest decision date
/// (spec §6 `feature_selection`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSelectionReport {
    pub linear_set: Vec<String>,
    pub nonlinear_set: Vec<String>,
    pub merged_set: Vec<String>,
    pub boruta_confirmed: Vec<String>,
    pub boruta_tentative: Vec<String>,
    pub boruta_rejected: Vec<String>,
    pub interaction_features_admitted: Vec<String>,
    pub stability: Vec<FeatureStability>,
    pub alerts: Vec<InstabilityAlert>,
}

/// Changes vs. the previous snapshot plus a rolling-window persistence
/// view (spec §6 `feature_selection_temporal`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSelectionTemporal {
    pub persistence: HashMap<Instrument, HashMap<String, f64>>,
    pub recent_alerts: HashMap<Instrument, Vec<InstabilityAlert>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentAllocation {
    pub allocation: AllocationDecision,
    pub equilibrium: EquilibriumEstimate,
    pub feature_levels: HashMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub config_snapshot: EngineConfig,
    pub backtest: BacktestBlock,
    pub stress_tests: HashMap<String, StressSummary>,
    pub current: Option<CurrentAllocation>,
    pub rstar_ts: Vec<EquilibriumEstimate>,
    pub shap_history: Vec<(MonthKey, HashMap<Instrument, ShapSnapshot>)>,
    pub feature_selection: HashMap<Instrument, FeatureSelectionReport>,
    pub feature_selection_temporal: FeatureSelectionTemporal,
    /// Degraded-mode notice (spec §9 "carried risk": the HMM's uniform-prior
    /// fallback on fit failure masks silent data corruption; the spec
    /// suggests surfacing it rather than only logging it).
    pub regime_fallback_months: Vec<MonthKey>,
}
