//! The walk-forward loop itself (spec §4.13): build the raw panel once,
//! then step the production engine one calendar month at a time, feeding
//! back each month's realised return before the next step runs so nothing
//! downstream of `cutoff` is ever visible to the decision made *at*
//! `cutoff` (spec §4.2's look-ahead invariant, exercised here rather than
//! just asserted).

use std::collections::HashMap;
use std::path::Path;

use nalgebra::DMatrix;
use thiserror::Error;

use feature_selector::snapshot::SnapshotHistory;
use feature_selector::stability::{AlertSeverity, InstabilityAlert, StabilityClass};
use macro_core::types::{Instrument, MonthKey};
use macro_core::{DataSource, EngineConfig, EquilibriumEstimate, Panel, RegimeProbabilities, RunRecord};
use production_engine::ProductionEngine;

use crate::attribution;
use crate::persistence;
use crate::raw_panel;
use crate::run_result::{
    occupancy, AttributionRow, BacktestBlock, BacktestSummary, CurrentAllocation, FeatureSelectionReport,
    FeatureSelectionTemporal, RunResult, ScoreDemeaningStats, StressSummary,
};
use crate::stress;
use crate::summary;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("insufficient history: need more than {min_training_months} months of data, got {available}")]
    InsufficientHistory { min_training_months: usize, available: usize },
}

/// Drives the full backtest (spec §4.13) from `source`'s raw history and
/// writes the updated feature-selection snapshot history back to
/// `snapshot_path` on completion, under the same advisory lock a
/// concurrent run would take (spec §5, §6).
pub fn run(source: &dyn DataSource, cfg: &EngineConfig, snapshot_path: &Path) -> Result<RunResult, HarnessError> {
    let raw = raw_panel::build(source);
    let returns = instrument_returns::synthesise(&raw);
    let features = feature_engine::build(&raw, cfg);

    let dates = returns.index();
    if dates.len() <= cfg.min_training_months {
        return Err(HarnessError::InsufficientHistory {
            min_training_months: cfg.min_training_months,
            available: dates.len(),
        });
    }

    let mut snapshot_history = persistence::load(snapshot_path);
    let mut engine = ProductionEngine::new(cfg);

    let mut prev_weights: HashMap<Instrument, f64> = Instrument::ALL.iter().map(|&i| (i, 0.0)).collect();

    let mut overlay_equity = 1.0_f64;
    let mut overlay_peak = 1.0_f64;
    let mut total_equity = 1.0_f64;
    let mut total_peak = 1.0_f64;
    let benchmark_available = raw.column(raw_panel::IBOVESPA).is_some();
    let mut benchmark_equity = if benchmark_available { Some(1.0_f64) } else { None };

    let mut overlay_returns: Vec<f64> = Vec::new();
    let mut total_returns: Vec<f64> = Vec::new();
    let mut benchmark_returns: Vec<f64> = Vec::new();

    let mut records: Vec<RunRecord> = Vec::new();
    let mut rstar_ts: Vec<EquilibriumEstimate> = Vec::new();
    let mut shap_history: Vec<(MonthKey, HashMap<Instrument, alpha_ensemble::shap::ShapSnapshot>)> = Vec::new();
    let mut regime_fallback_months: Vec<MonthKey> = Vec::new();
    let mut last_classes: HashMap<Instrument, HashMap<String, StabilityClass>> = HashMap::new();
    let mut alert_history: Vec<(Instrument, InstabilityAlert)> = Vec::new();
    let mut last_covariance: Vec<f64> = Vec::new();

    let cdi_rate_monthly = |d: MonthKey| -> f64 {
        raw.column(instrument_returns::inputs::CDI)
            .and_then(|s| s.get(d))
            .map(|annual_pct| annual_pct / 100.0 / 12.0)
            .unwrap_or(0.0)
    };

    for i in cfg.min_training_months..dates.len() {
        let realise_date = dates[i];
        let cutoff = dates[i - 1];

        let raw_asof = raw.as_of(cutoff);
        let features_asof = features.as_of(cutoff);
        let returns_asof = returns.as_of(cutoff);

        let overlay_drawdown = overlay_equity / overlay_peak - 1.0;

        let out = engine.step(
            cutoff,
            &raw_asof,
            &features_asof,
            &returns_asof,
            &prev_weights,
            overlay_drawdown,
            &overlay_returns,
            &snapshot_history,
            cfg,
        );

        if out.regime.is_fallback {
            regime_fallback_months.push(cutoff);
        }

        for snap in &out.new_snapshots {
            if let Some(&inst) = Instrument::ALL.iter().find(|i| i.as_str() == snap.instrument) {
                if let Some(previous) = last_classes.get(&inst) {
                    alert_history.extend(
                        diff_classes(previous, &snap.classes)
                            .into_iter()
                            .map(|alert| (inst, alert)),
                    );
                }
                last_classes.insert(inst, snap.classes.clone());
            }
            snapshot_history.push(snap.clone());
        }

        let mut realised_pnl = HashMap::new();
        let mut overlay_return = 0.0;
        for &inst in &Instrument::ALL {
            let weight = out.weights.get(&inst).copied().unwrap_or(0.0);
            let realised = returns
                .column(instrument_returns::column_name(inst))
                .and_then(|s| s.get(realise_date))
                .unwrap_or(0.0);
            realised_pnl.insert(inst, weight * realised);
            overlay_return += weight * realised;

            if let Some(predictions) = out.model_predictions.get(&inst) {
                let combined_mu = out.mu.get(&inst).copied().unwrap_or(0.0);
                engine.record_realised(inst, predictions, combined_mu, realised);
            }
        }
        overlay_return -= out.transaction_cost;

        overlay_equity *= 1.0 + overlay_return;
        overlay_peak = overlay_peak.max(overlay_equity);
        overlay_returns.push(overlay_return);

        let total_return = cdi_rate_monthly(realise_date) + overlay_return;
        total_equity *= 1.0 + total_return;
        total_peak = total_peak.max(total_equity);
        total_returns.push(total_return);

        if benchmark_available {
            if let (Some(ibov), Some(be)) = (raw.column(raw_panel::IBOVESPA), benchmark_equity.as_mut()) {
                if let (Some(p0), Some(p1)) = (ibov.get(cutoff), ibov.get(realise_date)) {
                    if p0 > 0.0 {
                        let br = p1 / p0 - 1.0;
                        *be *= 1.0 + br;
                        benchmark_returns.push(br);
                    }
                }
            }
        }

        let covariance = DMatrix::from_vec(Instrument::ALL.len(), Instrument::ALL.len(), out.covariance.clone());
        let marginal_contribution = attribution::marginal_contribution(&out.weights, &covariance);

        records.push(RunRecord {
            date: realise_date,
            weights: out.weights.clone(),
            mu: out.mu.clone(),
            realised_pnl,
            overlay_equity,
            total_equity,
            benchmark_equity,
            overlay_drawdown: overlay_equity / overlay_peak - 1.0,
            total_drawdown: total_equity / total_peak - 1.0,
            regime: out.regime,
            raw_score: out.raw_score,
            demeaned_score: out.demeaned_score,
            ensemble_weights: out.ensemble_weights.clone(),
            turnover: out.turnover,
            transaction_cost: out.transaction_cost,
            rolling_12m_sharpe: summary::rolling_12m_sharpe(&overlay_returns),
            marginal_contribution,
        });

        rstar_ts.push(out.equilibrium.clone());

        let month_index = i - cfg.min_training_months;
        if month_index % 6 == 0 {
            shap_history.push((realise_date, out.shap_snapshots.clone()));
        }

        last_covariance = out.covariance.clone();
        prev_weights = out.weights;
    }

    if let Err(err) = persistence::save(snapshot_path, &snapshot_history) {
        tracing::warn!(%err, path = %snapshot_path.display(), "failed to persist feature-selection snapshot history");
    }

    // Trim the leading pure-CDI months (spec §4.13): before the overlay ever
    // took a position, "total" equity just tracked CDI, which would flatter
    // CAGR/Sharpe with a risk-free prefix that never belonged to the book.
    let first_active = overlay_returns.iter().position(|&r| r.abs() > 1e-8).unwrap_or(0);
    let trimmed_overlay = &overlay_returns[first_active..];
    let trimmed_total = &total_returns[first_active..];
    let trimmed_benchmark = if benchmark_returns.is_empty() {
        None
    } else {
        Some(&benchmark_returns[first_active.min(benchmark_returns.len())..])
    };
    let trimmed_records = &records[first_active.min(records.len())..];

    let pnl_history: Vec<HashMap<Instrument, f64>> = trimmed_records.iter().map(|r| r.realised_pnl.clone()).collect();
    let attribution_map = attribution::per_instrument_attribution(&pnl_history);
    let attribution_rows: Vec<AttributionRow> = Instrument::ALL
        .iter()
        .filter_map(|&inst| attribution_map.get(&inst).map(|a| AttributionRow::from((inst, a))))
        .collect();

    let ic_table: HashMap<Instrument, f64> = Instrument::ALL
        .iter()
        .filter_map(|&inst| {
            let pairs = engine.caches().ic_history.get(&inst)?;
            let predicted: Vec<f64> = pairs.iter().map(|(p, _)| *p).collect();
            let realised: Vec<f64> = pairs.iter().map(|(_, r)| *r).collect();
            alpha_ensemble::ic::information_coefficient(&predicted, &realised, cfg.ic_gating_min_obs).map(|ic| (inst, ic))
        })
        .collect();

    let ensemble_weight_distribution = average_ensemble_weights(trimmed_records);

    let raw_scores: Vec<f64> = trimmed_records.iter().map(|r| r.raw_score).collect();
    let score_demeaning = score_demeaning_stats(&raw_scores, cfg.score_demeaning_threshold);

    let regime_occupancy = occupancy(&trimmed_records.iter().map(|r| r.regime).collect::<Vec<_>>());

    let overall_summary = BacktestSummary {
        overlay: summary::summarise(trimmed_overlay, trimmed_overlay.iter().fold(1.0, |acc, r| acc * (1.0 + r))),
        total: summary::summarise(trimmed_total, trimmed_total.iter().fold(1.0, |acc, r| acc * (1.0 + r))),
        benchmark: trimmed_benchmark.map(|rs| summary::summarise(rs, rs.iter().fold(1.0, |acc, r| acc * (1.0 + r)))),
        ic_table: ic_table.clone(),
        attribution: attribution_rows,
        total_transaction_cost: trimmed_records.iter().map(|r| r.transaction_cost).sum(),
        average_monthly_turnover: mean(&trimmed_records.iter().map(|r| r.turnover).collect::<Vec<_>>()),
        ensemble_weight_distribution,
        regime_occupancy,
        score_demeaning,
    };

    let stress_tests = build_stress_summaries(trimmed_records);

    let feature_selection = build_feature_selection_report(&engine);
    let feature_selection_temporal = build_feature_selection_temporal(&snapshot_history, &alert_history);

    let current = build_current_allocation(&engine, &features, records.last(), &last_covariance);

    Ok(RunResult {
        config_snapshot: cfg.clone(),
        backtest: BacktestBlock {
            timeseries: trimmed_records.to_vec(),
            summary: overall_summary,
        },
        stress_tests,
        current,
        rstar_ts,
        shap_history,
        feature_selection,
        feature_selection_temporal,
        regime_fallback_months,
    })
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        0.0
    } else {
        xs.iter().sum::<f64>() / xs.len() as f64
    }
}

fn score_demeaning_stats(raw_scores: &[f64], threshold: f64) -> ScoreDemeaningStats {
    if raw_scores.is_empty() {
        return ScoreDemeaningStats {
            mean_raw: 0.0,
            std_raw: 0.0,
            pct_passthrough: 0.0,
        };
    }
    let mean_raw = mean(raw_scores);
    let variance = raw_scores.iter().map(|s| (s - mean_raw).powi(2)).sum::<f64>() / (raw_scores.len() as f64 - 1.0).max(1.0);
    let pct_passthrough = raw_scores.iter().filter(|&&s| s.abs() <= threshold).count() as f64 / raw_scores.len() as f64;
    ScoreDemeaningStats {
        mean_raw,
        std_raw: variance.sqrt(),
        pct_passthrough,
    }
}

fn average_ensemble_weights(records: &[RunRecord]) -> HashMap<Instrument, HashMap<String, f64>> {
    let mut sums: HashMap<Instrument, HashMap<String, f64>> = HashMap::new();
    let mut counts: HashMap<Instrument, usize> = HashMap::new();
    for record in records {
        for (&inst, weights) in &record.ensemble_weights {
            let entry = sums.entry(inst).or_default();
            for (model, &w) in weights {
                *entry.entry(model.clone()).or_insert(0.0) += w;
            }
            *counts.entry(inst).or_insert(0) += 1;
        }
    }
    sums.into_iter()
        .map(|(inst, totals)| {
            let n = counts.get(&inst).copied().unwrap_or(1).max(1) as f64;
            (inst, totals.into_iter().map(|(model, total)| (model, total / n)).collect())
        })
        .collect()
}

fn restrict_to_window(records: &[RunRecord], start: MonthKey, end: MonthKey) -> Vec<RunRecord> {
    records.iter().filter(|r| r.date >= start && r.date <= end).cloned().collect()
}

fn build_stress_summaries(records: &[RunRecord]) -> HashMap<String, StressSummary> {
    let mut out = HashMap::new();
    for window in stress::crisis_windows() {
        let windowed = restrict_to_window(records, window.start, window.end);
        if windowed.is_empty() {
            continue;
        }
        let overlay_returns: Vec<f64> = windowed
            .windows(2)
            .map(|pair| pair[1].overlay_equity / pair[0].overlay_equity - 1.0)
            .collect();
        let total_returns: Vec<f64> = windowed
            .windows(2)
            .map(|pair| pair[1].total_equity / pair[0].total_equity - 1.0)
            .collect();
        let benchmark_returns: Vec<f64> = windowed
            .windows(2)
            .filter_map(|pair| match (pair[0].benchmark_equity, pair[1].benchmark_equity) {
                (Some(a), Some(b)) if a > 0.0 => Some(b / a - 1.0),
                _ => None,
            })
            .collect();

        let pnl_history: Vec<HashMap<Instrument, f64>> = windowed.iter().map(|r| r.realised_pnl.clone()).collect();
        let attribution_map = attribution::per_instrument_attribution(&pnl_history);
        let attribution_rows: Vec<AttributionRow> = Instrument::ALL
            .iter()
            .filter_map(|&inst| attribution_map.get(&inst).map(|a| AttributionRow::from((inst, a))))
            .collect();

        let raw_scores: Vec<f64> = windowed.iter().map(|r| r.raw_score).collect();
        let regime_probs: Vec<RegimeProbabilities> = windowed.iter().map(|r| r.regime).collect();

        let summary_block = BacktestSummary {
            overlay: summary::summarise(&overlay_returns, overlay_returns.iter().fold(1.0, |a, r| a * (1.0 + r))),
            total: summary::summarise(&total_returns, total_returns.iter().fold(1.0, |a, r| a * (1.0 + r))),
            benchmark: if benchmark_returns.is_empty() {
                None
            } else {
                Some(summary::summarise(&benchmark_returns, benchmark_returns.iter().fold(1.0, |a, r| a * (1.0 + r))))
            },
            ic_table: HashMap::new(),
            attribution: attribution_rows,
            total_transaction_cost: windowed.iter().map(|r| r.transaction_cost).sum(),
            average_monthly_turnover: mean(&windowed.iter().map(|r| r.turnover).collect::<Vec<_>>()),
            ensemble_weight_distribution: average_ensemble_weights(&windowed),
            regime_occupancy: occupancy(&regime_probs),
            score_demeaning: score_demeaning_stats(&raw_scores, 0.005),
        };

        out.insert(
            window.name.to_string(),
            StressSummary {
                window: (window.start, window.end),
                average_regime: summary_block.regime_occupancy.clone(),
                summary: summary_block,
            },
        );
    }
    out
}

fn build_feature_selection_report(engine: &ProductionEngine) -> HashMap<Instrument, FeatureSelectionReport> {
    Instrument::ALL
        .iter()
        .filter_map(|&inst| {
            let entry = engine.caches().feature_subsets.get(&inst)?;
            let result = &entry.result;
            Some((
                inst,
                FeatureSelectionReport {
                    linear_set: result.linear_set.clone(),
                    nonlinear_set: result.nonlinear_set.clone(),
                    merged_set: result.merged_set.clone(),
                    boruta_confirmed: result.boruta_confirmed.clone(),
                    boruta_tentative: result.boruta_tentative.clone(),
                    boruta_rejected: result.boruta_rejected.clone(),
                    interaction_features_admitted: result.interaction_features_admitted.clone(),
                    stability: result.stability.clone(),
                    alerts: result.alerts.clone(),
                },
            ))
        })
        .collect()
}

fn build_feature_selection_temporal(
    snapshot_history: &SnapshotHistory,
    alert_history: &[(Instrument, InstabilityAlert)],
) -> FeatureSelectionTemporal {
    const PERSISTENCE_WINDOW: usize = 12;
    let persistence = Instrument::ALL
        .iter()
        .map(|&inst| (inst, snapshot_history.persistence(inst.as_str(), PERSISTENCE_WINDOW)))
        .collect();

    let mut recent_alerts: HashMap<Instrument, Vec<InstabilityAlert>> = HashMap::new();
    for (inst, alert) in alert_history.iter().rev().take(200) {
        recent_alerts.entry(*inst).or_default().push(alert.clone());
    }

    FeatureSelectionTemporal {
        persistence,
        recent_alerts,
    }
}

fn build_current_allocation(
    engine: &ProductionEngine,
    features: &Panel,
    last_record: Option<&RunRecord>,
    last_covariance: &[f64],
) -> Option<CurrentAllocation> {
    let last_record = last_record?;
    let equilibrium = engine.caches().equilibrium.clone()?;

    let mut feature_levels = HashMap::new();
    for name in features.column_names() {
        if let Some(v) = features.column(name).and_then(|s| s.get(last_record.date)) {
            feature_levels.insert(name.to_string(), v);
        }
    }

    let allocation = macro_core::AllocationDecision {
        date: last_record.date,
        weights: last_record.weights.clone(),
        mu: last_record.mu.clone(),
        regime: last_record.regime,
        covariance: last_covariance.to_vec(),
        transaction_cost: last_record.transaction_cost,
    };

    Some(CurrentAllocation {
        allocation,
        equilibrium,
        feature_levels,
    })
}

/// Re-implements the spec's instability-diff rule (`feature_selector::
/// stability::diff_alerts`) over the bare classification map carried in a
/// persisted `Snapshot`, since the snapshot doesn't retain the composite
/// stability scores `diff_alerts` itself expects.
fn diff_classes(previous: &HashMap<String, StabilityClass>, current: &HashMap<String, StabilityClass>) -> Vec<InstabilityAlert> {
    let mut alerts = Vec::new();
    for (feature, &current_class) in current {
        let Some(&previous_class) = previous.get(feature) else {
            continue;
        };
        if previous_class == current_class {
            continue;
        }
        let severity = match (previous_class, current_class) {
            (StabilityClass::Robust, StabilityClass::Unstable) | (StabilityClass::Unstable, StabilityClass::Robust) => {
                AlertSeverity::Critical
            }
            (StabilityClass::Robust, StabilityClass::Moderate)
            | (StabilityClass::Moderate, StabilityClass::Robust)
            | (StabilityClass::Moderate, StabilityClass::Unstable)
            | (StabilityClass::Unstable, StabilityClass::Moderate) => AlertSeverity::Warning,
            _ => AlertSeverity::Info,
        };
        alerts.push(InstabilityAlert {
            feature: feature.clone(),
            previous: previous_class,
            current: current_class,
            severity,
        });
    }
    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use macro_core::{InMemoryDataSource, Series, Unit};

    fn md(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn flat_source(months: usize) -> InMemoryDataSource {
        let mut state = 7u64;
        let mut noise = || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            ((state >> 11) as f64 / (1u64 << 53) as f64 - 0.5) * 0.2
        };

        let mut series_for = |name: &str, unit: Unit, base: f64, scale: f64| {
            let mut s = Series::new(name, unit);
            for i in 0..months {
                let d = md(2012 + (i as i32) / 12, (i as u32 % 12) + 1);
                s.insert(d, base + scale * noise());
            }
            s
        };

        InMemoryDataSource::new()
            .with_series(series_for(instrument_returns::inputs::CDI, Unit::PctAnnual, 12.0, 1.0))
            .with_series(series_for(instrument_returns::inputs::SPOT_USDBRL, Unit::Fx, 5.0, 0.05))
            .with_series(series_for(instrument_returns::inputs::DI_1Y, Unit::PctAnnual, 12.5, 0.5))
            .with_series(series_for(instrument_returns::inputs::DI_2Y, Unit::PctAnnual, 12.0, 0.5))
            .with_series(series_for(instrument_returns::inputs::DI_5Y, Unit::PctAnnual, 11.5, 0.5))
            .with_series(series_for(instrument_returns::inputs::DI_10Y, Unit::PctAnnual, 11.0, 0.5))
            .with_series(series_for(instrument_returns::inputs::DI_3M, Unit::PctAnnual, 12.2, 0.3))
            .with_series(series_for(instrument_returns::inputs::UST_2Y, Unit::PctAnnual, 4.0, 0.2))
            .with_series(series_for(instrument_returns::inputs::SWAP_DI_DOLAR_30D, Unit::PctAnnual, 5.0, 0.2))
            .with_series(series_for(instrument_returns::inputs::CUPOM_CAMBIAL, Unit::PctAnnual, 3.0, 0.2))
            .with_series(series_for(instrument_returns::inputs::EMBI, Unit::Bps, 250.0, 10.0))
            .with_series(series_for(instrument_returns::inputs::NTNB_5Y_REAL_YIELD, Unit::PctAnnual, 5.5, 0.2))
            .with_series(series_for(feature_engine::inputs::VIX, Unit::Index, 18.0, 2.0))
            .with_series(series_for(feature_engine::inputs::DXY, Unit::Index, 95.0, 1.0))
            .with_series(series_for(equilibrium_rate::inputs::IPCA_EXPECTATIONS, Unit::PctAnnual, 4.0, 0.2))
            .with_series(series_for(equilibrium_rate::inputs::US_TIPS_10Y, Unit::PctAnnual, 1.5, 0.2))
            .with_series(series_for(equilibrium_rate::inputs::DI_3Y, Unit::PctAnnual, 12.0, 0.5))
            .with_series(series_for(regime_model::global::UST_10Y, Unit::PctAnnual, 3.5, 0.2))
    }

    #[test]
    fn run_produces_a_result_over_a_flat_synthetic_world() {
        let cfg = EngineConfig::default();
        let source = flat_source(72);
        let dir = std::env::temp_dir().join(format!("macro-risk-harness-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let snapshot_path = dir.join("snapshot.json");

        let result = run(&source, &cfg, &snapshot_path).expect("backtest should complete");
        assert!(!result.backtest.timeseries.is_empty());
        for record in &result.backtest.timeseries {
            let sum = record.weights.len();
            assert_eq!(sum, Instrument::ALL.len());
        }
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn run_rejects_too_little_history() {
        let cfg = EngineConfig::default();
        let source = flat_source(10);
        let path = std::env::temp_dir().join("macro-risk-harness-short.json");
        let err = run(&source, &cfg, &path).unwrap_err();
        assert!(matches!(err, HarnessError::InsufficientHistory { .. }));
    }
}
