//! Per-instrument attribution: realised P&L hit rate and marginal
//! contribution to risk (spec §3 `RunRecord.marginal_contribution`, §4
//! of SPEC_FULL.md — the `analyze_marginal_contribution.py` idea carried
//! over from `original_source/`).

use std::collections::HashMap;

use macro_core::types::Instrument;
use nalgebra::{DMatrix, DVector};

/// Percent-of-risk contribution per instrument: `w_i * (Sigma w)_i /
/// (w^T Sigma w)`, the standard Euler decomposition of portfolio variance.
/// Returns all-zero if the book's variance is ~0 (e.g. every weight flat).
pub fn marginal_contribution(weights: &HashMap<Instrument, f64>, covariance: &DMatrix<f64>) -> HashMap<Instrument, f64> {
    let order = Instrument::ALL;
    let p = order.len();
    if covariance.nrows() != p || covariance.ncols() != p {
        return order.iter().map(|&i| (i, 0.0)).collect();
    }
    let w = DVector::from_iterator(p, order.iter().map(|i| weights.get(i).copied().unwrap_or(0.0)));
    let sigma_w = covariance * &w;
    let total_variance = (w.transpose() * &sigma_w)[(0, 0)];
    if total_variance.abs() < 1e-14 {
        return order.iter().map(|&i| (i, 0.0)).collect();
    }
    order
        .iter()
        .enumerate()
        .map(|(j, &inst)| (inst, w[j] * sigma_w[j] / total_variance))
        .collect()
}

/// Per-instrument hit rate (fraction of months with positive realised
/// P&L) and total attribution (sum of realised P&L) across a backtest.
pub struct InstrumentAttribution {
    pub hit_rate: f64,
    pub total_pnl: f64,
    pub months: usize,
}

pub fn per_instrument_attribution(pnl_history: &[HashMap<Instrument, f64>]) -> HashMap<Instrument, InstrumentAttribution> {
    let mut out = HashMap::new();
    for &inst in &Instrument::ALL {
        let series: Vec<f64> = pnl_history.iter().filter_map(|row| row.get(&inst).copied()).collect();
        if series.is_empty() {
            continue;
        }
        let wins = series.iter().filter(|&&p| p > 0.0).count();
        out.insert(
            inst,
            InstrumentAttribution {
                hit_rate: wins as f64 / series.len() as f64,
                total_pnl: series.iter().sum(),
                months: series.len(),
            },
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marginal_contributions_sum_to_total_variance_fraction() {
        let weights: HashMap<Instrument, f64> = Instrument::ALL.iter().map(|&i| (i, 0.1)).collect();
        let cov = DMatrix::<f64>::identity(6, 6) * 0.0004;
        let mc = marginal_contribution(&weights, &cov);
        let total: f64 = mc.values().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn zero_variance_book_returns_zero_contributions() {
        let weights: HashMap<Instrument, f64> = Instrument::ALL.iter().map(|&i| (i, 0.0)).collect();
        let cov = DMatrix::<f64>::zeros(6, 6);
        let mc = marginal_contribution(&weights, &cov);
        assert!(mc.values().all(|&v| v == 0.0));
    }
}
