//! Summary statistics over an equity curve (spec §4.13): CAGR, annualised
//! vol, Sharpe, max drawdown, Calmar, monthly win rate, best/worst month.
//! Computed identically for the overlay, total, and benchmark curves.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquitySummary {
    pub cagr: f64,
    pub annual_vol: f64,
    pub sharpe: f64,
    pub max_drawdown: f64,
    pub calmar: f64,
    pub monthly_win_rate: f64,
    pub best_month: f64,
    pub worst_month: f64,
}

/// `returns` are monthly simple returns, chronological. `final_equity` is
/// `Π(1+r)` over the same window (passed in rather than recomputed so the
/// caller can reuse its own running equity curve after trimming, spec
/// §4.13's "trim the leading pure-CDI months and rebase").
pub fn summarise(returns: &[f64], final_equity: f64) -> EquitySummary {
    let n = returns.len();
    if n == 0 {
        return EquitySummary {
            cagr: 0.0,
            annual_vol: 0.0,
            sharpe: 0.0,
            max_drawdown: 0.0,
            calmar: 0.0,
            monthly_win_rate: 0.0,
            best_month: 0.0,
            worst_month: 0.0,
        };
    }

    let years = n as f64 / 12.0;
    let cagr = if final_equity > 0.0 && years > 0.0 {
        final_equity.powf(1.0 / years) - 1.0
    } else {
        -1.0
    };

    let mean = returns.iter().sum::<f64>() / n as f64;
    let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n as f64 - 1.0).max(1.0);
    let monthly_vol = var.sqrt();
    let annual_vol = monthly_vol * 12f64.sqrt();

    let sharpe = if annual_vol > 1e-12 { cagr / annual_vol } else { 0.0 };

    let mut equity = 1.0;
    let mut peak = 1.0;
    let mut max_dd = 0.0;
    for &r in returns {
        equity *= 1.0 + r;
        peak = peak.max(equity);
        let dd = equity / peak - 1.0;
        max_dd = max_dd.min(dd);
    }

    let calmar = if max_dd.abs() > 1e-12 { cagr / max_dd.abs() } else { 0.0 };

    let wins = returns.iter().filter(|&&r| r > 0.0).count();
    let monthly_win_rate = wins as f64 / n as f64;

    let best_month = returns.iter().cloned().fold(f64::MIN, f64::max);
    let worst_month = returns.iter().cloned().fold(f64::MAX, f64::min);

    EquitySummary {
        cagr,
        annual_vol,
        sharpe,
        max_drawdown: max_dd,
        calmar,
        monthly_win_rate,
        best_month,
        worst_month,
    }
}

/// Rolling trailing-12-month Sharpe at the current point in a monthly
/// return history, most recent last (spec §4.13 per-month record field).
pub fn rolling_12m_sharpe(returns: &[f64]) -> Option<f64> {
    if returns.len() < 12 {
        return None;
    }
    let window = &returns[returns.len() - 12..];
    let mean = window.iter().sum::<f64>() / 12.0;
    let var = window.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / 11.0;
    let std = var.sqrt();
    if std < 1e-12 {
        return Some(0.0);
    }
    Some(mean / std * 12f64.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_zero_returns_have_zero_cagr_and_vol() {
        let s = summarise(&vec![0.0; 24], 1.0);
        assert!((s.cagr).abs() < 1e-9);
        assert!((s.annual_vol).abs() < 1e-9);
    }

    #[test]
    fn steady_positive_returns_have_sharpe_above_zero() {
        let returns = vec![0.01; 36];
        let final_equity = returns.iter().fold(1.0, |acc, r| acc * (1.0 + r));
        let s = summarise(&returns, final_equity);
        assert!(s.sharpe > 0.0);
        assert!((s.max_drawdown).abs() < 1e-9);
    }

    #[test]
    fn drawdown_is_negative_and_bounded_by_worst_sequence() {
        let mut returns = vec![0.01; 12];
        returns.extend(vec![-0.05; 3]);
        let final_equity = returns.iter().fold(1.0, |acc, r| acc * (1.0 + r));
        let s = summarise(&returns, final_equity);
        assert!(s.max_drawdown < 0.0);
    }
}
