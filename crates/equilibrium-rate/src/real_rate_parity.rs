//! Model 2: real-rate parity (spec §4.5).

use macro_core::types::MonthKey;
use macro_core::Panel;

use crate::inputs;

const STRUCTURAL_PREMIUM_COEF: f64 = 0.03;
const DEBT_THRESHOLD: f64 = 60.0;
const VIX_ADJUST_COEF: f64 = 0.001; // basis: 10bp of r* per 100 VIX points above 20
const TOT_ADJUST_COEF: f64 = -0.002;

pub fn estimate(panel: &Panel, at: MonthKey) -> Option<f64> {
    let r_star_us = panel
        .column(inputs::US_TIPS_5Y)
        .and_then(|s| s.value_as_of(at))
        .or_else(|| panel.column(inputs::US_TIPS_10Y).and_then(|s| s.value_as_of(at)))?;

    let cds = panel.column(inputs::CDS_BPS).and_then(|s| s.value_as_of(at));
    let embi = panel.column(inputs::EMBI).and_then(|s| s.value_as_of(at));
    let country_risk = match (cds, embi) {
        (Some(c), Some(e)) => (c / 100.0).max(0.7 * e / 100.0),
        (Some(c), None) => c / 100.0,
        (None, Some(e)) => 0.7 * e / 100.0,
        (None, None) => return None,
    };

    let vix_adjust = panel
        .column(inputs::VIX)
        .and_then(|s| s.value_as_of(at))
        .map(|v| VIX_ADJUST_COEF * (v - 20.0).max(0.0))
        .unwrap_or(0.0);

    let structural_premium = panel
        .column(inputs::DEBT_GDP)
        .and_then(|s| s.value_as_of(at))
        .map(|debt| STRUCTURAL_PREMIUM_COEF * (debt - DEBT_THRESHOLD).max(0.0))
        .unwrap_or(0.0);

    let tot_adjust = panel
        .column(inputs::TOT)
        .and_then(|s| s.value_as_of(at))
        .map(|tot| TOT_ADJUST_COEF * tot)
        .unwrap_or(0.0);

    Some((r_star_us + country_risk + vix_adjust + structural_premium + tot_adjust).clamp(2.0, 10.0))
}
