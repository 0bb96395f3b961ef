//! FX fair-value stack (spec §4.4): PPP, Balassa-adjusted PPP, BEER, FEER,
//! cyclical fair value, and their log-mixture composite.

use std::collections::BTreeMap;

use macro_core::{series, Panel, Series, Unit};

use crate::inputs;
use crate::regression::rolling_ols_residual;

const BALASSA_BETA: f64 = 0.35;
const FEER_EPSILON: f64 = 0.7;
const FEER_CA_TARGET: f64 = -0.02;
const CYCLICAL_BETA: f64 = 0.05;
const BEER_WINDOW_MONTHS: usize = 60;
const VALUATION_HALF_LIFE_MONTHS: f64 = 36.0;

/// Default composite weights: BEER is the only non-diagnostic component by
/// default (spec §4.4); other fair values are still emitted individually.
pub struct CompositeWeights {
    pub ppp: f64,
    pub balassa: f64,
    pub beer: f64,
    pub feer: f64,
    pub cyclical: f64,
}

impl Default for CompositeWeights {
    fn default() -> Self {
        Self {
            ppp: 0.0,
            balassa: 0.0,
            beer: 1.0,
            feer: 0.0,
            cyclical: 0.0,
        }
    }
}

fn combine(a: &Series, b: &Series, f: impl Fn(f64, f64) -> f64) -> Series {
    let mut out = BTreeMap::new();
    for (d, av) in a.iter() {
        if let Some(bv) = b.get(d) {
            out.insert(d, f(av, bv));
        }
    }
    Series::from_pairs("combined", Unit::Fx, out.into_iter().collect())
}

fn fv_ppp(panel: &Panel) -> Option<Series> {
    panel.column(inputs::PPP_FACTOR).cloned()
}

fn fv_balassa(panel: &Panel) -> Option<Series> {
    let ppp = fv_ppp(panel)?;
    let us = panel.column(inputs::GDP_PC_US)?;
    let br = panel.column(inputs::GDP_PC_BR)?;
    let ratio = combine(us, br, |u, b| if b > 0.0 { (u / b).powf(BALASSA_BETA) } else { 1.0 });
    Some(combine(&ppp, &ratio, |p, r| p * r))
}

/// Rolling 60-month cointegration of `log(REER)` on ToT, 12m CA, `log(IBC)`,
/// and the real-rate differential z-score; the in-sample residual is the
/// misalignment, mapped back onto the spot through the REER identity.
fn fv_beer(panel: &Panel, spot: &Series) -> Option<Series> {
    let reer = panel.column(inputs::REER)?;
    let tot = panel.column(inputs::TOT)?;
    let ca_12m = panel.column(inputs::CA_12M)?;
    let ibc = panel.column(inputs::IBC)?;
    let real_diff_raw = panel.column(inputs::Z_REAL_DIFF_INPUT)?;
    let z_real_diff = series::zscore_rolling(real_diff_raw, 60, 0.5);

    let log_reer = series::log_transform(reer);
    let log_ibc = series::log_transform(ibc);

    let residual = rolling_ols_residual(&log_reer, &[tot, ca_12m, &log_ibc, &z_real_diff], BEER_WINDOW_MONTHS);
    // Negative residual: REER overvalued relative to fundamentals -> fair
    // spot is weaker than observed (BRL should be worth fewer USD, i.e. spot
    // fair value rises) -> fv_beer = spot * exp(residual).
    Some(combine(spot, &residual, |s, r| s * r.exp()))
}

fn fv_feer(panel: &Panel, spot: &Series) -> Option<Series> {
    let ca = panel.column(inputs::CA_PCT_GDP)?;
    let openness = panel.column(inputs::TRADE_OPENNESS)?;
    let adj = combine(ca, openness, |ca_v, open_v| {
        if open_v.abs() > f64::EPSILON {
            (FEER_CA_TARGET - ca_v) / (FEER_EPSILON * open_v)
        } else {
            0.0
        }
    });
    Some(combine(spot, &adj, |s, a| s * (1.0 + a)))
}

fn fv_cyclical(panel: &Panel, spot: &Series) -> Option<Series> {
    let real_diff_raw = panel.column(inputs::Z_REAL_DIFF_INPUT)?;
    let z = series::zscore_rolling(real_diff_raw, 60, 0.5);
    Some(combine(spot, &z, |s, zv| s * (-CYCLICAL_BETA * zv).exp()))
}

/// Output of the valuation stack: the individual fair values (diagnostics),
/// the renormalised log-mixture composite, and the half-life mean-reversion
/// signal derived from it.
pub struct ValuationOutput {
    pub fv_ppp: Option<Series>,
    pub fv_balassa: Option<Series>,
    pub fv_beer: Option<Series>,
    pub fv_feer: Option<Series>,
    pub fv_cyclical: Option<Series>,
    pub fv_composite: Series,
    pub mu_fx_val: Series,
}

pub fn compute(panel: &Panel, weights: &CompositeWeights) -> Option<ValuationOutput> {
    let spot = panel.column(inputs::SPOT_USDBRL)?;

    let fv_ppp = fv_ppp(panel);
    let fv_balassa = fv_balassa(panel);
    let fv_beer = fv_beer(panel, spot);
    let fv_feer = fv_feer(panel, spot);
    let fv_cyclical = fv_cyclical(panel, spot);

    let components: Vec<(f64, &Option<Series>)> = vec![
        (weights.ppp, &fv_ppp),
        (weights.balassa, &fv_balassa),
        (weights.beer, &fv_beer),
        (weights.feer, &fv_feer),
        (weights.cyclical, &fv_cyclical),
    ];

    let dates = spot.dates();
    let mut composite = BTreeMap::new();
    for d in dates {
        let mut weighted_log_sum = 0.0;
        let mut weight_sum = 0.0;
        for (w, maybe_series) in &components {
            if *w <= 0.0 {
                continue;
            }
            if let Some(s) = maybe_series {
                if let Some(v) = s.get(d) {
                    if v > 0.0 {
                        weighted_log_sum += w * v.ln();
                        weight_sum += w;
                    }
                }
            }
        }
        if weight_sum > 0.0 {
            composite.insert(d, (weighted_log_sum / weight_sum).exp());
        }
    }
    let fv_composite = Series::from_pairs("fx_fair_value", Unit::Fx, composite.into_iter().collect());

    let mut mu = BTreeMap::new();
    let ln2_over_hl = std::f64::consts::LN_2 / VALUATION_HALF_LIFE_MONTHS;
    for d in fv_composite.dates() {
        if let (Some(fv), Some(s)) = (fv_composite.get(d), spot.get(d)) {
            if fv > 0.0 && s > 0.0 {
                mu.insert(d, ln2_over_hl * (fv / s).ln());
            }
        }
    }
    let mu_fx_val = Series::from_pairs("mu_fx_val", Unit::Ratio, mu.into_iter().collect());

    Some(ValuationOutput {
        fv_ppp,
        fv_balassa,
        fv_beer,
        fv_feer,
        fv_cyclical,
        fv_composite,
        mu_fx_val,
    })
}
