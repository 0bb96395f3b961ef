//! Feature Engine (spec §4.4): turns the raw macro panel into the
//! standardised feature matrix consumed by the alpha ensemble.

pub mod fiscal;
pub mod inputs;
pub mod regression;
pub mod term_structure;
pub mod valuation;

use macro_core::{series, EngineConfig, Panel, Series};
use tracing::debug;

/// Raw series that get a plain rolling z-score feature with no further
/// transform, beyond the bespoke valuation/term-structure/fiscal blocks
/// below. `(raw_name, feature_name)`.
const DIRECT_ZSCORE_FEATURES: &[(&str, &str)] = &[
    (inputs::VIX, "z_vix"),
    (inputs::DXY, "z_dxy"),
    (inputs::CDS, "z_cds"),
    (inputs::EMBI, "z_embi"),
    (inputs::HY_OAS, "z_hy_oas"),
    (inputs::BCOM, "z_bcom"),
    (inputs::EWZ, "z_ewz"),
    (inputs::Z_REAL_DIFF_INPUT, "z_real_diff"),
];

/// Build the feature matrix from a raw input panel (spec §4.4). Every
/// feature is independently optional: a missing raw input just means that
/// feature's column is absent from the output, logged once here.
pub fn build(panel: &Panel, cfg: &EngineConfig) -> Panel {
    let mut out = Panel::new();

    for &(raw_name, feature_name) in DIRECT_ZSCORE_FEATURES {
        match panel.column(raw_name) {
            Some(s) => {
                let z = series::zscore_rolling(s, cfg.standardization_window_months, cfg.std_floor);
                out.insert(rename(&z, feature_name));
            }
            None => debug!(raw_name, feature_name, "raw input missing, feature skipped"),
        }
    }

    if let Some(valuation) = valuation::compute(panel, &valuation::CompositeWeights::default()) {
        out.insert(rename(&valuation.fv_composite, "fx_fair_value"));
        out.insert(rename(&valuation.mu_fx_val, "mu_fx_val"));
        if let Some(s) = &valuation.fv_ppp {
            out.insert(rename(s, "fv_ppp"));
        }
        if let Some(s) = &valuation.fv_balassa {
            out.insert(rename(s, "fv_balassa"));
        }
        if let Some(s) = &valuation.fv_beer {
            let z_beer = series::zscore_rolling(&misalignment(s, panel), 60, cfg.std_floor);
            out.insert(rename(&z_beer, "z_beer"));
        }
        if let Some(s) = &valuation.fv_feer {
            out.insert(rename(s, "fv_feer"));
        }
        if let Some(s) = &valuation.fv_cyclical {
            out.insert(rename(s, "fv_cyclical"));
        }
    } else {
        debug!("fx valuation stack skipped: missing spot or all fair-value components");
    }

    if let Some(ts) = term_structure::compute(panel) {
        out.insert(rename(&ts.slope, "term_premium_slope"));
        out.insert(rename(&ts.term_premium_5y, "term_premium_5y"));
        out.insert(rename(&ts.us_irp, "us_irp"));
    } else {
        debug!("term structure features skipped: missing DI curve inputs");
    }

    if let Some(fi) = fiscal::compute(panel) {
        out.insert(rename(&fi.fiscal_premium, "fiscal_premium"));
        out.insert(rename(&fi.z_fiscal_premium, "z_fiscal_premium"));
        out.insert(rename(&fi.z_pb_momentum, "z_pb_momentum"));
        out.insert(rename(&fi.z_debt_accel, "z_debt_accel"));
    } else {
        debug!("fiscal premium features skipped: missing DI10Y/UST10Y/CDS");
    }

    // Features forward-fill across publication lags; returns never do.
    out.forward_fill()
}

fn misalignment(fv_beer: &Series, panel: &Panel) -> Series {
    // fv_beer carries a spot-scaled fair value; express it back as a
    // proportional misalignment (log fv - log spot) for z-scoring.
    let spot = panel.column(inputs::SPOT_USDBRL);
    match spot {
        Some(spot) => {
            let mut out = macro_core::Series::new("beer_misalignment", macro_core::Unit::Ratio);
            for (d, fv) in fv_beer.iter() {
                if let Some(s) = spot.get(d) {
                    if fv > 0.0 && s > 0.0 {
                        out.insert(d, (fv / s).ln());
                    }
                }
            }
            out
        }
        None => fv_beer.clone(),
    }
}

fn rename(s: &Series, name: &str) -> Series {
    Series::from_pairs(name, s.unit(), s.iter().collect())
}
