//! Instrument Return Synthesiser (spec §4.3): builds excess-over-CDI monthly
//! returns for the six tradeable instruments from the raw macro panel.

use std::collections::BTreeMap;

use macro_core::{series, types::MonthKey, Instrument, Panel, Series, Unit};
use tracing::warn;

/// Raw input series names this synthesiser looks for. Callers populate a
/// `Panel` with whatever subset is available; missing inputs degrade per the
/// fallback rules below rather than raising.
pub mod inputs {
    pub const SPOT_USDBRL: &str = "spot_usdbrl";
    pub const SWAP_DI_DOLAR_30D: &str = "swap_di_dolar_30d";
    pub const CUPOM_CAMBIAL: &str = "cupom_cambial";
    pub const DI_3M: &str = "di_3m";
    pub const UST_2Y: &str = "ust_2y";
    pub const DI_1Y: &str = "di_1y";
    pub const DI_2Y: &str = "di_2y";
    pub const DI_5Y: &str = "di_5y";
    pub const DI_10Y: &str = "di_10y";
    pub const CDI: &str = "cdi";
    pub const EMBI: &str = "embi";
    pub const NTNB_5Y_REAL_YIELD: &str = "ntnb_5y_real_yield";
}

const ROLLDOWN_FRACTION: f64 = 9.0 / 12.0;

fn col<'a>(panel: &'a Panel, name: &str) -> Option<&'a Series> {
    panel.column(name)
}

fn lookup(values: &BTreeMap<MonthKey, f64>, d: MonthKey) -> Option<f64> {
    values.get(&d).copied()
}

fn as_map(s: Option<&Series>) -> BTreeMap<MonthKey, f64> {
    s.map(|s| s.iter().collect()).unwrap_or_default()
}

/// Onshore USD carry proxy for the FX leg, following the waterfall in §4.3:
/// swap DI×Dólar, else cupom cambial, else `(DI_3M − UST_2Y)/12` as last resort.
fn carry_cost_series(panel: &Panel) -> (BTreeMap<MonthKey, f64>, &'static str) {
    if let Some(s) = col(panel, inputs::SWAP_DI_DOLAR_30D) {
        if !s.is_empty() {
            return (s.iter().collect(), inputs::SWAP_DI_DOLAR_30D);
        }
    }
    if let Some(s) = col(panel, inputs::CUPOM_CAMBIAL) {
        if !s.is_empty() {
            return (s.iter().collect(), inputs::CUPOM_CAMBIAL);
        }
    }
    let di3m = as_map(col(panel, inputs::DI_3M));
    let ust2y = as_map(col(panel, inputs::UST_2Y));
    let mut out = BTreeMap::new();
    for (&d, &a) in &di3m {
        if let Some(&b) = ust2y.get(&d) {
            out.insert(d, a - b);
        }
    }
    (out, "di_3m_minus_ust_2y_fallback")
}

fn fx_leg(panel: &Panel) -> Series {
    let spot = as_map(col(panel, inputs::SPOT_USDBRL));
    let (carry, source) = carry_cost_series(panel);
    if source != inputs::SWAP_DI_DOLAR_30D {
        warn!(source, "fx carry cost using fallback series");
    }

    let dates: Vec<MonthKey> = spot.keys().copied().collect();
    let mut out = Series::new("fx", Unit::Ratio);
    for w in dates.windows(2) {
        let (prev_d, t) = (w[0], w[1]);
        let (Some(&s_prev), Some(&s_t)) = (spot.get(&prev_d), spot.get(&t)) else {
            continue;
        };
        if s_prev <= 0.0 || s_t <= 0.0 {
            continue;
        }
        let Some(&carry_prev) = carry.get(&prev_d) else {
            continue;
        };
        let r = (s_t / s_prev).ln() - carry_prev / 100.0 / 12.0;
        out.insert(t, r);
    }
    out
}

/// Shared form for the three receiver legs (front/belly/long): `r = -Δy*D +
/// excess_carry_{t-1} + rolldown_{t-1}`.
fn receiver_leg(
    name: &str,
    yield_series: &BTreeMap<MonthKey, f64>,
    short_ref_series: &BTreeMap<MonthKey, f64>,
    cdi: &BTreeMap<MonthKey, f64>,
    duration: f64,
) -> Series {
    let dates: Vec<MonthKey> = yield_series.keys().copied().collect();
    let mut out = Series::new(name, Unit::Ratio);
    for w in dates.windows(2) {
        let (prev_d, t) = (w[0], w[1]);
        let (Some(&y_prev), Some(&y_t)) = (yield_series.get(&prev_d), yield_series.get(&t)) else {
            continue;
        };
        let Some(&cdi_prev) = lookup(cdi, prev_d) else {
            continue;
        };
        let Some(&short_prev) = lookup(short_ref_series, prev_d) else {
            continue;
        };
        let excess_carry = (y_prev - cdi_prev) / 100.0 / 12.0;
        let rolldown = (y_prev - short_prev) / 100.0 * ROLLDOWN_FRACTION / 12.0;
        let delta_y = (y_t - y_prev) / 100.0;
        let r = -delta_y * duration + excess_carry + rolldown;
        out.insert(t, r);
    }
    out
}

fn hard_leg(panel: &Panel) -> Series {
    let embi = as_map(col(panel, inputs::EMBI));
    let dates: Vec<MonthKey> = embi.keys().copied().collect();
    let mut out = Series::new("hard", Unit::Ratio);
    for w in dates.windows(2) {
        let (prev_d, t) = (w[0], w[1]);
        let (Some(&e_prev), Some(&e_t)) = (embi.get(&prev_d), embi.get(&t)) else {
            continue;
        };
        let r = -(e_t - e_prev) * 5.0 / 10_000.0 + e_prev / (10_000.0 * 12.0);
        out.insert(t, r);
    }
    out
}

fn ntnb_leg(panel: &Panel) -> Series {
    let y = as_map(col(panel, inputs::NTNB_5Y_REAL_YIELD));
    let dates: Vec<MonthKey> = y.keys().copied().collect();
    let mut out = Series::new("ntnb", Unit::Ratio);
    for w in dates.windows(2) {
        let (prev_d, t) = (w[0], w[1]);
        let (Some(&y_prev), Some(&y_t)) = (y.get(&prev_d), y.get(&t)) else {
            continue;
        };
        let r = -(y_t - y_prev) / 100.0 * 4.5 + y_prev / (100.0 * 12.0);
        out.insert(t, r);
    }
    out
}

/// Build the six winsorised excess-over-CDI return series from a raw macro
/// panel. Rows where any *core* instrument (fx/front/belly/long) lacks data
/// are dropped; `hard`/`ntnb` are zero-filled when missing instead, with the
/// substitution logged (spec §4.3).
pub fn synthesise(panel: &Panel) -> Panel {
    let cdi = as_map(col(panel, inputs::CDI));
    let di1y = as_map(col(panel, inputs::DI_1Y));
    let di2y = as_map(col(panel, inputs::DI_2Y));
    let di3m = as_map(col(panel, inputs::DI_3M));
    let di5y = as_map(col(panel, inputs::DI_5Y));
    let di10y = as_map(col(panel, inputs::DI_10Y));

    let fx = series::winsorise(&fx_leg(panel), 0.05, 0.95);
    let front = series::winsorise(&receiver_leg("front", &di1y, &di3m, &cdi, 1.0), 0.05, 0.95);
    let belly = series::winsorise(&receiver_leg("belly", &di5y, &di2y, &cdi, 4.5), 0.05, 0.95);
    let long = series::winsorise(&receiver_leg("long", &di10y, &di5y, &cdi, 7.5), 0.05, 0.95);

    let mut hard = series::winsorise(&hard_leg(panel), 0.05, 0.95);
    let mut ntnb = series::winsorise(&ntnb_leg(panel), 0.05, 0.95);

    let core_index: Vec<MonthKey> = {
        let mut idx: Vec<MonthKey> = fx
            .dates()
            .filter(|d| front.get(*d).is_some() && belly.get(*d).is_some() && long.get(*d).is_some())
            .collect();
        idx.sort();
        idx
    };

    for &d in &core_index {
        if hard.get(d).is_none() {
            warn!(date = %d, "hard return missing, zero-filled (flat position)");
            hard.insert(d, 0.0);
        }
        if ntnb.get(d).is_none() {
            warn!(date = %d, "ntnb return missing, zero-filled (flat position)");
            ntnb.insert(d, 0.0);
        }
    }

    let mut out = Panel::new();
    for s in [fx, front, belly, long] {
        let trimmed = restrict_to(&s, &core_index);
        out.insert(trimmed);
    }
    out.insert(restrict_to(&hard, &core_index));
    out.insert(restrict_to(&ntnb, &core_index));
    out
}

fn restrict_to(s: &Series, index: &[MonthKey]) -> Series {
    let mut out = Series::new(s.name(), s.unit());
    for &d in index {
        if let Some(v) = s.get(d) {
            out.insert(d, v);
        }
    }
    out
}

/// Column name for a given instrument in the panel built by `synthesise`.
pub fn column_name(instrument: Instrument) -> &'static str {
    instrument.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn md(y: i32, m: u32) -> MonthKey {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn raw_panel() -> Panel {
        let mut p = Panel::new();
        let mut spot = Series::new(inputs::SPOT_USDBRL, Unit::Fx);
        let mut swap = Series::new(inputs::SWAP_DI_DOLAR_30D, Unit::PctAnnual);
        let mut cdi = Series::new(inputs::CDI, Unit::PctAnnual);
        let mut di1y = Series::new(inputs::DI_1Y, Unit::PctAnnual);
        let mut di2y = Series::new(inputs::DI_2Y, Unit::PctAnnual);
        let mut di3m = Series::new(inputs::DI_3M, Unit::PctAnnual);
        let mut di5y = Series::new(inputs::DI_5Y, Unit::PctAnnual);
        let mut di10y = Series::new(inputs::DI_10Y, Unit::PctAnnual);
        let mut embi = Series::new(inputs::EMBI, Unit::Bps);
        let mut ntnb = Series::new(inputs::NTNB_5Y_REAL_YIELD, Unit::PctAnnual);

        for i in 0..36 {
            let d = md(2018 + i / 12, (i % 12) + 1);
            spot.insert(d, 4.0 + 0.01 * i as f64);
            swap.insert(d, 6.0);
            cdi.insert(d, 6.5);
            di1y.insert(d, 7.0);
            di2y.insert(d, 7.2);
            di3m.insert(d, 6.6);
            di5y.insert(d, 8.0);
            di10y.insert(d, 9.0);
            embi.insert(d, 250.0);
            ntnb.insert(d, 4.5);
        }
        for s in [spot, swap, cdi, di1y, di2y, di3m, di5y, di10y, embi, ntnb] {
            p.insert(s);
        }
        p
    }

    #[test]
    fn synthesise_produces_all_six_columns() {
        let out = synthesise(&raw_panel());
        for inst in Instrument::ALL {
            assert!(out.column(column_name(inst)).is_some(), "{inst} missing");
        }
    }

    #[test]
    fn core_columns_share_identical_index() {
        let out = synthesise(&raw_panel());
        let fx_idx: Vec<_> = out.column("fx").unwrap().dates().collect();
        let front_idx: Vec<_> = out.column("front").unwrap().dates().collect();
        assert_eq!(fx_idx, front_idx);
    }

    #[test]
    fn missing_hard_and_ntnb_zero_fill_rather_than_drop() {
        let mut raw = raw_panel();
        raw = {
            let mut p = Panel::new();
            for name in raw.column_names().filter(|n| *n != inputs::EMBI) {
                p.insert(raw.column(name).unwrap().clone());
            }
            p
        };
        let out = synthesise(&raw);
        let hard = out.column("hard").unwrap();
        assert!(hard.iter().all(|(_, v)| v == 0.0));
    }
}
