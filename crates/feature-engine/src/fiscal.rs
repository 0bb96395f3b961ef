//! Fiscal premium features (spec §4.4.3).

use std::collections::BTreeMap;

use macro_core::{series, Panel, Series, Unit};

use crate::inputs;

fn combine(a: &Series, b: &Series, f: impl Fn(f64, f64) -> f64) -> Series {
    let mut out = BTreeMap::new();
    for (d, av) in a.iter() {
        if let Some(bv) = b.get(d) {
            out.insert(d, f(av, bv));
        }
    }
    Series::from_pairs("combined", Unit::Ratio, out.into_iter().collect())
}

pub struct FiscalOutput {
    pub fiscal_premium: Series,
    pub z_fiscal_premium: Series,
    pub z_pb_momentum: Series,
    pub z_debt_accel: Series,
}

pub fn compute(panel: &Panel) -> Option<FiscalOutput> {
    let di10y = panel.column(inputs::DI_10Y)?;
    let ust10y = panel.column(inputs::UST_10Y)?;
    let cds = panel.column(inputs::CDS_BPS)?;

    let spread = combine(di10y, ust10y, |a, b| a - b);
    let fiscal_premium = combine(&spread, cds, |s, c| s - c / 100.0);
    let z_fiscal_premium = series::zscore_rolling(&fiscal_premium, 60, 0.5);

    let pb_momentum = match panel.column(inputs::PRIMARY_BALANCE) {
        Some(pb) => series::diff_n(pb, 12),
        None => Series::new("pb_momentum", Unit::Ratio),
    };
    let z_pb_momentum = series::zscore_rolling(&pb_momentum, 60, 0.5);

    let debt_accel = match panel.column(inputs::DEBT_GDP) {
        Some(debt) => series::diff_n(debt, 12),
        None => Series::new("debt_accel", Unit::Ratio),
    };
    let z_debt_accel = series::zscore_rolling(&debt_accel, 60, 0.5);

    Some(FiscalOutput {
        fiscal_premium,
        z_fiscal_premium,
        z_pb_momentum,
        z_debt_accel,
    })
}
