//! Term-structure features (spec §4.4.2).

use std::collections::BTreeMap;

use macro_core::types::MonthKey;
use macro_core::{Panel, Series, Unit};

use crate::inputs;

fn combine(a: &Series, b: &Series, f: impl Fn(f64, f64) -> f64) -> Series {
    let mut out = BTreeMap::new();
    for (d, av) in a.iter() {
        if let Some(bv) = b.get(d) {
            out.insert(d, f(av, bv));
        }
    }
    Series::from_pairs("combined", Unit::PctAnnual, out.into_iter().collect())
}

pub struct TermStructureOutput {
    pub slope: Series,
    pub term_premium_5y: Series,
    pub us_irp: Series,
}

/// `expected_path = CDI + rolling-24m mean(DI_1Y - CDI)`.
fn expected_path(di1y: &Series, cdi: &Series) -> Series {
    let spread = combine(di1y, cdi, |a, b| a - b);
    let dates: Vec<MonthKey> = spread.dates().collect();
    let vals: Vec<f64> = dates.iter().map(|&d| spread.get(d).unwrap()).collect();
    let mut rolling_mean = BTreeMap::new();
    for i in 0..dates.len() {
        let start = (i + 1).saturating_sub(24);
        let slice = &vals[start..=i];
        let mean = slice.iter().sum::<f64>() / slice.len() as f64;
        rolling_mean.insert(dates[i], mean);
    }
    let mean_series = Series::from_pairs("rolling_carry_mean", Unit::PctAnnual, rolling_mean.into_iter().collect());
    combine(cdi, &mean_series, |c, m| c + m)
}

pub fn compute(panel: &Panel) -> Option<TermStructureOutput> {
    let di10y = panel.column(inputs::DI_10Y)?;
    let di1y = panel.column(inputs::DI_1Y)?;
    let di5y = panel.column(inputs::DI_5Y)?;
    let cdi = panel.column(inputs::CDI)?;

    let slope = combine(di10y, di1y, |a, b| a - b);

    let path = expected_path(di1y, cdi);
    let term_premium_5y = combine(di5y, &path, |a, b| a - b);

    let us_irp = match (panel.column(inputs::US_BREAKEVEN_10Y), panel.column(inputs::US_CPI_EXPECTATIONS)) {
        (Some(be), Some(exp)) => combine(be, exp, |a, b| a - b),
        _ => Series::new("us_irp", Unit::PctAnnual),
    };

    Some(TermStructureOutput {
        slope,
        term_premium_5y,
        us_irp,
    })
}
