//! Domestic 2-state regime HMM (spec §4.6).

use macro_core::types::MonthKey;
use macro_core::{series, Panel};
use nalgebra::DVector;

use crate::hmm::GaussianHmm;

pub const N_STATES: usize = 2;

pub const CDS_BPS: &str = "cds_5y_bps";
pub const FX_RETURNS: &str = "fx";
pub const DEBT_GDP: &str = "debt_to_gdp";
pub const REER: &str = "reer";
pub const DI_10Y: &str = "di_10y";
pub const DI_1Y: &str = "di_1y";

const CDS_DIM: usize = 0;

pub struct DomesticObservations {
    pub dates: Vec<MonthKey>,
    pub vectors: Vec<DVector<f64>>,
}

pub fn build_observations(panel: &Panel, at: MonthKey) -> Option<DomesticObservations> {
    let cds = panel.column(CDS_BPS)?;
    let fx = panel.column(FX_RETURNS)?;
    let debt = panel.column(DEBT_GDP)?;
    let reer = panel.column(REER)?;
    let di10y = panel.column(DI_10Y)?;
    let di1y = panel.column(DI_1Y)?;

    let d_cds = series::diff(cds);
    let debt_accel = series::diff_n(debt, 12);
    let log_reer = series::log_transform(reer);
    let reer_gap = {
        let trend = series::hp_trend(&log_reer, 36.0);
        let mut out = macro_core::Series::new("reer_gap", macro_core::Unit::Ratio);
        for (d, v) in log_reer.iter() {
            if let Some(t) = trend.get(d) {
                out.insert(d, v - t);
            }
        }
        out
    };

    let fx_vol_window: Vec<(MonthKey, f64)> = fx.as_of(at);
    let fx_vol = rolling_vol(&fx_vol_window, 6);

    let dates = d_cds.as_of(at);
    let mut out_dates = Vec::new();
    let mut vectors = Vec::new();
    for (d, cds_v) in dates {
        let (Some(vol_v), Some(debt_v), Some(gap_v), Some(y10), Some(y1)) =
            (fx_vol.get(&d).copied(), debt_accel.get(d), reer_gap.get(d), di10y.get(d), di1y.get(d))
        else {
            continue;
        };
        out_dates.push(d);
        vectors.push(DVector::from_vec(vec![cds_v, vol_v, debt_v, gap_v, y10 - y1]));
    }
    if vectors.is_empty() {
        return None;
    }
    Some(DomesticObservations { dates: out_dates, vectors })
}

fn rolling_vol(series: &[(MonthKey, f64)], window: usize) -> std::collections::BTreeMap<MonthKey, f64> {
    let mut out = std::collections::BTreeMap::new();
    for i in 0..series.len() {
        let start = (i + 1).saturating_sub(window);
        let slice = &series[start..=i];
        if slice.len() < 2 {
            continue;
        }
        let vals: Vec<f64> = slice.iter().map(|(_, v)| *v).collect();
        let mean = vals.iter().sum::<f64>() / vals.len() as f64;
        let var = vals.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / vals.len() as f64;
        out.insert(series[i].0, (var.sqrt() * 12f64.sqrt()));
    }
    out
}

/// Ascending mean ΔCDS orders the two states `[calm, stress]`.
pub fn label_order(hmm: &GaussianHmm) -> [usize; 2] {
    let mut idx: Vec<usize> = (0..hmm.n_states).collect();
    idx.sort_by(|&a, &b| hmm.means[a][CDS_DIM].partial_cmp(&hmm.means[b][CDS_DIM]).unwrap());
    [idx[0], idx[1]]
}

pub fn fit(observations: &DomesticObservations, n_iter: usize) -> Option<GaussianHmm> {
    GaussianHmm::fit(&observations.vectors, N_STATES, n_iter)
}
