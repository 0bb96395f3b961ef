//! Global 3-state regime HMM (spec §4.6).

use macro_core::types::MonthKey;
use macro_core::{series, Panel};
use nalgebra::DVector;

use crate::hmm::GaussianHmm;

pub const N_STATES: usize = 3;

pub const DXY: &str = "dxy";
pub const VIX: &str = "vix";
pub const UST_10Y: &str = "ust_10y";
pub const US_HY_OAS: &str = "us_hy_oas";
pub const BCOM: &str = "bcom";
pub const EWZ: &str = "ewz";

/// Observation dimension index of VIX, the canonical stress column for the
/// global model.
const VIX_DIM: usize = 1;

pub struct GlobalObservations {
    pub dates: Vec<MonthKey>,
    pub vectors: Vec<DVector<f64>>,
}

pub fn build_observations(panel: &Panel, at: MonthKey) -> Option<GlobalObservations> {
    let dxy = panel.column(DXY)?;
    let vix = panel.column(VIX)?;
    let ust10y = panel.column(UST_10Y)?;
    let hy = panel.column(US_HY_OAS)?;
    let bcom = panel.column(BCOM)?;
    let ewz = panel.column(EWZ)?;

    let d_log_dxy = series::diff(&series::log_transform(dxy));
    let d_ust10y = series::diff(ust10y);
    let d_log_bcom = series::diff(&series::log_transform(bcom));
    let d_log_ewz = series::diff(&series::log_transform(ewz));

    let dates = d_log_dxy.as_of(at);
    let mut out_dates = Vec::new();
    let mut vectors = Vec::new();
    for (d, dxy_v) in dates {
        let (Some(vix_v), Some(ust_v), Some(hy_v), Some(bcom_v), Some(ewz_v)) =
            (vix.get(d), d_ust10y.get(d), hy.get(d), d_log_bcom.get(d), d_log_ewz.get(d))
        else {
            continue;
        };
        out_dates.push(d);
        vectors.push(DVector::from_vec(vec![dxy_v, vix_v, ust_v, hy_v, bcom_v, ewz_v]));
    }
    if vectors.is_empty() {
        return None;
    }
    Some(GlobalObservations { dates: out_dates, vectors })
}

/// State index ordering by the literal spec rule: ascending mean VIX maps
/// to `[carry, stress, risk-off]` (not `[carry, risk-off, stress]` -- the
/// middle-VIX state is labelled "stress" and the highest "risk-off").
pub fn label_order(hmm: &GaussianHmm) -> [usize; 3] {
    let mut idx: Vec<usize> = (0..hmm.n_states).collect();
    idx.sort_by(|&a, &b| hmm.means[a][VIX_DIM].partial_cmp(&hmm.means[b][VIX_DIM]).unwrap());
    [idx[0], idx[1], idx[2]]
}

pub fn fit(observations: &GlobalObservations, n_iter: usize) -> Option<GaussianHmm> {
    GaussianHmm::fit(&observations.vectors, N_STATES, n_iter)
}
