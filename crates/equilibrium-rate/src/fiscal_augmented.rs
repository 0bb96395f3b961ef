//! Model 1: fiscal-augmented real-rate regression with Bayesian shrinkage
//! toward literature priors (spec §4.5).

use std::collections::HashMap;

use macro_core::types::MonthKey;
use macro_core::{series, Panel};
use nalgebra::{DMatrix, DVector};

use crate::inputs;

const WINDOW: usize = 60;
const R_BASE: f64 = 4.0;
const PRIOR: [f64; 4] = [0.04, -0.12, 0.007, 0.005]; // debt, pb, cds, embi
const PRIOR_WEIGHT: f64 = 0.5;

pub struct FiscalAugmentedEstimate {
    pub r_star: f64,
    pub decomposition: HashMap<String, f64>,
}

/// Rolling 60-month ridge-shrunk OLS of `(CDI - pi_exp)` on the four fiscal
/// regressors, with coefficients pulled toward the literature priors by
/// `lambda = PRIOR_WEIGHT * n`. Returns `None` before a full window of
/// complete observations exists.
pub fn estimate(panel: &Panel, at: MonthKey) -> Option<FiscalAugmentedEstimate> {
    let cdi = panel.column(inputs::CDI)?;
    let pi_exp = panel.column(inputs::IPCA_EXPECTATIONS)?;
    let debt = panel.column(inputs::DEBT_GDP)?;
    let pb = panel.column(inputs::PRIMARY_BALANCE)?;
    let cds = panel.column(inputs::CDS_BPS)?;
    let embi = panel.column(inputs::EMBI)?;

    let debt_accel = series::diff_n(debt, 12);
    let cds_centred = centre(cds, at);
    let embi_centred = centre(embi, at);

    let window = cdi.window(at, WINDOW);
    if window.len() < WINDOW {
        return None;
    }

    let mut rows = Vec::with_capacity(WINDOW);
    let mut targets = Vec::with_capacity(WINDOW);
    for (d, cdi_v) in &window {
        let (Some(pi), Some(da), Some(pb_v), Some(cds_v), Some(embi_v)) = (
            pi_exp.get(*d),
            debt_accel.get(*d),
            pb.get(*d),
            cds_centred.get(*d),
            embi_centred.get(*d),
        ) else {
            continue;
        };
        rows.push([da, pb_v, cds_v, embi_v]);
        targets.push(cdi_v - pi);
    }
    if rows.len() < WINDOW / 2 {
        return None;
    }

    let n = rows.len() as f64;
    let p = 4;
    let flat: Vec<f64> = rows.iter().flat_map(|r| r.iter().copied()).collect();
    let x = DMatrix::from_row_slice(rows.len(), p, &flat);
    let y = DVector::from_vec(targets);

    let mut xtx = x.transpose() * &x;
    let mut xty = x.transpose() * &y;
    let lambda = PRIOR_WEIGHT * n;
    for i in 0..p {
        xtx[(i, i)] += lambda;
        xty[i] += lambda * PRIOR[i];
    }
    let beta = xtx.try_inverse()? * xty;

    let last = rows.last()?;
    let fiscal_contrib = beta[0] * last[0] + beta[1] * last[1];
    let sovereign_contrib = beta[2] * last[2] + beta[3] * last[3];
    let r_star = (R_BASE + fiscal_contrib + sovereign_contrib).clamp(2.0, 10.0);

    let mut decomposition = HashMap::new();
    decomposition.insert("base".to_string(), R_BASE);
    decomposition.insert("fiscal".to_string(), fiscal_contrib);
    decomposition.insert("sovereign".to_string(), sovereign_contrib);

    Some(FiscalAugmentedEstimate { r_star, decomposition })
}

fn centre(s: &macro_core::Series, at: MonthKey) -> macro_core::Series {
    let window = s.window(at, WINDOW);
    if window.is_empty() {
        return s.clone();
    }
    let mean = window.iter().map(|(_, v)| v).sum::<f64>() / window.len() as f64;
    let mut out = macro_core::Series::new(s.name(), s.unit());
    for (d, v) in s.iter() {
        out.insert(d, v - mean);
    }
    out
}
