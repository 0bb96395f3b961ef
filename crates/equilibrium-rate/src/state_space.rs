//! Model 4: state-space (Kalman) equilibrium rate (spec §4.5).
//!
//! 3-state `[r*, g, z]` with fixed process/measurement variances. Run from
//! scratch over the panel's history up to `at` each call: the filter is
//! cheap enough at monthly frequency that this is simpler than threading
//! filter state through the production engine, at the cost of O(T) per call
//! rather than O(1) amortised.

use macro_core::types::MonthKey;
use macro_core::{series, Panel};
use nalgebra::{Matrix2, Matrix2x3, Matrix3, Vector2, Vector3};

use crate::inputs;

const TRANSITION_Z_TO_RSTAR: f64 = 0.10;
const G_PERSISTENCE: f64 = 0.90;
const Z_PERSISTENCE: f64 = 0.80;
const DEBT_IMPULSE_COEF: f64 = 0.02;
const CDS_IMPULSE_COEF: f64 = 0.005;

pub fn estimate(panel: &Panel, at: MonthKey) -> Option<f64> {
    let cdi = panel.column(inputs::CDI)?;
    let pi_exp = panel.column(inputs::IPCA_EXPECTATIONS)?;
    let ibc = panel.column(inputs::OUTPUT_GAP);
    let debt = panel.column(inputs::DEBT_GDP);
    let cds = panel.column(inputs::CDS_BPS);

    let dates = cdi.as_of(at);
    if dates.len() < 12 {
        return None;
    }

    let output_gap = ibc.map(|s| {
        let smoothed = series::hp_trend(s, 24.0);
        let mut out = macro_core::Series::new("output_gap", macro_core::Unit::Ratio);
        for (d, v) in s.iter() {
            if let Some(t) = smoothed.get(d) {
                out.insert(d, v - t);
            }
        }
        out
    });

    let debt_accel = debt.map(|d| series::diff(d));
    let cds_diff = cds.map(|c| series::diff(c));

    let f = Matrix3::new(
        1.0, 0.0, TRANSITION_Z_TO_RSTAR,
        0.0, G_PERSISTENCE, 0.0,
        0.0, 0.0, Z_PERSISTENCE,
    );
    let q = Matrix3::new(0.02, 0.0, 0.0, 0.0, 0.05, 0.0, 0.0, 0.0, 0.05);
    let h = Matrix2x3::new(1.0, 1.0, 0.0, 0.0, 1.0, 0.0);
    let r = Matrix2::new(0.10, 0.0, 0.0, 0.10);

    let mut x = Vector3::new(4.5, 0.0, 0.0);
    let mut p = Matrix3::identity();

    for (d, cdi_v) in &dates {
        let impulse_debt = debt_accel.as_ref().and_then(|s| s.get(*d)).unwrap_or(0.0);
        let impulse_cds = cds_diff.as_ref().and_then(|s| s.get(*d)).unwrap_or(0.0);
        let impulse = Vector3::new(
            DEBT_IMPULSE_COEF * impulse_debt + CDS_IMPULSE_COEF * impulse_cds,
            0.0,
            0.0,
        );

        x = f * x + impulse;
        p = f * p * f.transpose() + q;

        let ex_ante_real = pi_exp.get(*d).map(|pi| cdi_v - pi);
        let gap = output_gap.as_ref().and_then(|s| s.get(*d));

        let (z_obs, valid_rows): (Vector2<f64>, u8) = match (ex_ante_real, gap) {
            (Some(r_real), Some(g_v)) => (Vector2::new(r_real, g_v), 2),
            (Some(r_real), None) => (Vector2::new(r_real, 0.0), 1),
            (None, Some(g_v)) => (Vector2::new(0.0, g_v), 1),
            (None, None) => continue,
        };

        if valid_rows == 2 {
            let y = z_obs - h * x;
            let s = h * p * h.transpose() + r;
            if let Some(s_inv) = s.try_inverse() {
                let k = p * h.transpose() * s_inv;
                x += k * y;
                p = (Matrix3::identity() - k * h) * p;
            }
        } else if ex_ante_real.is_some() {
            let h1 = h.row(0);
            let y = z_obs[0] - (h1 * x)[0];
            let s = (h1 * p * h1.transpose())[(0, 0)] + r[(0, 0)];
            if s.abs() > f64::EPSILON {
                let k = p * h1.transpose() / s;
                x += k * y;
                p -= k * h1 * p;
            }
        }
    }

    Some(x[0].clamp(2.0, 10.0))
}
