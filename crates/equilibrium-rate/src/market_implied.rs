//! Model 3: market-implied (ACM-style) equilibrium rate via PCA + VAR(1)
//! on the DI curve cross-section (spec §4.5).

use macro_core::types::MonthKey;
use macro_core::Panel;
use nalgebra::{DMatrix, DVector, SymmetricEigen};

use crate::inputs;

const WINDOW: usize = 60;
const N_FACTORS: usize = 3;
const TENORS: [&str; 5] = [inputs::DI_1Y, inputs::DI_2Y, inputs::DI_3Y, inputs::DI_5Y, inputs::DI_10Y];

pub struct MarketImpliedEstimate {
    pub r_star: f64,
    pub term_premium_5y: f64,
}

pub fn estimate(panel: &Panel, at: MonthKey) -> Option<MarketImpliedEstimate> {
    let series: Vec<_> = TENORS.iter().map(|n| panel.column(n)).collect::<Option<Vec<_>>>()?;
    let dates = series[0].window(at, WINDOW);
    let dates: Vec<MonthKey> = dates.iter().map(|(d, _)| *d).collect();
    if dates.len() < WINDOW {
        return None;
    }

    let mut rows: Vec<f64> = Vec::with_capacity(dates.len() * TENORS.len());
    let mut used_dates = Vec::with_capacity(dates.len());
    for &d in &dates {
        let row: Option<Vec<f64>> = series.iter().map(|s| s.get(d)).collect();
        if let Some(row) = row {
            rows.extend(row);
            used_dates.push(d);
        }
    }
    let t = used_dates.len();
    if t < WINDOW / 2 {
        return None;
    }
    let k = TENORS.len();
    let y = DMatrix::from_row_slice(t, k, &rows);

    let means: Vec<f64> = (0..k).map(|j| y.column(j).mean()).collect();
    let mut y_demeaned = y.clone();
    for j in 0..k {
        for i in 0..t {
            y_demeaned[(i, j)] -= means[j];
        }
    }

    let cov = (&y_demeaned.transpose() * &y_demeaned) / (t as f64 - 1.0);
    let eig = SymmetricEigen::new(cov);
    let mut idx: Vec<usize> = (0..k).collect();
    idx.sort_by(|&a, &b| eig.eigenvalues[b].partial_cmp(&eig.eigenvalues[a]).unwrap());
    let loadings = DMatrix::from_fn(k, N_FACTORS, |r, c| eig.eigenvectors[(r, idx[c])]);

    let factors = &y_demeaned * &loadings; // t x 3

    if t < 3 {
        return None;
    }
    let n = t - 1;
    let mut x_rows = Vec::with_capacity(n * (N_FACTORS + 1));
    let mut y_rows = Vec::with_capacity(n * N_FACTORS);
    for i in 1..t {
        x_rows.push(1.0);
        for c in 0..N_FACTORS {
            x_rows.push(factors[(i - 1, c)]);
        }
        for c in 0..N_FACTORS {
            y_rows.push(factors[(i, c)]);
        }
    }
    let x = DMatrix::from_row_slice(n, N_FACTORS + 1, &x_rows);
    let y_var = DMatrix::from_row_slice(n, N_FACTORS, &y_rows);

    let xtx = x.transpose() * &x;
    let xtx_inv = xtx.try_inverse()?;
    let b = xtx_inv * x.transpose() * &y_var; // (N_FACTORS+1) x N_FACTORS

    let c_vec = DVector::from_fn(N_FACTORS, |i, _| b[(0, i)]);
    let phi = DMatrix::from_fn(N_FACTORS, N_FACTORS, |r, col| b[(1 + r, col)]);

    let identity = DMatrix::<f64>::identity(N_FACTORS, N_FACTORS);
    let f_inf = (identity - &phi).try_inverse()? * c_vec;

    // Short end: weighted average of the 1Y/2Y loadings (equal weight).
    let short_yield: f64 = (0..2)
        .map(|tenor_idx| means[tenor_idx] + (0..N_FACTORS).map(|c| loadings[(tenor_idx, c)] * f_inf[c]).sum::<f64>())
        .sum::<f64>()
        / 2.0;

    let pi_exp = panel
        .column(crate::inputs::IPCA_EXPECTATIONS)
        .and_then(|s| s.value_as_of(at))
        .unwrap_or(0.0);
    let r_star = (short_yield - pi_exp).clamp(2.0, 10.0);

    let model_5y = means[3] + (0..N_FACTORS).map(|c| loadings[(3, c)] * f_inf[c]).sum::<f64>();
    let actual_5y = panel.column(inputs::DI_5Y)?.value_as_of(at).unwrap_or(model_5y);
    let term_premium_5y = actual_5y - model_5y;

    Some(MarketImpliedEstimate { r_star, term_premium_5y })
}
