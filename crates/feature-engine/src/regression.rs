use std::collections::BTreeMap;

use macro_core::types::MonthKey;
use macro_core::{Series, Unit};
use nalgebra::{DMatrix, DVector};

/// Rolling in-sample OLS residual of `y` on `xs`, refit at every date over
/// the trailing `window` observations ending at that date (causal: the fit
/// at `t` never uses data after `t`). Dates without a full window, or where
/// any regressor is missing, are omitted from the output.
pub fn rolling_ols_residual(y: &Series, xs: &[&Series], window: usize) -> Series {
    let dates: Vec<MonthKey> = y.dates().collect();
    let mut out = BTreeMap::new();

    for (i, &d) in dates.iter().enumerate() {
        if i + 1 < window {
            continue;
        }
        let start = i + 1 - window;
        let slice = &dates[start..=i];

        let mut rows = Vec::with_capacity(slice.len());
        let mut targets = Vec::with_capacity(slice.len());
        let mut complete = true;
        for &sd in slice {
            let Some(yv) = y.get(sd) else {
                complete = false;
                break;
            };
            let mut row = vec![1.0];
            for x in xs {
                match x.get(sd) {
                    Some(v) => row.push(v),
                    None => {
                        complete = false;
                        break;
                    }
                }
            }
            if !complete {
                break;
            }
            rows.push(row);
            targets.push(yv);
        }
        if !complete || rows.len() < window {
            continue;
        }

        let p = xs.len() + 1;
        let n = rows.len();
        let x = DMatrix::from_row_slice(n, p, &rows.concat());
        let yv = DVector::from_vec(targets);

        let xtx = x.transpose() * &x;
        let Some(xtx_inv) = xtx.try_inverse() else {
            continue;
        };
        let beta = xtx_inv * x.transpose() * &yv;

        let mut last_row = vec![1.0];
        for x in xs {
            last_row.push(x.get(d).unwrap());
        }
        let yhat: f64 = last_row.iter().zip(beta.iter()).map(|(a, b)| a * b).sum();
        out.insert(d, y.get(d).unwrap() - yhat);
    }

    Series::from_pairs("ols_residual", Unit::Ratio, out.into_iter().collect())
}
