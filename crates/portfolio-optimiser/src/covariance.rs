//! Monthly return covariance with Ledoit-Wolf shrinkage (spec §4.10):
//! sample covariance over the last `cov_window_months`, shrunk toward a
//! scaled-identity target when `T > p+1`, else used unshrunk.

use nalgebra::DMatrix;

/// `rows`: `T` monthly return observations, each a length-`p` vector in
/// `Instrument::ALL` order.
pub fn estimate(rows: &[Vec<f64>], shrink: bool) -> DMatrix<f64> {
    let t = rows.len();
    let p = rows.first().map(|r| r.len()).unwrap_or(0);
    if t == 0 || p == 0 {
        return DMatrix::zeros(p, p);
    }

    let means: Vec<f64> = (0..p).map(|j| rows.iter().map(|r| r[j]).sum::<f64>() / t as f64).collect();
    let flat: Vec<f64> = rows.iter().flat_map(|r| r.iter().enumerate().map(|(j, v)| v - means[j])).collect();
    let x = DMatrix::from_row_slice(t, p, &flat);
    let sample = (x.transpose() * &x) / t as f64;

    if !shrink || t <= p + 1 {
        return sample;
    }
    ledoit_wolf_shrink(&sample, &x, t)
}

/// Ledoit & Wolf (2004)'s shrinkage-to-scaled-identity estimator: target
/// `F = (tr(S)/p) * I`, shrinkage intensity the classic bias/variance ratio
/// `clamp(mean_t(||x_t x_tᵀ − S||_F²) / (T · ||S − F||_F²), 0, 1)`.
fn ledoit_wolf_shrink(sample: &DMatrix<f64>, x: &DMatrix<f64>, t: usize) -> DMatrix<f64> {
    let p = sample.nrows();
    let mu = sample.trace() / p as f64;
    let target = DMatrix::identity(p, p) * mu;

    let d2 = (sample - &target).iter().map(|v| v * v).sum::<f64>();
    if d2 < 1e-15 {
        return sample.clone();
    }

    let mut b2_sum = 0.0;
    for row in 0..t {
        let xt = x.row(row).transpose();
        let outer = &xt * xt.transpose();
        b2_sum += (outer - sample).iter().map(|v| v * v).sum::<f64>();
    }
    let b2_bar = b2_sum / (t as f64 * t as f64);
    let intensity = (b2_bar / d2).clamp(0.0, 1.0);

    target * intensity + sample * (1.0 - intensity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_zero_matrix_for_empty_input() {
        let cov = estimate(&[], true);
        assert_eq!(cov.nrows(), 0);
    }

    #[test]
    fn sample_path_used_when_window_too_short() {
        let rows = vec![vec![0.01, 0.02], vec![0.02, 0.01], vec![0.0, 0.0]];
        let cov = estimate(&rows, true);
        assert_eq!(cov.nrows(), 2);
    }

    #[test]
    fn shrunk_covariance_is_symmetric_positive_semidefinite_on_diagonal() {
        let mut rows = Vec::new();
        let mut state = 3u64;
        let mut noise = || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            ((state >> 11) as f64 / (1u64 << 53) as f64 - 0.5) * 0.02
        };
        for _ in 0..60 {
            rows.push(vec![noise(), noise(), noise()]);
        }
        let cov = estimate(&rows, true);
        for i in 0..3 {
            assert!(cov[(i, i)] >= 0.0);
        }
        for i in 0..3 {
            for j in 0..3 {
                assert!((cov[(i, j)] - cov[(j, i)]).abs() < 1e-9);
            }
        }
    }
}
