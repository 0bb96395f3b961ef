//! A small Gaussian hidden Markov model with full covariance, fit by
//! Baum-Welch EM (scaled forward-backward). Used for both the global
//! (3-state) and domestic (2-state) regime models (spec §4.6).

use nalgebra::{DMatrix, DVector};

const COV_FLOOR: f64 = 1e-6;

#[derive(Debug, Clone)]
pub struct GaussianHmm {
    pub n_states: usize,
    pub means: Vec<DVector<f64>>,
    pub covs: Vec<DMatrix<f64>>,
    /// `transition[(i, j)] = P(state j at t | state i at t-1)`.
    pub transition: DMatrix<f64>,
    pub initial: DVector<f64>,
}

fn gaussian_density(x: &DVector<f64>, mean: &DVector<f64>, cov_inv: &DMatrix<f64>, log_det: f64) -> f64 {
    let d = x.len() as f64;
    let diff = x - mean;
    let quad = (diff.transpose() * cov_inv * &diff)[(0, 0)];
    let log_norm = -0.5 * (d * (2.0 * std::f64::consts::PI).ln() + log_det);
    (log_norm - 0.5 * quad).exp()
}

fn regularised_inverse(cov: &DMatrix<f64>) -> Option<(DMatrix<f64>, f64)> {
    let d = cov.nrows();
    let mut reg = cov.clone();
    for i in 0..d {
        reg[(i, i)] += COV_FLOOR;
    }
    let inv = reg.clone().try_inverse()?;
    let det = reg.determinant();
    if det <= 0.0 {
        return None;
    }
    Some((inv, det.ln()))
}

impl GaussianHmm {
    /// Fit via EM over `n_iter` iterations. Initial means are spread across
    /// quantiles of the first observed dimension so states start distinct;
    /// returns `None` on a degenerate (singular covariance) fit, which the
    /// caller should treat as `FitFailure` and fall back to uniform priors.
    pub fn fit(observations: &[DVector<f64>], n_states: usize, n_iter: usize) -> Option<Self> {
        let t = observations.len();
        if t < n_states * 4 {
            return None;
        }
        let d = observations[0].len();

        let mut sorted_idx: Vec<usize> = (0..t).collect();
        sorted_idx.sort_by(|&a, &b| observations[a][0].partial_cmp(&observations[b][0]).unwrap());
        let mut means: Vec<DVector<f64>> = (0..n_states)
            .map(|s| {
                let idx = sorted_idx[(s * t) / n_states + t / (2 * n_states)];
                observations[idx].clone()
            })
            .collect();
        let overall_mean = observations.iter().fold(DVector::zeros(d), |a, b| a + b) / t as f64;
        let overall_cov = {
            let mut c = DMatrix::zeros(d, d);
            for o in observations {
                let diff = o - &overall_mean;
                c += &diff * diff.transpose();
            }
            c / t as f64
        };
        let mut covs: Vec<DMatrix<f64>> = (0..n_states).map(|_| overall_cov.clone()).collect();
        let mut transition = DMatrix::from_element(n_states, n_states, 1.0 / n_states as f64);
        let mut initial = DVector::from_element(n_states, 1.0 / n_states as f64);

        for _ in 0..n_iter {
            let mut inv_dets = Vec::with_capacity(n_states);
            for s in 0..n_states {
                inv_dets.push(regularised_inverse(&covs[s])?);
            }

            let mut b = DMatrix::zeros(t, n_states);
            for ti in 0..t {
                for s in 0..n_states {
                    let (inv, log_det) = &inv_dets[s];
                    b[(ti, s)] = gaussian_density(&observations[ti], &means[s], inv, *log_det).max(1e-300);
                }
            }

            let mut alpha = DMatrix::zeros(t, n_states);
            let mut scale = DVector::zeros(t);
            for s in 0..n_states {
                alpha[(0, s)] = initial[s] * b[(0, s)];
            }
            scale[0] = alpha.row(0).sum().max(1e-300);
            for s in 0..n_states {
                alpha[(0, s)] /= scale[0];
            }
            for ti in 1..t {
                for s in 0..n_states {
                    let mut acc = 0.0;
                    for sp in 0..n_states {
                        acc += alpha[(ti - 1, sp)] * transition[(sp, s)];
                    }
                    alpha[(ti, s)] = acc * b[(ti, s)];
                }
                scale[ti] = alpha.row(ti).sum().max(1e-300);
                for s in 0..n_states {
                    alpha[(ti, s)] /= scale[ti];
                }
            }

            let mut beta = DMatrix::zeros(t, n_states);
            for s in 0..n_states {
                beta[(t - 1, s)] = 1.0;
            }
            for ti in (0..t - 1).rev() {
                for s in 0..n_states {
                    let mut acc = 0.0;
                    for sp in 0..n_states {
                        acc += transition[(s, sp)] * b[(ti + 1, sp)] * beta[(ti + 1, sp)];
                    }
                    beta[(ti, s)] = acc / scale[ti + 1];
                }
            }

            let mut gamma = DMatrix::zeros(t, n_states);
            for ti in 0..t {
                let mut row_sum = 0.0;
                for s in 0..n_states {
                    gamma[(ti, s)] = alpha[(ti, s)] * beta[(ti, s)];
                    row_sum += gamma[(ti, s)];
                }
                if row_sum > 0.0 {
                    for s in 0..n_states {
                        gamma[(ti, s)] /= row_sum;
                    }
                }
            }

            let mut xi_sum = DMatrix::zeros(n_states, n_states);
            for ti in 0..t - 1 {
                let mut denom = 0.0;
                let mut cell = DMatrix::zeros(n_states, n_states);
                for s in 0..n_states {
                    for sp in 0..n_states {
                        let v = alpha[(ti, s)] * transition[(s, sp)] * b[(ti + 1, sp)] * beta[(ti + 1, sp)];
                        cell[(s, sp)] = v;
                        denom += v;
                    }
                }
                if denom > 0.0 {
                    xi_sum += cell / denom;
                }
            }

            initial = gamma.row(0).transpose();
            for s in 0..n_states {
                let denom: f64 = (0..t - 1).map(|ti| gamma[(ti, s)]).sum::<f64>().max(1e-300);
                for sp in 0..n_states {
                    transition[(s, sp)] = xi_sum[(s, sp)] / denom;
                }
            }

            for s in 0..n_states {
                let weight: f64 = gamma.column(s).sum().max(1e-300);
                let mut mean = DVector::zeros(d);
                for ti in 0..t {
                    mean += gamma[(ti, s)] * &observations[ti];
                }
                mean /= weight;

                let mut cov = DMatrix::zeros(d, d);
                for ti in 0..t {
                    let diff = &observations[ti] - &mean;
                    cov += gamma[(ti, s)] * (&diff * diff.transpose());
                }
                cov /= weight;
                means[s] = mean;
                covs[s] = cov;
            }
        }

        for c in &covs {
            regularised_inverse(c)?;
        }

        Some(Self {
            n_states,
            means,
            covs,
            transition,
            initial,
        })
    }

    /// Scaled forward algorithm: filtered state probabilities at every
    /// timestep, using only observations up to that timestep (causal).
    pub fn filtered_probabilities(&self, observations: &[DVector<f64>]) -> Vec<DVector<f64>> {
        let n = self.n_states;
        let t = observations.len();
        let mut out = Vec::with_capacity(t);
        if t == 0 {
            return out;
        }

        let inv_dets: Vec<(DMatrix<f64>, f64)> = self
            .covs
            .iter()
            .map(|c| regularised_inverse(c).unwrap_or((DMatrix::identity(c.nrows(), c.nrows()), 0.0)))
            .collect();

        let mut alpha = DVector::from_fn(n, |s, _| {
            let (inv, log_det) = &inv_dets[s];
            self.initial[s] * gaussian_density(&observations[0], &self.means[s], inv, *log_det)
        });
        let sum = alpha.sum().max(1e-300);
        alpha /= sum;
        out.push(alpha.clone());

        for ti in 1..t {
            let mut next = DVector::zeros(n);
            for s in 0..n {
                let (inv, log_det) = &inv_dets[s];
                let b = gaussian_density(&observations[ti], &self.means[s], inv, *log_det);
                let mut acc = 0.0;
                for sp in 0..n {
                    acc += alpha[sp] * self.transition[(sp, s)];
                }
                next[s] = acc * b;
            }
            let sum = next.sum().max(1e-300);
            next /= sum;
            alpha = next;
            out.push(alpha.clone());
        }
        out
    }
}
