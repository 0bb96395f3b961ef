//! The constrained mean-variance solve (spec §4.10): an SQP-style iterative
//! solve (quadratic-approximation step, proximal L1 shrinkage for the
//! turnover/TC penalty, box-bound projection, vol-budget rescale) warm-started
//! from the previous weights, falling back to a closed form on non-convergence.

use std::collections::HashMap;

use macro_core::types::Instrument;
use macro_core::MacroRiskError;
use nalgebra::{DMatrix, DVector};
use tracing::warn;

const MAX_ITERATIONS: usize = 50;
const STEP_SIZE: f64 = 0.25;
const CONVERGENCE_TOL: f64 = 1e-7;

pub struct SolveInputs<'a> {
    pub mu: &'a HashMap<Instrument, f64>,
    pub budget: &'a HashMap<Instrument, f64>,
    pub covariance: &'a DMatrix<f64>,
    pub prev_weights: &'a HashMap<Instrument, f64>,
    pub bounds: &'a HashMap<Instrument, (f64, f64)>,
    pub tc_bps: &'a HashMap<Instrument, f64>,
    pub tc_regime_multiplier: f64,
    pub turnover_penalty_bps: f64,
    pub gamma: f64,
    pub vol_budget_monthly: f64,
}

/// Solved portfolio: weights, realised transaction cost and turnover, and
/// whether the solver converged (if not, `weights` is the closed-form
/// fallback and the caller should log a `SolverFailure`, spec §7).
pub struct SolveOutput {
    pub weights: HashMap<Instrument, f64>,
    pub transaction_cost: f64,
    pub turnover: f64,
    pub converged: bool,
}

pub fn solve(inputs: &SolveInputs) -> SolveOutput {
    let order = Instrument::ALL;
    let p = order.len();

    let mu_vec = DVector::from_iterator(p, order.iter().map(|i| inputs.mu.get(i).copied().unwrap_or(0.0)));
    let budget_vec = DVector::from_iterator(p, order.iter().map(|i| inputs.budget.get(i).copied().unwrap_or(1.0)));
    let prev_vec = DVector::from_iterator(p, order.iter().map(|i| inputs.prev_weights.get(i).copied().unwrap_or(0.0)));
    let tc_vec: Vec<f64> = order
        .iter()
        .map(|i| inputs.tc_bps.get(i).copied().unwrap_or(5.0) / 10_000.0 * inputs.tc_regime_multiplier)
        .collect();

    let sigma = if inputs.covariance.nrows() == p {
        inputs.covariance.clone()
    } else {
        DMatrix::identity(p, p) * 1e-4
    };

    let mut w = prev_vec.clone();
    let mut converged = false;

    for _ in 0..MAX_ITERATIONS {
        let signal = mu_vec.component_mul(&budget_vec);
        let grad = &signal - (&sigma * &w) * inputs.gamma;
        let mut candidate = &w + grad * STEP_SIZE;

        // Proximal soft-threshold for the combined tc + turnover-penalty
        // L1 term on Δw = candidate - prev.
        for j in 0..p {
            let threshold = (tc_vec[j] + inputs.turnover_penalty_bps / 10_000.0) * STEP_SIZE;
            let delta = candidate[j] - prev_vec[j];
            let shrunk = delta.signum() * (delta.abs() - threshold).max(0.0);
            candidate[j] = prev_vec[j] + shrunk;
        }

        // Box-bound projection.
        for (j, inst) in order.iter().enumerate() {
            let (lo, hi) = inputs.bounds.get(inst).copied().unwrap_or((-1.0, 1.0));
            candidate[j] = candidate[j].clamp(lo, hi);
        }

        // Vol-budget projection: scale the whole vector down if the
        // realised variance exceeds the monthly budget.
        let variance = (candidate.transpose() * &sigma * &candidate)[(0, 0)];
        if variance > inputs.vol_budget_monthly.powi(2) && variance > 1e-12 {
            let scale = (inputs.vol_budget_monthly.powi(2) / variance).sqrt();
            candidate *= scale;
        }

        let delta_norm = (&candidate - &w).norm();
        w = candidate;
        if delta_norm < CONVERGENCE_TOL {
            converged = true;
            break;
        }
    }

    if !w.iter().all(|v| v.is_finite()) {
        warn!("optimiser solve produced non-finite weights, falling back to closed form");
        return closed_form_fallback(inputs);
    }

    let weights: HashMap<Instrument, f64> = order.iter().enumerate().map(|(j, &i)| (i, w[j])).collect();
    let (transaction_cost, turnover) = cost_and_turnover(&weights, inputs.prev_weights, inputs.tc_bps, inputs.tc_regime_multiplier);

    SolveOutput {
        weights,
        transaction_cost,
        turnover,
        converged,
    }
}

/// `w_i = 0.5 * mu_i * budget_i`, projected into bounds (spec §4.10): used
/// when the iterative solve fails to converge or produces a non-finite
/// result (spec §7 `SolverFailure` policy — log, do not abort).
pub fn closed_form_fallback(inputs: &SolveInputs) -> SolveOutput {
    let mut weights = HashMap::new();
    for &inst in &Instrument::ALL {
        let mu = inputs.mu.get(&inst).copied().unwrap_or(0.0);
        let budget = inputs.budget.get(&inst).copied().unwrap_or(1.0);
        let (lo, hi) = inputs.bounds.get(&inst).copied().unwrap_or((-1.0, 1.0));
        weights.insert(inst, (0.5 * mu * budget).clamp(lo, hi));
    }
    let (transaction_cost, turnover) = cost_and_turnover(&weights, inputs.prev_weights, inputs.tc_bps, inputs.tc_regime_multiplier);
    SolveOutput {
        weights,
        transaction_cost,
        turnover,
        converged: false,
    }
}

fn cost_and_turnover(
    weights: &HashMap<Instrument, f64>,
    prev: &HashMap<Instrument, f64>,
    tc_bps: &HashMap<Instrument, f64>,
    tc_multiplier: f64,
) -> (f64, f64) {
    let mut turnover = 0.0;
    let mut cost = 0.0;
    for &inst in &Instrument::ALL {
        let delta = (weights.get(&inst).copied().unwrap_or(0.0) - prev.get(&inst).copied().unwrap_or(0.0)).abs();
        turnover += delta;
        cost += delta * tc_bps.get(&inst).copied().unwrap_or(5.0) / 10_000.0 * tc_multiplier;
    }
    (cost, turnover)
}

/// Raised by the caller (not by `solve`, which never panics or errors) when
/// it chooses to surface the fallback path as a typed error for logging.
pub fn fallback_error(reason: &str) -> MacroRiskError {
    MacroRiskError::SolverFailure(reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_bounds() -> HashMap<Instrument, (f64, f64)> {
        Instrument::ALL.iter().map(|&i| (i, (-1.0, 1.0))).collect()
    }

    fn flat_tc() -> HashMap<Instrument, f64> {
        Instrument::ALL.iter().map(|&i| (i, 3.0)).collect()
    }

    #[test]
    fn zero_mu_yields_zero_weights() {
        let mu: HashMap<Instrument, f64> = Instrument::ALL.iter().map(|&i| (i, 0.0)).collect();
        let budget: HashMap<Instrument, f64> = Instrument::ALL.iter().map(|&i| (i, 1.0)).collect();
        let prev: HashMap<Instrument, f64> = Instrument::ALL.iter().map(|&i| (i, 0.0)).collect();
        let sigma = DMatrix::identity(6, 6) * 1e-4;
        let bounds = flat_bounds();
        let tc = flat_tc();
        let inputs = SolveInputs {
            mu: &mu,
            budget: &budget,
            covariance: &sigma,
            prev_weights: &prev,
            bounds: &bounds,
            tc_bps: &tc,
            tc_regime_multiplier: 1.0,
            turnover_penalty_bps: 2.0,
            gamma: 2.0,
            vol_budget_monthly: 0.10 / 12f64.sqrt(),
        };
        let out = solve(&inputs);
        for &inst in &Instrument::ALL {
            assert!(out.weights[&inst].abs() < 1e-6);
        }
    }

    #[test]
    fn weights_respect_bounds() {
        let mu: HashMap<Instrument, f64> = Instrument::ALL.iter().map(|&i| (i, 5.0)).collect();
        let budget: HashMap<Instrument, f64> = Instrument::ALL.iter().map(|&i| (i, 1.0)).collect();
        let prev: HashMap<Instrument, f64> = Instrument::ALL.iter().map(|&i| (i, 0.0)).collect();
        let sigma = DMatrix::identity(6, 6) * 1e-4;
        let bounds = flat_bounds();
        let tc = flat_tc();
        let inputs = SolveInputs {
            mu: &mu,
            budget: &budget,
            covariance: &sigma,
            prev_weights: &prev,
            bounds: &bounds,
            tc_bps: &tc,
            tc_regime_multiplier: 1.0,
            turnover_penalty_bps: 2.0,
            gamma: 2.0,
            vol_budget_monthly: 0.10 / 12f64.sqrt(),
        };
        let out = solve(&inputs);
        for &inst in &Instrument::ALL {
            let (lo, hi) = bounds[&inst];
            assert!(out.weights[&inst] >= lo - 1e-9 && out.weights[&inst] <= hi + 1e-9);
        }
    }

    #[test]
    fn closed_form_fallback_respects_bounds() {
        let mu: HashMap<Instrument, f64> = Instrument::ALL.iter().map(|&i| (i, 10.0)).collect();
        let budget: HashMap<Instrument, f64> = Instrument::ALL.iter().map(|&i| (i, 1.0)).collect();
        let prev: HashMap<Instrument, f64> = Instrument::ALL.iter().map(|&i| (i, 0.0)).collect();
        let sigma = DMatrix::identity(6, 6);
        let bounds = flat_bounds();
        let tc = flat_tc();
        let inputs = SolveInputs {
            mu: &mu,
            budget: &budget,
            covariance: &sigma,
            prev_weights: &prev,
            bounds: &bounds,
            tc_bps: &tc,
            tc_regime_multiplier: 1.0,
            turnover_penalty_bps: 2.0,
            gamma: 2.0,
            vol_budget_monthly: 0.10 / 12f64.sqrt(),
        };
        let out = closed_form_fallback(&inputs);
        assert!(!out.converged);
        for &inst in &Instrument::ALL {
            let (lo, hi) = bounds[&inst];
            assert!(out.weights[&inst] >= lo - 1e-9 && out.weights[&inst] <= hi + 1e-9);
        }
    }
}
