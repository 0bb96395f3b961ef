//! Optimiser (spec §4.10): constrained mean-variance allocation with
//! regime-blended bounds, Ledoit-Wolf shrunk covariance, transaction-cost/
//! turnover penalties, and an SQP-style solve with a closed-form fallback.

pub mod bounds;
pub mod covariance;
pub mod solver;

use std::collections::HashMap;

use macro_core::types::Instrument;
use macro_core::{EngineConfig, RegimeProbabilities};
use tracing::warn;

/// IC-based budget scaling (spec §4.10): `budget_i = n * max(IC_i,0) /
/// Σ max(IC,0)` when at least 3 instruments have an IC score; otherwise
/// all-ones, reduced to 0.5 uniformly if every available IC is negative.
pub fn compute_budget(ic_scores: &HashMap<Instrument, f64>) -> HashMap<Instrument, f64> {
    let n = Instrument::ALL.len() as f64;
    if ic_scores.len() < 3 {
        let all_negative = !ic_scores.is_empty() && ic_scores.values().all(|&ic| ic < 0.0);
        let uniform = if all_negative { 0.5 } else { 1.0 };
        return Instrument::ALL.iter().map(|&i| (i, uniform)).collect();
    }

    let positive_sum: f64 = ic_scores.values().map(|&ic| ic.max(0.0)).sum();
    if positive_sum < 1e-12 {
        return Instrument::ALL.iter().map(|&i| (i, 0.5)).collect();
    }
    Instrument::ALL
        .iter()
        .map(|&i| {
            let ic = ic_scores.get(&i).copied().unwrap_or(0.0).max(0.0);
            (i, n * ic / positive_sum)
        })
        .collect()
}

pub struct OptimiseInputs<'a> {
    pub mu: &'a HashMap<Instrument, f64>,
    pub ic_scores: &'a HashMap<Instrument, f64>,
    pub monthly_returns: &'a [Vec<f64>],
    pub prev_weights: &'a HashMap<Instrument, f64>,
    pub regime: &'a RegimeProbabilities,
    pub cfg: &'a EngineConfig,
}

pub struct OptimiseOutput {
    pub weights: HashMap<Instrument, f64>,
    pub covariance: nalgebra::DMatrix<f64>,
    pub transaction_cost: f64,
    pub turnover: f64,
}

/// The full L9 step (spec §4.10): budget scaling, regime-blended
/// bounds/tc multiplier, Ledoit-Wolf covariance, solve, fallback on
/// non-convergence.
pub fn optimise(inputs: &OptimiseInputs) -> OptimiseOutput {
    let budget = compute_budget(inputs.ic_scores);

    let sigma = covariance::estimate(inputs.monthly_returns, inputs.cfg.cov_shrinkage);

    let bound_map: HashMap<Instrument, (f64, f64)> = Instrument::ALL
        .iter()
        .map(|&i| (i, bounds::blended_bounds(i, inputs.regime, inputs.cfg)))
        .collect();
    let tc_multiplier = bounds::tc_regime_multiplier(inputs.regime, &inputs.cfg.tc_regime_multipliers);

    let vol_budget_monthly = inputs.cfg.overlay_vol_target_annual / 12f64.sqrt();

    let solve_inputs = solver::SolveInputs {
        mu: inputs.mu,
        budget: &budget,
        covariance: &sigma,
        prev_weights: inputs.prev_weights,
        bounds: &bound_map,
        tc_bps: &inputs.cfg.transaction_costs_bps,
        tc_regime_multiplier: tc_multiplier,
        turnover_penalty_bps: inputs.cfg.turnover_penalty_bps,
        gamma: inputs.cfg.gamma,
        vol_budget_monthly,
    };

    let out = solver::solve(&solve_inputs);
    if !out.converged {
        warn!("optimiser solve did not converge within iteration budget, using closed-form result");
    }

    OptimiseOutput {
        weights: out.weights,
        covariance: sigma,
        transaction_cost: out.transaction_cost,
        turnover: out.turnover,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_uses_uniform_when_fewer_than_three_ic_scores() {
        let ics = HashMap::from([(Instrument::Fx, 0.2)]);
        let budget = compute_budget(&ics);
        assert!((budget[&Instrument::Fx] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn budget_reduces_to_half_when_all_negative() {
        let ics: HashMap<Instrument, f64> = Instrument::ALL.iter().map(|&i| (i, -0.1)).collect();
        let budget = compute_budget(&ics);
        for &inst in &Instrument::ALL {
            assert!((budget[&inst] - 0.5).abs() < 1e-9);
        }
    }

    #[test]
    fn budget_concentrates_on_positive_ic_instruments() {
        let mut ics: HashMap<Instrument, f64> = Instrument::ALL.iter().map(|&i| (i, 0.0)).collect();
        ics.insert(Instrument::Front, 0.3);
        let budget = compute_budget(&ics);
        assert!(budget[&Instrument::Front] > budget[&Instrument::Fx]);
    }

    #[test]
    fn optimise_respects_bounds_on_flat_inputs() {
        let cfg = EngineConfig::default();
        let mu: HashMap<Instrument, f64> = Instrument::ALL.iter().map(|&i| (i, 0.01)).collect();
        let ic_scores = HashMap::new();
        let returns = vec![vec![0.001; 6]; 40];
        let prev: HashMap<Instrument, f64> = Instrument::ALL.iter().map(|&i| (i, 0.0)).collect();
        let regime = RegimeProbabilities::uniform_fallback();
        let inputs = OptimiseInputs {
            mu: &mu,
            ic_scores: &ic_scores,
            monthly_returns: &returns,
            prev_weights: &prev,
            regime: &regime,
            cfg: &cfg,
        };
        let out = optimise(&inputs);
        for &inst in &Instrument::ALL {
            let (lo, hi) = bounds::blended_bounds(inst, &regime, &cfg);
            assert!(out.weights[&inst] >= lo - 1e-6 && out.weights[&inst] <= hi + 1e-6);
        }
    }
}
