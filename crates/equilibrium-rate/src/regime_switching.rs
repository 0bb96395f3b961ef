//! Model 5: regime-switching equilibrium rate (spec §4.5). Only available
//! after the regime model has produced probabilities (the two-pass
//! protocol's second pass).

use macro_core::types::MonthKey;
use macro_core::{GlobalRegime, Panel, RegimeProbabilities};

use crate::inputs;

const PRIOR_CARRY: f64 = 4.5;
const PRIOR_RISKOFF: f64 = 5.5;
const PRIOR_STRESS: f64 = 7.0;
const SHRINKAGE_TO_PRIOR: f64 = 0.4;
const WINDOW: usize = 60;

pub fn estimate(panel: &Panel, at: MonthKey, regime: &RegimeProbabilities) -> Option<f64> {
    let cdi = panel.column(inputs::CDI)?;
    let pi_exp = panel.column(inputs::IPCA_EXPECTATIONS)?;

    let window = cdi.window(at, WINDOW);
    if window.is_empty() {
        return None;
    }

    let mu_carry = observed_mean(&window, pi_exp, GlobalRegime::Carry, regime, PRIOR_CARRY);
    let mu_riskoff = observed_mean(&window, pi_exp, GlobalRegime::RiskOff, regime, PRIOR_RISKOFF);
    let mu_stress = observed_mean(&window, pi_exp, GlobalRegime::Stress, regime, PRIOR_STRESS);

    let r_star = regime.p_carry * mu_carry + regime.p_riskoff * mu_riskoff + regime.p_stress * mu_stress;
    Some(r_star.clamp(2.0, 10.0))
}

/// Rolling-window weighted mean of the observed real rate conditional on the
/// *current* regime weight, shrunk 0.6/0.4 toward the prior mean for that
/// regime (a single persistent regime classification is not retained per
/// historical month here, so the current probability is used as the weight
/// for every observation in the window -- a simplification documented as an
/// open design choice).
fn observed_mean(
    window: &[(MonthKey, f64)],
    pi_exp: &macro_core::Series,
    regime: GlobalRegime,
    probs: &RegimeProbabilities,
    prior: f64,
) -> f64 {
    let weight = match regime {
        GlobalRegime::Carry => probs.p_carry,
        GlobalRegime::RiskOff => probs.p_riskoff,
        GlobalRegime::Stress => probs.p_stress,
    };
    if weight < 1e-6 {
        return prior;
    }
    let mut sum = 0.0;
    let mut n = 0.0;
    for (d, cdi_v) in window {
        if let Some(pi) = pi_exp.get(*d) {
            sum += cdi_v - pi;
            n += 1.0;
        }
    }
    if n == 0.0 {
        return prior;
    }
    let observed = sum / n;
    (1.0 - SHRINKAGE_TO_PRIOR) * observed + SHRINKAGE_TO_PRIOR * prior
}
