//! Composite equilibrium rate and SELIC* blending (spec §4.5).

use std::collections::HashMap;

use macro_core::types::MonthKey;
use macro_core::{EquilibriumContribution, EquilibriumEstimate, Panel, RegimeProbabilities};

use crate::{fiscal_augmented, inputs, market_implied, real_rate_parity, regime_switching, state_space};

const TAYLOR_CARRY: (f64, f64) = (1.0, 0.3);
const TAYLOR_RISKOFF: (f64, f64) = (0.8, 0.2);
const TAYLOR_STRESS: (f64, f64) = (1.5, 0.1);

const BASE_WEIGHT_STATE_SPACE: f64 = 0.30;
const BASE_WEIGHT_MARKET_IMPLIED: f64 = 0.25;
const BASE_WEIGHT_FISCAL: f64 = 0.20;
const BASE_WEIGHT_PARITY: f64 = 0.15;
const BASE_WEIGHT_REGIME: f64 = 0.10;

struct ModelOutputs {
    fiscal: Option<fiscal_augmented::FiscalAugmentedEstimate>,
    parity: Option<f64>,
    market_implied: Option<market_implied::MarketImpliedEstimate>,
    state_space: Option<f64>,
    regime_switching: Option<f64>,
}

fn gather(panel: &Panel, at: MonthKey, regime: Option<&RegimeProbabilities>) -> ModelOutputs {
    ModelOutputs {
        fiscal: fiscal_augmented::estimate(panel, at),
        parity: real_rate_parity::estimate(panel, at),
        market_implied: market_implied::estimate(panel, at),
        state_space: state_space::estimate(panel, at),
        regime_switching: regime.and_then(|r| regime_switching::estimate(panel, at, r)),
    }
}

fn composite_from(outputs: &ModelOutputs) -> (f64, HashMap<String, EquilibriumContribution>) {
    let candidates: Vec<(&str, f64, Option<f64>)> = vec![
        ("state_space", BASE_WEIGHT_STATE_SPACE, outputs.state_space),
        (
            "market_implied",
            BASE_WEIGHT_MARKET_IMPLIED,
            outputs.market_implied.as_ref().map(|m| m.r_star),
        ),
        ("fiscal_augmented", BASE_WEIGHT_FISCAL, outputs.fiscal.as_ref().map(|f| f.r_star)),
        ("real_rate_parity", BASE_WEIGHT_PARITY, outputs.parity),
        ("regime_switching", BASE_WEIGHT_REGIME, outputs.regime_switching),
    ];

    let available_weight: f64 = candidates.iter().filter(|(_, _, v)| v.is_some()).map(|(_, w, _)| w).sum();
    let mut per_model = HashMap::new();
    let mut composite = 0.0;
    if available_weight > 0.0 {
        for (name, w, v) in &candidates {
            if let Some(r_star) = v {
                let normalised = w / available_weight;
                composite += normalised * r_star;
                per_model.insert(
                    name.to_string(),
                    EquilibriumContribution {
                        weight: normalised,
                        r_star: *r_star,
                    },
                );
            }
        }
    }
    (composite, per_model)
}

fn taylor_pi_target(at: MonthKey) -> f64 {
    // Glide from 4.5% (2020 and earlier) to 3.0% (2025 onward).
    let year = at.format("%Y").to_string().parse::<i32>().unwrap_or(2025);
    let t = ((year - 2020) as f64 / 5.0).clamp(0.0, 1.0);
    4.5 - 1.5 * t
}

fn taylor_coefficients(regime: &RegimeProbabilities) -> (f64, f64) {
    let (alpha_c, beta_c) = TAYLOR_CARRY;
    let (alpha_r, beta_r) = TAYLOR_RISKOFF;
    let (alpha_s, beta_s) = TAYLOR_STRESS;
    (
        regime.p_carry * alpha_c + regime.p_riskoff * alpha_r + regime.p_stress * alpha_s,
        regime.p_carry * beta_c + regime.p_riskoff * beta_r + regime.p_stress * beta_s,
    )
}

/// Initial (phase-one) estimate using neutral regime priors, before the
/// regime model has seen this month's features (spec §4.5).
pub fn initial_estimate(panel: &Panel, at: MonthKey) -> EquilibriumEstimate {
    let outputs = gather(panel, at, None);
    let (r_star_composite, per_model) = composite_from(&outputs);
    let selic_star = selic_star_neutral(panel, at, r_star_composite);

    EquilibriumEstimate {
        date: at,
        r_star_composite,
        selic_star,
        fiscal_decomposition: outputs.fiscal.map(|f| f.decomposition).unwrap_or_default(),
        per_model,
    }
}

fn selic_star_neutral(panel: &Panel, at: MonthKey, r_star_composite: f64) -> f64 {
    let pi_exp = panel.column(inputs::IPCA_EXPECTATIONS).and_then(|s| s.value_as_of(at)).unwrap_or(4.0);
    r_star_composite + pi_exp
}

/// Phase-two recompute with the regime probabilities that were just fit,
/// adding the regime-switching model to the mix (spec §4.5).
pub fn recompute_with_regime(
    panel: &Panel,
    at: MonthKey,
    regime: &RegimeProbabilities,
    pi_12m: Option<f64>,
    output_gap: Option<f64>,
) -> EquilibriumEstimate {
    let outputs = gather(panel, at, Some(regime));
    let (r_star_composite, per_model) = composite_from(&outputs);

    let pi_exp = panel.column(inputs::IPCA_EXPECTATIONS).and_then(|s| s.value_as_of(at)).unwrap_or(4.0);
    let (alpha, beta) = taylor_coefficients(regime);
    let pi_target = taylor_pi_target(at);
    let selic_star = r_star_composite
        + pi_exp
        + alpha * (pi_12m.unwrap_or(pi_exp) - pi_target)
        + beta * output_gap.unwrap_or(0.0);

    EquilibriumEstimate {
        date: at,
        r_star_composite,
        selic_star,
        fiscal_decomposition: outputs.fiscal.map(|f| f.decomposition).unwrap_or_default(),
        per_model,
    }
}
