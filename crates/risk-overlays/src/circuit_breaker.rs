//! Circuit breaker (spec §4.11 step 3): when `P(risk-off) > 0.7` AND
//! `P(domestic stress) > 0.7` simultaneously, hard per-instrument cuts are
//! applied once, logged, on top of whatever the drawdown throttle and vol
//! targeting already produced. Regime scaling is explicitly not reapplied
//! here — it is already folded into `mu_adj` upstream — so this step only
//! ever shrinks weights further, never restores them.

use std::collections::HashMap;

use macro_core::types::Instrument;
use macro_core::RegimeProbabilities;
use tracing::warn;

const RISKOFF_THRESHOLD: f64 = 0.7;
const DOMESTIC_STRESS_THRESHOLD: f64 = 0.7;

fn hard_cut(instrument: Instrument) -> f64 {
    match instrument {
        Instrument::Belly | Instrument::Long => 0.5,
        Instrument::Hard | Instrument::Ntnb => 0.4,
        Instrument::Front => 0.7,
        Instrument::Fx => 1.0,
    }
}

/// Returns the weights after the breaker, and whether it fired this step
/// (the caller logs the firing exactly once, per spec).
pub fn apply(
    weights: &HashMap<Instrument, f64>,
    regime: &RegimeProbabilities,
) -> (HashMap<Instrument, f64>, bool) {
    let triggered = regime.p_riskoff > RISKOFF_THRESHOLD && regime.p_domestic_stress > DOMESTIC_STRESS_THRESHOLD;
    if !triggered {
        return (weights.clone(), false);
    }

    warn!(
        p_riskoff = regime.p_riskoff,
        p_domestic_stress = regime.p_domestic_stress,
        "circuit breaker triggered: applying hard instrument cuts"
    );

    let cut: HashMap<Instrument, f64> = weights
        .iter()
        .map(|(&inst, &w)| (inst, w * hard_cut(inst)))
        .collect();
    (cut, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_weights() -> HashMap<Instrument, f64> {
        Instrument::ALL.iter().map(|&i| (i, 0.10)).collect()
    }

    #[test]
    fn does_not_fire_below_joint_threshold() {
        let mut regime = RegimeProbabilities::uniform_fallback();
        regime.p_riskoff = 0.8;
        regime.p_domestic_stress = 0.5;
        let (out, fired) = apply(&flat_weights(), &regime);
        assert!(!fired);
        assert!((out[&Instrument::Belly] - 0.10).abs() < 1e-9);
    }

    #[test]
    fn fires_and_cuts_belly_and_long_in_half() {
        let mut regime = RegimeProbabilities::uniform_fallback();
        regime.p_riskoff = 0.85;
        regime.p_domestic_stress = 0.9;
        let (out, fired) = apply(&flat_weights(), &regime);
        assert!(fired);
        assert!((out[&Instrument::Belly] - 0.05).abs() < 1e-9);
        assert!((out[&Instrument::Long] - 0.05).abs() < 1e-9);
        assert!((out[&Instrument::Hard] - 0.04).abs() < 1e-9);
        assert!((out[&Instrument::Ntnb] - 0.04).abs() < 1e-9);
        assert!((out[&Instrument::Front] - 0.07).abs() < 1e-9);
        assert!((out[&Instrument::Fx] - 0.10).abs() < 1e-9);
    }
}
