//! Score demeaning and regime scaling (spec §4.9).

use std::collections::HashMap;

use macro_core::types::{Instrument, RegimeProbabilities};

/// Rolling buffer of the last `window` raw composite scores (spec §4.9:
/// `S_t = Σ_inst mu_inst`, default window 60).
#[derive(Debug, Clone, Default)]
pub struct ScoreBuffer {
    pub history: Vec<f64>,
    pub window: usize,
}

impl ScoreBuffer {
    pub fn new(window: usize) -> Self {
        Self { history: Vec::new(), window }
    }

    pub fn push(&mut self, raw_score: f64) {
        self.history.push(raw_score);
        if self.history.len() > self.window {
            let drop = self.history.len() - self.window;
            self.history.drain(0..drop);
        }
    }

    fn mean_std(&self) -> (f64, f64) {
        let n = self.history.len();
        if n == 0 {
            return (0.0, 0.0);
        }
        let mean = self.history.iter().sum::<f64>() / n as f64;
        let var = self.history.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
        (mean, var.sqrt())
    }

    /// Demeaned score `(S - mean_60) / max(std_60, 0.5)` (spec §4.9).
    pub fn demeaned(&self, raw_score: f64, std_floor: f64) -> f64 {
        let (mean, std) = self.mean_std();
        (raw_score - mean) / std.max(std_floor)
    }
}

/// Scale each `mu_inst` by `S̃/S` when `|S| > threshold`, clipped to
/// [-3, 3]; otherwise pass through unchanged (spec §4.9: "pass-through near
/// zero" — this clamp must not fire for scores near zero, since dividing
/// by a near-zero `S` would blow the ratio up rather than damp it).
pub fn apply_score_demeaning(mu: &HashMap<Instrument, f64>, raw_score: f64, demeaned_score: f64, threshold: f64) -> HashMap<Instrument, f64> {
    if raw_score.abs() <= threshold {
        return mu.clone();
    }
    let ratio = (demeaned_score / raw_score).clamp(-3.0, 3.0);
    mu.iter().map(|(&inst, &m)| (inst, m * ratio)).collect()
}

/// The global-level scale table (spec §4.9: "the more aggressive
/// dampener"). FX and the long end of the curve carry the deepest cuts in
/// risk-off/stress since they are the most liquidity- and carry-sensitive
/// legs of the book; the belly and front buckets are dampened less.
fn global_multiplier(inst: Instrument, regime: macro_core::types::GlobalRegime) -> f64 {
    use macro_core::types::GlobalRegime::*;
    use Instrument::*;
    match (regime, inst) {
        (Carry, _) => 1.0,
        (RiskOff, Fx) => 0.55,
        (RiskOff, Front) => 0.75,
        (RiskOff, Belly) => 0.65,
        (RiskOff, Long) => 0.55,
        (RiskOff, Hard) => 0.60,
        (RiskOff, Ntnb) => 0.70,
        (Stress, Fx) => 0.25,
        (Stress, Front) => 0.45,
        (Stress, Belly) => 0.35,
        (Stress, Long) => 0.25,
        (Stress, Hard) => 0.30,
        (Stress, Ntnb) => 0.40,
    }
}

/// The domestic-level scale table (spec §4.9: "the softer overlay") — a
/// shallower dampener layered on top of the global one, since domestic
/// stress without global stress is a milder, more localised regime.
fn domestic_multiplier(inst: Instrument, regime: macro_core::types::DomesticRegime) -> f64 {
    use macro_core::types::DomesticRegime::*;
    use Instrument::*;
    match (regime, inst) {
        (Calm, _) => 1.0,
        (Stress, Fx) => 0.80,
        (Stress, Front) => 0.90,
        (Stress, Belly) => 0.85,
        (Stress, Long) => 0.80,
        (Stress, Hard) => 0.85,
        (Stress, Ntnb) => 0.85,
    }
}

/// Probability-weighted blend of the global 3-state table and the
/// domestic 2-state table (spec §4.9: `global_scale_inst(p_carry,
/// p_riskoff, p_stress) · domestic_scale_inst(p_calm, p_dom_stress)`).
pub fn regime_scale(inst: Instrument, regime: &RegimeProbabilities) -> f64 {
    use macro_core::types::{DomesticRegime, GlobalRegime};
    let global = regime.p_carry * global_multiplier(inst, GlobalRegime::Carry)
        + regime.p_riskoff * global_multiplier(inst, GlobalRegime::RiskOff)
        + regime.p_stress * global_multiplier(inst, GlobalRegime::Stress);
    let domestic = regime.p_domestic_calm * domestic_multiplier(inst, DomesticRegime::Calm)
        + regime.p_domestic_stress * domestic_multiplier(inst, DomesticRegime::Stress);
    global * domestic
}

pub fn apply_regime_scaling(mu: &HashMap<Instrument, f64>, regime: &RegimeProbabilities) -> HashMap<Instrument, f64> {
    mu.iter().map(|(&inst, &m)| (inst, m * regime_scale(inst, regime))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_buffer_caps_at_window() {
        let mut buf = ScoreBuffer::new(60);
        for i in 0..100 {
            buf.push(i as f64);
        }
        assert_eq!(buf.history.len(), 60);
    }

    #[test]
    fn near_zero_score_passes_through() {
        let mu = HashMap::from([(Instrument::Fx, 0.2)]);
        let out = apply_score_demeaning(&mu, 0.001, 5.0, 0.005);
        assert_eq!(out[&Instrument::Fx], 0.2);
    }

    #[test]
    fn scaling_clips_to_bounds() {
        let mu = HashMap::from([(Instrument::Fx, 0.2)]);
        let out = apply_score_demeaning(&mu, 0.01, 100.0, 0.005);
        assert!((out[&Instrument::Fx] - 0.6).abs() < 1e-9);
    }

    #[test]
    fn stress_dampens_more_than_carry() {
        let stress = RegimeProbabilities {
            p_carry: 0.0,
            p_riskoff: 0.0,
            p_stress: 1.0,
            p_domestic_calm: 1.0,
            p_domestic_stress: 0.0,
            is_fallback: false,
        };
        let carry = RegimeProbabilities {
            p_carry: 1.0,
            p_riskoff: 0.0,
            p_stress: 0.0,
            p_domestic_calm: 1.0,
            p_domestic_stress: 0.0,
            is_fallback: false,
        };
        assert!(regime_scale(Instrument::Fx, &stress) < regime_scale(Instrument::Fx, &carry));
    }
}
