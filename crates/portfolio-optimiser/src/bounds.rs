//! Regime-blended position bounds and transaction-cost multipliers (spec
//! §4.10): a linear blend by regime probability of the three per-regime
//! limit tables, and the tc regime multiplier.

use macro_core::types::{GlobalRegime, Instrument, RegimeProbabilities};
use macro_core::{EngineConfig, TcRegimeMultipliers};

/// `[L_i, U_i]` at this date, blended across the three global-regime
/// tables by their probabilities (spec §4.10).
pub fn blended_bounds(instrument: Instrument, regime: &RegimeProbabilities, cfg: &EngineConfig) -> (f64, f64) {
    let limits = &cfg.regime_position_limits;
    let carry = limits.carry.get(&instrument).copied().unwrap_or(1.0);
    let riskoff = limits.riskoff.get(&instrument).copied().unwrap_or(carry * 0.7);
    let stress = limits.stress.get(&instrument).copied().unwrap_or(carry * 0.4);

    let limit = regime.p_carry * carry + regime.p_riskoff * riskoff + regime.p_stress * stress;
    (-limit, limit)
}

/// The tc regime multiplier (spec §4.10): a global-level blend (carry/
/// risk-off/stress) times a domestic-level blend (calm/stress), matching
/// the two-table multiplicative pattern used for regime-scaling in
/// `alpha-ensemble::demean` (spec §4.9's own global×domestic construction).
pub fn tc_regime_multiplier(regime: &RegimeProbabilities, table: &TcRegimeMultipliers) -> f64 {
    let global = regime.p_carry * table.carry + regime.p_riskoff * table.riskoff + regime.p_stress * table.stress;
    let domestic = regime.p_domestic_calm * table.domestic_calm + regime.p_domestic_stress * table.domestic_stress;
    global * domestic / table.carry.max(1e-9)
}

pub fn dominant_regime(regime: &RegimeProbabilities) -> GlobalRegime {
    regime.global_dominant()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stress_regime_tightens_bounds() {
        let cfg = EngineConfig::default();
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
        let (lo_s, hi_s) = blended_bounds(Instrument::Belly, &stress, &cfg);
        let (lo_c, hi_c) = blended_bounds(Instrument::Belly, &carry, &cfg);
        assert!(hi_s < hi_c);
        assert!(lo_s > lo_c);
    }

    #[test]
    fn tc_multiplier_is_one_in_calm_carry() {
        let table = TcRegimeMultipliers::default();
        let calm_carry = RegimeProbabilities {
            p_carry: 1.0,
            p_riskoff: 0.0,
            p_stress: 0.0,
            p_domestic_calm: 1.0,
            p_domestic_stress: 0.0,
            is_fallback: false,
        };
        let mult = tc_regime_multiplier(&calm_carry, &table);
        assert!((mult - 1.0).abs() < 1e-9);
    }
}
