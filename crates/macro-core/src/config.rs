use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{MacroRiskError, Result};
use crate::types::Instrument;

/// Per-regime position limit table, e.g. `{carry: 1.0, riskoff: 0.6, stress: 0.4}`.
pub type RegimeLimitTable = HashMap<String, f64>;

/// The single typed configuration record for the engine (spec §9). Every
/// option named in §9 has a field here with the documented default;
/// `EngineConfig::validated` is the only public constructor and raises
/// `ConfigError` before any data is loaded, matching spec §7's policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub training_window_months: usize,
    pub expanding_window: bool,
    pub min_training_months: usize,

    pub standardization_window_months: usize,
    pub std_floor: f64,

    pub valuation_half_life_months_fx: f64,

    pub ridge_lambda: f64,
    pub gamma: f64,
    pub turnover_penalty_bps: f64,

    pub transaction_costs_bps: HashMap<Instrument, f64>,
    pub tc_regime_multipliers: TcRegimeMultipliers,

    pub overlay_vol_target_annual: f64,

    pub drawdown_overlay: DrawdownOverlayConfig,

    pub position_limits: HashMap<Instrument, f64>,
    pub regime_position_limits: RegimePositionLimits,

    pub cov_window_months: usize,
    pub cov_shrinkage: bool,

    pub regime_refit_interval: usize,

    pub ic_gating_threshold: f64,
    pub ic_gating_min_obs: usize,
    pub ic_gating_floor: f64,

    pub score_demeaning_window: usize,
    pub score_demeaning_threshold: f64,

    pub feature_selection: FeatureSelectionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcRegimeMultipliers {
    pub carry: f64,
    pub riskoff: f64,
    pub stress: f64,
    pub domestic_stress: f64,
    pub domestic_calm: f64,
}

impl Default for TcRegimeMultipliers {
    fn default() -> Self {
        Self {
            carry: 1.0,
            riskoff: 1.5,
            stress: 2.5,
            domestic_stress: 2.0,
            domestic_calm: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawdownOverlayConfig {
    pub dd_5: f64,
    pub dd_10: f64,
    pub scale_at_dd_5: f64,
    pub scale_at_dd_10: f64,
    pub floor: f64,
}

impl Default for DrawdownOverlayConfig {
    fn default() -> Self {
        Self {
            dd_5: -0.05,
            dd_10: -0.10,
            scale_at_dd_5: 0.5,
            scale_at_dd_10: 0.0,
            floor: 0.10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimePositionLimits {
    pub carry: HashMap<Instrument, f64>,
    pub riskoff: HashMap<Instrument, f64>,
    pub stress: HashMap<Instrument, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSelectionConfig {
    pub enet_alpha_grid_size: usize,
    pub enet_l1_ratios: Vec<f64>,
    pub boruta_iterations: usize,
    pub boruta_max_depth: usize,
    pub boruta_trees: usize,
    pub stability_subsamples: usize,
    pub stability_subsample_fraction: f64,
    pub regime_refit_cooldown_months: usize,
}

impl Default for FeatureSelectionConfig {
    fn default() -> Self {
        Self {
            enet_alpha_grid_size: 50,
            enet_l1_ratios: vec![0.1, 0.2, 0.3, 0.5, 0.7, 0.9, 0.95, 1.0],
            boruta_iterations: 50,
            boruta_max_depth: 5,
            boruta_trees: 200,
            stability_subsamples: 40,
            stability_subsample_fraction: 0.8,
            regime_refit_cooldown_months: 6,
        }
    }
}

fn default_position_limits() -> HashMap<Instrument, f64> {
    HashMap::from([
        (Instrument::Fx, 1.0),
        (Instrument::Front, 1.5),
        (Instrument::Belly, 1.5),
        (Instrument::Long, 0.75),
        (Instrument::Hard, 1.0),
        (Instrument::Ntnb, 0.5),
    ])
}

fn default_transaction_costs() -> HashMap<Instrument, f64> {
    HashMap::from([
        (Instrument::Fx, 5.0),
        (Instrument::Front, 2.0),
        (Instrument::Belly, 3.0),
        (Instrument::Long, 4.0),
        (Instrument::Hard, 5.0),
        (Instrument::Ntnb, 4.0),
    ])
}

impl Default for EngineConfig {
    fn default() -> Self {
        let limits = default_position_limits();
        Self {
            training_window_months: 36,
            expanding_window: true,
            min_training_months: 36,
            standardization_window_months: 60,
            std_floor: 0.5,
            valuation_half_life_months_fx: 36.0,
            ridge_lambda: 10.0,
            gamma: 2.0,
            turnover_penalty_bps: 2.0,
            transaction_costs_bps: default_transaction_costs(),
            tc_regime_multipliers: TcRegimeMultipliers::default(),
            overlay_vol_target_annual: 0.10,
            drawdown_overlay: DrawdownOverlayConfig::default(),
            position_limits: limits.clone(),
            regime_position_limits: RegimePositionLimits {
                carry: limits.clone(),
                riskoff: limits.iter().map(|(k, v)| (*k, v * 0.7)).collect(),
                stress: limits.iter().map(|(k, v)| (*k, v * 0.4)).collect(),
            },
            cov_window_months: 36,
            cov_shrinkage: true,
            regime_refit_interval: 12,
            ic_gating_threshold: 0.0,
            ic_gating_min_obs: 24,
            ic_gating_floor: 0.15,
            score_demeaning_window: 60,
            score_demeaning_threshold: 0.005,
            feature_selection: FeatureSelectionConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Validate bounds and mandatory relationships, raising `ConfigError`
    /// before any data is loaded (spec §7).
    pub fn validated(self) -> Result<Self> {
        if self.min_training_months > self.training_window_months && !self.expanding_window {
            return Err(MacroRiskError::ConfigError(
                "min_training_months cannot exceed training_window_months in rolling mode".into(),
            ));
        }
        if self.std_floor <= 0.0 {
            return Err(MacroRiskError::ConfigError("std_floor must be positive".into()));
        }
        if self.gamma <= 0.0 {
            return Err(MacroRiskError::ConfigError("gamma (risk aversion) must be positive".into()));
        }
        if self.overlay_vol_target_annual <= 0.0 {
            return Err(MacroRiskError::ConfigError("overlay_vol_target_annual must be positive".into()));
        }
        if self.drawdown_overlay.dd_5 <= self.drawdown_overlay.dd_10 {
            return Err(MacroRiskError::ConfigError(
                "drawdown_overlay.dd_5 must be less severe (closer to zero) than dd_10".into(),
            ));
        }
        for (inst, &limit) in &self.position_limits {
            if limit <= 0.0 {
                return Err(MacroRiskError::ConfigError(format!(
                    "position limit for {inst} must be positive"
                )));
            }
        }
        if self.regime_refit_interval == 0 {
            return Err(MacroRiskError::ConfigError("regime_refit_interval must be >= 1".into()));
        }
        if self.ic_gating_floor < 0.0 || self.ic_gating_floor > 1.0 {
            return Err(MacroRiskError::ConfigError("ic_gating_floor must be in [0,1]".into()));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(EngineConfig::default().validated().is_ok());
    }

    #[test]
    fn inverted_drawdown_thresholds_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.drawdown_overlay.dd_5 = -0.20;
        cfg.drawdown_overlay.dd_10 = -0.05;
        assert!(cfg.validated().is_err());
    }

    #[test]
    fn non_positive_gamma_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.gamma = 0.0;
        assert!(cfg.validated().is_err());
    }
}
