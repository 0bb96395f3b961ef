//! Risk overlays (spec §4.11): applied to optimiser output, in order —
//! drawdown throttle, volatility targeting, circuit breaker. Regime
//! scaling is not reapplied here; it is already folded into `mu_adj`
//! upstream (alpha-ensemble's score-demeaning tail), and reapplying it
//! would double-count the same dampening.

pub mod circuit_breaker;
pub mod drawdown;
pub mod vol_target;

use std::collections::HashMap;

use macro_core::types::Instrument;
use macro_core::{EngineConfig, RegimeProbabilities};

/// Everything the production engine needs to log or report about this
/// step's overlay pass, beyond the adjusted weights themselves.
pub struct OverlayOutput {
    pub weights: HashMap<Instrument, f64>,
    pub drawdown_scale: f64,
    pub vol_scale: f64,
    pub vol_forecast_annual: f64,
    pub circuit_breaker_fired: bool,
}

/// Applies all three overlays to `raw_weights` in spec order.
///
/// - `overlay_drawdown` is the current overlay equity drawdown from its
///   trailing peak (`<= 0`).
/// - `overlay_monthly_returns` is the overlay's trailing monthly return
///   history, most recent last, used for the vol forecast.
pub fn apply(
    raw_weights: &HashMap<Instrument, f64>,
    overlay_drawdown: f64,
    overlay_monthly_returns: &[f64],
    regime: &RegimeProbabilities,
    cfg: &EngineConfig,
) -> OverlayOutput {
    let dd_scale = drawdown::scale(overlay_drawdown, &cfg.drawdown_overlay);

    let (vol_forecast_annual, warning) = vol_target::forecast_annualised_vol(overlay_monthly_returns);
    if let Some(err) = &warning {
        tracing::warn!(%err, "volatility targeting fell back to the sample-std path");
    }
    let vol_scale = vol_target::scale(vol_forecast_annual, cfg.overlay_vol_target_annual);

    let throttled: HashMap<Instrument, f64> = raw_weights
        .iter()
        .map(|(&inst, &w)| (inst, w * dd_scale * vol_scale))
        .collect();

    let (weights, circuit_breaker_fired) = circuit_breaker::apply(&throttled, regime);

    OverlayOutput {
        weights,
        drawdown_scale: dd_scale,
        vol_scale,
        vol_forecast_annual,
        circuit_breaker_fired,
    }
}
