//! Drawdown throttle (spec §4.11 step 1): piecewise linear interpolation
//! between `(0, 1.0)`, `(dd_5, scale_at_dd_5)`, `(dd_10, scale_at_dd_10)`,
//! floored for recovery.

use macro_core::DrawdownOverlayConfig;

/// Scale factor for the current overlay drawdown `dd` (`dd <= 0`), per the
/// three-point piecewise-linear table in `cfg`, floored at `cfg.floor`.
pub fn scale(dd: f64, cfg: &DrawdownOverlayConfig) -> f64 {
    let dd = dd.min(0.0);
    let raw = if dd >= cfg.dd_5 {
        // Between 0 and dd_5: interpolate 1.0 -> scale_at_dd_5.
        let t = if cfg.dd_5.abs() < 1e-12 { 0.0 } else { dd / cfg.dd_5 };
        1.0 + t * (cfg.scale_at_dd_5 - 1.0)
    } else if dd >= cfg.dd_10 {
        // Between dd_5 and dd_10: interpolate scale_at_dd_5 -> scale_at_dd_10.
        let span = cfg.dd_10 - cfg.dd_5;
        let t = if span.abs() < 1e-12 { 0.0 } else { (dd - cfg.dd_5) / span };
        cfg.scale_at_dd_5 + t * (cfg.scale_at_dd_10 - cfg.scale_at_dd_5)
    } else {
        cfg.scale_at_dd_10
    };
    raw.max(cfg.floor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> DrawdownOverlayConfig {
        DrawdownOverlayConfig {
            dd_5: -0.05,
            dd_10: -0.10,
            scale_at_dd_5: 0.5,
            scale_at_dd_10: 0.0,
            floor: 0.10,
        }
    }

    #[test]
    fn no_drawdown_gives_full_scale() {
        assert!((scale(0.0, &cfg()) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn five_consecutive_two_percent_losses_floor_at_point_one() {
        // Cumulative drawdown after five -2% months: (0.98)^5 - 1 ≈ -9.6%,
        // which interpolates to ≈ 0.04 before the floor clamps it to 0.10
        // (spec §8 scenario S4).
        let dd = 0.98f64.powi(5) - 1.0;
        let s = scale(dd, &cfg());
        assert!((s - 0.10).abs() < 1e-9);
    }

    #[test]
    fn halfway_between_five_and_ten_percent_interpolates() {
        let s = scale(-0.075, &cfg());
        assert!((s - 0.25).abs() < 1e-6);
    }

    #[test]
    fn beyond_ten_percent_stays_at_floor() {
        let s = scale(-0.25, &cfg());
        assert!((s - 0.10).abs() < 1e-9);
    }
}
