//! IC gating (spec §4.8): a soft, never-zero scale applied to the ensemble
//! mean based on the last 36 OOS (predicted, realised) pairs.

/// `IC(inst) = corr(predicted, realised)` over the trailing OOS pairs.
/// Returns `None` if fewer than `min_obs` pairs are available (spec: "≥ 24
/// required").
pub fn information_coefficient(predicted: &[f64], realised: &[f64], min_obs: usize) -> Option<f64> {
    let n = predicted.len().min(realised.len());
    if n < min_obs {
        return None;
    }
    let predicted = &predicted[predicted.len() - n..];
    let realised = &realised[realised.len() - n..];
    let mean = |xs: &[f64]| xs.iter().sum::<f64>() / xs.len() as f64;
    let pm = mean(predicted);
    let rm = mean(realised);
    let mut cov = 0.0;
    let mut var_p = 0.0;
    let mut var_r = 0.0;
    for i in 0..n {
        let dp = predicted[i] - pm;
        let dr = realised[i] - rm;
        cov += dp * dr;
        var_p += dp * dp;
        var_r += dr * dr;
    }
    if var_p < 1e-12 || var_r < 1e-12 {
        return Some(0.0);
    }
    Some(cov / (var_p.sqrt() * var_r.sqrt()))
}

/// The empirical ceiling an IC could plausibly reach; used to normalise the
/// boost/penalty scale. Spec leaves the exact `IC_max` unspecified (§9 open
/// question); 0.3 is the conventional "excellent" IC ceiling used across
/// the cross-sectional-alpha literature this spec draws on.
pub const IC_MAX: f64 = 0.3;

/// Scale factor applied to `mu` (spec §4.8): below threshold, shrink
/// smoothly toward `floor` as IC worsens; above threshold (including
/// positive ICs), boost up to 1.5x proportional to `IC / IC_max`. Always
/// strictly positive — a soft gate, never zero.
pub fn gate_scale(ic: f64, threshold: f64, floor: f64) -> f64 {
    if ic < threshold {
        ((ic + 0.1) / (IC_MAX + 0.1)).max(floor)
    } else {
        (1.0 + 0.5 * (ic / IC_MAX).clamp(0.0, 1.0)).min(1.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_correlation_gives_ic_one() {
        let xs: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let ic = information_coefficient(&xs, &xs, 24).unwrap();
        assert!((ic - 1.0).abs() < 1e-9);
    }

    #[test]
    fn insufficient_history_returns_none() {
        let xs = vec![0.1; 10];
        assert!(information_coefficient(&xs, &xs, 24).is_none());
    }

    #[test]
    fn gate_scale_never_reaches_zero() {
        let scale = gate_scale(-0.5, 0.0, 0.15);
        assert!(scale >= 0.15);
        assert!(scale > 0.0);
    }

    #[test]
    fn positive_ic_boosts_above_one() {
        let scale = gate_scale(0.2, 0.0, 0.15);
        assert!(scale > 1.0);
        assert!(scale <= 1.5);
    }
}
