//! Volatility targeting (spec §4.11 step 2): GARCH(1,1) one-step-ahead
//! forecast on the trailing 60 overlay monthly returns when ≥ 24 records
//! are available, else a 20-month sample standard deviation. Forecast
//! clamped to [2%, 50%] annualised; weights scaled by `min(1, target/σ)`.

use macro_core::MacroRiskError;

const GARCH_MIN_RECORDS: usize = 24;
const GARCH_WINDOW: usize = 60;
const SAMPLE_WINDOW: usize = 20;
const VOL_FLOOR_ANNUAL: f64 = 0.02;
const VOL_CEIL_ANNUAL: f64 = 0.50;

/// A fitted GARCH(1,1): `sigma2_t = omega + alpha*eps_{t-1}^2 + beta*sigma2_{t-1}`.
struct GarchFit {
    omega: f64,
    alpha: f64,
    beta: f64,
}

/// Fit by a small grid search over `(alpha, beta)` maximising the Gaussian
/// log-likelihood, `omega` backed out from the unconditional-variance
/// identity `omega = var*(1-alpha-beta)` at each candidate (a simplified,
/// deterministic stand-in for numerical MLE that stays within this
/// crate's no-toolchain, seed-free constraint — there is no random
/// component in this fit, so no step-seed is needed here).
fn fit_garch(returns: &[f64]) -> Option<GarchFit> {
    let n = returns.len();
    if n < GARCH_MIN_RECORDS {
        return None;
    }
    let mean = returns.iter().sum::<f64>() / n as f64;
    let sample_var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n as f64;
    if sample_var < 1e-12 {
        return None;
    }

    let mut best: Option<(f64, GarchFit)> = None;
    for &alpha in &[0.02, 0.05, 0.08, 0.12, 0.18] {
        for &beta in &[0.6, 0.7, 0.78, 0.85, 0.9] {
            if alpha + beta >= 0.999 {
                continue;
            }
            let omega = sample_var * (1.0 - alpha - beta);
            if omega <= 0.0 {
                continue;
            }
            let fit = GarchFit { omega, alpha, beta };
            let ll = log_likelihood(returns, mean, &fit);
            if best.as_ref().map(|(b, _)| ll > *b).unwrap_or(true) {
                best = Some((ll, fit));
            }
        }
    }
    best.map(|(_, fit)| fit)
}

fn log_likelihood(returns: &[f64], mean: f64, fit: &GarchFit) -> f64 {
    let mut sigma2 = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
    let mut ll = 0.0;
    for &r in returns {
        let eps = r - mean;
        ll += -0.5 * (sigma2.ln() + eps * eps / sigma2);
        sigma2 = fit.omega + fit.alpha * eps * eps + fit.beta * sigma2;
    }
    ll
}

fn forecast(returns: &[f64], fit: &GarchFit) -> f64 {
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let mut sigma2 = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
    for &r in returns {
        let eps = r - mean;
        sigma2 = fit.omega + fit.alpha * eps * eps + fit.beta * sigma2;
    }
    sigma2.sqrt()
}

/// `returns` is the overlay's trailing monthly returns, most recent last.
/// Returns the annualised forecast σ and, if the GARCH path fired, a
/// `FitFailure`-style note the caller may log (spec §7: GARCH
/// non-convergence falls back to the sample std, logged, not fatal).
pub fn forecast_annualised_vol(returns: &[f64]) -> (f64, Option<MacroRiskError>) {
    let window: Vec<f64> = returns.iter().rev().take(GARCH_WINDOW).rev().copied().collect();

    let (monthly_vol, warning) = match fit_garch(&window) {
        Some(fit) => (forecast(&window, &fit), None),
        None => {
            let sample: Vec<f64> = returns.iter().rev().take(SAMPLE_WINDOW).rev().copied().collect();
            if sample.len() < 2 {
                (0.0, Some(MacroRiskError::FitFailure("insufficient history for vol estimate".into())))
            } else {
                let mean = sample.iter().sum::<f64>() / sample.len() as f64;
                let var = sample.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / sample.len() as f64;
                let note = if returns.len() < GARCH_MIN_RECORDS {
                    Some(MacroRiskError::FitFailure("fewer than 24 overlay records, using sample std".into()))
                } else {
                    None
                };
                (var.sqrt(), note)
            }
        }
    };

    let annualised = (monthly_vol * 12f64.sqrt()).clamp(VOL_FLOOR_ANNUAL, VOL_CEIL_ANNUAL);
    (annualised, warning)
}

/// `min(1, vol_target / sigma_ann)` (spec §4.11 step 2).
pub fn scale(sigma_ann: f64, vol_target_annual: f64) -> f64 {
    if sigma_ann <= 1e-9 {
        1.0
    } else {
        (vol_target_annual / sigma_ann).min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_std_path_used_below_min_records() {
        let returns = vec![0.01, -0.01, 0.02, -0.015, 0.005];
        let (vol, warning) = forecast_annualised_vol(&returns);
        assert!(vol >= VOL_FLOOR_ANNUAL && vol <= VOL_CEIL_ANNUAL);
        assert!(warning.is_some());
    }

    #[test]
    fn garch_path_used_with_enough_records() {
        let mut returns = Vec::new();
        let mut state = 5u64;
        for _ in 0..50 {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            let u = (state >> 11) as f64 / (1u64 << 53) as f64;
            returns.push((u - 0.5) * 0.04);
        }
        let (vol, _) = forecast_annualised_vol(&returns);
        assert!(vol >= VOL_FLOOR_ANNUAL && vol <= VOL_CEIL_ANNUAL);
    }

    #[test]
    fn scale_never_exceeds_one() {
        assert!(scale(0.05, 0.10) <= 1.0);
        assert!((scale(0.20, 0.10) - 0.5).abs() < 1e-9);
    }
}
