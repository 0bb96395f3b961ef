//! Regime- and equilibrium-dependent feature columns that augment the
//! feature-engine panel before selection and ensemble fitting (spec §4.8's
//! `r_star`, `selic_gap`→`policy_gap`, `regime_signal` and per-tenor carry
//! columns feeding the interaction list in feature-selector's
//! `CANONICAL_INTERACTIONS`). These depend on the regime model and the
//! equilibrium composite, both owned by the production engine (spec §9
//! design notes: the two-pass r*/regime protocol belongs at the step
//! boundary, not hidden inside the feature engine), so they cannot live in
//! `feature-engine` itself.

use macro_core::types::MonthKey;
use macro_core::{Panel, Series, Unit};
use regime_model::RegimeModel;

use equilibrium_rate::inputs as eq_inputs;

/// Adds `r_star`, `selic_star`, `sovereign_component`, `policy_gap`,
/// `regime_signal` and per-tenor carry columns to a clone of `features`,
/// evaluated at every date `<= cutoff` in `features`'s own index. Each
/// date's value only ever consults data at or before that date (via
/// `Panel::as_of`/`value_as_of` semantics already enforced upstream), so
/// this preserves the no-look-ahead invariant row by row.
pub fn augment(features: &Panel, raw: &Panel, regime: &RegimeModel, cutoff: MonthKey) -> Panel {
    let mut out = features.clone();

    let mut r_star = Series::new("r_star", Unit::PctAnnual);
    let mut selic_star = Series::new("selic_star", Unit::PctAnnual);
    let mut sovereign_component = Series::new("sovereign_component", Unit::PctAnnual);
    let mut policy_gap = Series::new("policy_gap", Unit::PctAnnual);
    let mut regime_signal = Series::new("regime_signal", Unit::Ratio);
    let mut carry_front = Series::new("carry_front", Unit::PctAnnual);
    let mut carry_belly = Series::new("carry_belly", Unit::PctAnnual);
    let mut carry_long = Series::new("carry_long", Unit::PctAnnual);

    let di1 = raw.column(eq_inputs::DI_1Y);
    let di5 = raw.column(eq_inputs::DI_5Y);
    let di10 = raw.column(eq_inputs::DI_10Y);
    let cdi = raw.column(eq_inputs::CDI);

    for d in features.index() {
        if d > cutoff {
            continue;
        }
        let est = equilibrium_rate::initial_estimate(raw, d);
        r_star.insert(d, est.r_star_composite);
        selic_star.insert(d, est.selic_star);
        if let Some(&s) = est.fiscal_decomposition.get("sovereign") {
            sovereign_component.insert(d, s);
        }
        let actual_policy = cdi.and_then(|s| s.value_as_of(d));
        if let Some(actual) = actual_policy {
            policy_gap.insert(d, actual - est.selic_star);
        }

        let probs = regime.probs_at(raw, d);
        regime_signal.insert(d, probs.p_stress - probs.p_carry);

        if let (Some(d1), Some(c)) = (di1.and_then(|s| s.value_as_of(d)), actual_policy) {
            carry_front.insert(d, (d1 - c) / 12.0);
        }
        if let (Some(d5), Some(c)) = (di5.and_then(|s| s.value_as_of(d)), actual_policy) {
            carry_belly.insert(d, (d5 - c) / 12.0);
        }
        if let (Some(d10), Some(c)) = (di10.and_then(|s| s.value_as_of(d)), actual_policy) {
            carry_long.insert(d, (d10 - c) / 12.0);
        }
    }

    for s in [
        r_star,
        selic_star,
        sovereign_component,
        policy_gap,
        regime_signal,
        carry_front,
        carry_belly,
        carry_long,
    ] {
        out.insert(s);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use macro_core::{Series as S, Unit as U};

    fn md(y: i32, m: u32) -> MonthKey {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn sample_raw(months: usize) -> Panel {
        let mut p = Panel::new();
        let mut cdi = S::new(eq_inputs::CDI, U::PctAnnual);
        let mut pi_exp = S::new(eq_inputs::IPCA_EXPECTATIONS, U::PctAnnual);
        let mut di1 = S::new(eq_inputs::DI_1Y, U::PctAnnual);
        for i in 0..months {
            let d = md(2015 + (i as i32) / 12, (i as u32 % 12) + 1);
            cdi.insert(d, 12.0);
            pi_exp.insert(d, 4.0);
            di1.insert(d, 14.0);
        }
        p.insert(cdi);
        p.insert(pi_exp);
        p.insert(di1);
        p
    }

    #[test]
    fn augments_without_dropping_original_columns() {
        let raw = sample_raw(72);
        let mut features = Panel::new();
        features.insert(S::new("z_vix", U::Index));
        let regime = RegimeModel::fit(&raw, md(2020, 12));
        let out = augment(&features, &raw, &regime, md(2020, 12));
        assert!(out.column("z_vix").is_some());
        assert!(out.column("r_star").is_some());
        assert!(out.column("carry_front").is_some());
    }
}
