//! Regime Model (spec §4.6): two independent Gaussian HMMs (global 3-state,
//! domestic 2-state) with an expanding-window refit cadence and a uniform
//! fallback on fit failure.

pub mod domestic;
pub mod global;
pub mod hmm;

use macro_core::types::MonthKey;
use macro_core::{Panel, RegimeProbabilities};
use tracing::warn;

use hmm::GaussianHmm;

const EM_ITERATIONS: usize = 25;

#[derive(Clone)]
pub struct RegimeModel {
    global: Option<(GaussianHmm, [usize; 3])>,
    domestic: Option<(GaussianHmm, [usize; 2])>,
    pub fitted_at: MonthKey,
}

impl RegimeModel {
    /// Fit both HMMs on data up to (and including) `at`. A model that fails
    /// to fit (too little data, singular covariance) is left `None`; its
    /// probabilities fall back to uniform priors and the event is logged
    /// (spec §4.6, §7 `FitFailure` policy).
    pub fn fit(panel: &Panel, at: MonthKey) -> Self {
        let global = global::build_observations(panel, at).and_then(|obs| {
            global::fit(&obs, EM_ITERATIONS).map(|hmm| {
                let order = global::label_order(&hmm);
                (hmm, order)
            })
        });
        if global.is_none() {
            warn!(date = %at, "global regime HMM fit failed, falling back to uniform priors");
        }

        let domestic = domestic::build_observations(panel, at).and_then(|obs| {
            domestic::fit(&obs, EM_ITERATIONS).map(|hmm| {
                let order = domestic::label_order(&hmm);
                (hmm, order)
            })
        });
        if domestic.is_none() {
            warn!(date = %at, "domestic regime HMM fit failed, falling back to uniform priors");
        }

        Self {
            global,
            domestic,
            fitted_at: at,
        }
    }

    /// Filtered regime probabilities at `at`, using only data up to `at`
    /// (causal, spec §4.6). Either level independently falls back to
    /// uniform priors if its HMM never fit.
    pub fn probs_at(&self, panel: &Panel, at: MonthKey) -> RegimeProbabilities {
        let mut fallback = false;

        let (p_carry, p_riskoff, p_stress) = match &self.global {
            Some((hmm, order)) => match global::build_observations(panel, at) {
                Some(obs) => {
                    let filtered = hmm.filtered_probabilities(&obs.vectors);
                    let last = filtered.last();
                    match last {
                        Some(p) => (p[order[0]], p[order[2]], p[order[1]]),
                        None => {
                            fallback = true;
                            (1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0)
                        }
                    }
                }
                None => {
                    fallback = true;
                    (1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0)
                }
            },
            None => {
                fallback = true;
                (1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0)
            }
        };

        let (p_calm, p_dom_stress) = match &self.domestic {
            Some((hmm, order)) => match domestic::build_observations(panel, at) {
                Some(obs) => {
                    let filtered = hmm.filtered_probabilities(&obs.vectors);
                    match filtered.last() {
                        Some(p) => (p[order[0]], p[order[1]]),
                        None => {
                            fallback = true;
                            (0.5, 0.5)
                        }
                    }
                }
                None => {
                    fallback = true;
                    (0.5, 0.5)
                }
            },
            None => {
                fallback = true;
                (0.5, 0.5)
            }
        };

        RegimeProbabilities {
            p_carry,
            p_riskoff,
            p_stress,
            p_domestic_calm: p_calm,
            p_domestic_stress: p_dom_stress,
            is_fallback: fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use macro_core::{Panel, Series, Unit};

    fn md(y: i32, m: u32) -> chrono::NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn synthetic_panel(months: usize) -> Panel {
        let mut p = Panel::new();
        let mut state = 7u64;
        let mut next = || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            ((state >> 11) as f64 / (1u64 << 53) as f64 - 0.5) * 2.0
        };

        let mut dxy = Series::new(global::DXY, Unit::Index);
        let mut vix = Series::new(global::VIX, Unit::Index);
        let mut ust10 = Series::new(global::UST_10Y, Unit::PctAnnual);
        let mut hy = Series::new(global::US_HY_OAS, Unit::Bps);
        let mut bcom = Series::new(global::BCOM, Unit::Index);
        let mut ewz = Series::new(global::EWZ, Unit::Index);
        let mut cds = Series::new(domestic::CDS_BPS, Unit::Bps);
        let mut fx = Series::new(domestic::FX_RETURNS, Unit::Ratio);
        let mut debt = Series::new(domestic::DEBT_GDP, Unit::Ratio);
        let mut reer = Series::new(domestic::REER, Unit::Index);
        let mut di10 = Series::new(domestic::DI_10Y, Unit::PctAnnual);
        let mut di1 = Series::new(domestic::DI_1Y, Unit::PctAnnual);

        for i in 0..months {
            let d = md(2010 + (i as i32) / 12, (i as u32 % 12) + 1);
            let noise = next();
            dxy.insert(d, 100.0 + noise);
            vix.insert(d, 15.0 + noise.abs() * 5.0);
            ust10.insert(d, 2.0 + noise * 0.1);
            hy.insert(d, 400.0 + noise * 10.0);
            bcom.insert(d, 90.0 + noise);
            ewz.insert(d, 40.0 + noise);
            cds.insert(d, 200.0 + noise * 10.0);
            fx.insert(d, noise * 0.02);
            debt.insert(d, 70.0 + noise);
            reer.insert(d, 100.0 + noise);
            di10.insert(d, 10.0 + noise * 0.2);
            di1.insert(d, 9.0 + noise * 0.2);
        }

        for s in [dxy, ust10, hy, bcom, ewz, reer, di10, di1] {
            p.insert(s);
        }
        p.insert(vix);
        p.insert(cds);
        p.insert(fx);
        p.insert(debt);
        p
    }

    #[test]
    fn probabilities_sum_to_one_within_each_level() {
        let panel = synthetic_panel(80);
        let at = md(2016, 8);
        let model = RegimeModel::fit(&panel, at);
        let probs = model.probs_at(&panel, at);
        assert!((probs.p_carry + probs.p_riskoff + probs.p_stress - 1.0).abs() < 1e-6);
        assert!((probs.p_domestic_calm + probs.p_domestic_stress - 1.0).abs() < 1e-6);
    }

    #[test]
    fn insufficient_data_falls_back_to_uniform() {
        let panel = synthetic_panel(6);
        let at = md(2010, 6);
        let model = RegimeModel::fit(&panel, at);
        let probs = model.probs_at(&panel, at);
        assert!(probs.is_fallback);
        assert!((probs.p_carry - 1.0 / 3.0).abs() < 1e-9);
    }
}
