//! Bootstrap stability scoring (spec §4.7 step 5) and instability alerts
//! (step 6): run fast Elastic-Net/Boruta/RF variants over many bootstrap
//! subsamples, combine into a composite score, classify by adaptive
//! (percentile) thresholds, and diff against the previous persisted
//! snapshot to emit alerts.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::boruta;
use crate::dataset::Dataset;
use crate::elastic_net;
use crate::tree::forest_importance;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum StabilityClass {
    Robust,
    Moderate,
    Unstable,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FeatureStability {
    pub feature: String,
    pub enet_freq: f64,
    pub boruta_freq: f64,
    pub rf_importance_avg: f64,
    pub composite: f64,
    pub class: StabilityClass,
}

const FAST_BORUTA_ITERATIONS: usize = 10;

pub fn score(dataset: &Dataset, n_subsamples: usize, subsample_fraction: f64, seed: u64) -> Vec<FeatureStability> {
    let p = dataset.p();
    let n = dataset.n();
    let subsample_n = ((n as f64) * subsample_fraction).round().max(1.0) as usize;

    let mut enet_hits = vec![0usize; p];
    let mut boruta_hits = vec![0usize; p];
    let mut rf_importances: Vec<Vec<f64>> = vec![Vec::new(); p];

    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    for s in 0..n_subsamples.max(1) {
        let mut idx: Vec<usize> = (0..n).collect();
        idx.shuffle(&mut rng);
        idx.truncate(subsample_n);
        if idx.len() < 10 {
            continue;
        }
        let sub = dataset.subsample(&idx);

        let selected = elastic_net::fast_select(&sub, 0.5);
        for name in &selected {
            if let Some(j) = dataset.feature_names.iter().position(|n| n == name) {
                enet_hits[j] += 1;
            }
        }

        let boruta_result = boruta::run(&sub.rows, &sub.y, FAST_BORUTA_ITERATIONS, 50, 5, seed.wrapping_add(s as u64));
        for (j, verdict) in boruta_result.verdicts.iter().enumerate() {
            if !matches!(verdict, boruta::BorutaVerdict::Rejected) {
                boruta_hits[j] += 1;
            }
        }

        let imp = forest_importance(&sub.rows, &sub.y, 50, 5, seed.wrapping_add(1_000 + s as u64));
        for j in 0..p.min(imp.len()) {
            rf_importances[j].push(imp[j]);
        }
    }

    let n_runs = n_subsamples.max(1) as f64;
    let mut composites = Vec::with_capacity(p);
    for j in 0..p {
        let enet_freq = enet_hits[j] as f64 / n_runs;
        let boruta_freq = boruta_hits[j] as f64 / n_runs;
        let rf_norm = if rf_importances[j].is_empty() {
            0.0
        } else {
            rf_importances[j].iter().sum::<f64>() / rf_importances[j].len() as f64
        };
        let composite = 0.4 * enet_freq + 0.3 * boruta_freq + 0.3 * rf_norm;
        composites.push((dataset.feature_names[j].clone(), enet_freq, boruta_freq, rf_norm, composite));
    }

    let (robust_cut, moderate_cut) = adaptive_thresholds(&composites.iter().map(|c| c.4).collect::<Vec<_>>());

    composites
        .into_iter()
        .map(|(feature, enet_freq, boruta_freq, rf_importance_avg, composite)| {
            let class = if composite >= robust_cut {
                StabilityClass::Robust
            } else if composite >= moderate_cut {
                StabilityClass::Moderate
            } else {
                StabilityClass::Unstable
            };
            FeatureStability {
                feature,
                enet_freq,
                boruta_freq,
                rf_importance_avg,
                composite,
                class,
            }
        })
        .collect()
}

/// P75/P40 cutoffs with a minimum 0.05 gap enforced between them (spec
/// §4.7.5): if the natural percentiles would straddle less than 0.05 apart,
/// the moderate cutoff is pushed down to widen the band.
fn adaptive_thresholds(composites: &[f64]) -> (f64, f64) {
    if composites.is_empty() {
        return (0.75, 0.40);
    }
    let mut sorted = composites.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let p75 = percentile(&sorted, 0.75);
    let mut p40 = percentile(&sorted, 0.40);
    if p75 - p40 < 0.05 {
        p40 = p75 - 0.05;
    }
    (p75, p40)
}

fn percentile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = pos - lo as f64;
        sorted[lo] * (1.0 - frac) + sorted[hi] * frac
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AlertSeverity {
    Critical,
    Warning,
    Info,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct InstabilityAlert {
    pub feature: String,
    pub severity: AlertSeverity,
    pub from: StabilityClass,
    pub to: StabilityClass,
}

/// Diff the current classification against the previous snapshot (spec
/// §4.7 step 6): critical on robust->unstable, warning on robust->moderate,
/// info on unstable->robust.
pub fn diff_alerts(previous: &HashMap<String, StabilityClass>, current: &[FeatureStability]) -> Vec<InstabilityAlert> {
    let mut alerts = Vec::new();
    for f in current {
        let Some(&prev_class) = previous.get(&f.feature) else {
            continue;
        };
        let severity = match (prev_class, f.class) {
            (StabilityClass::Robust, StabilityClass::Unstable) => Some(AlertSeverity::Critical),
            (StabilityClass::Robust, StabilityClass::Moderate) => Some(AlertSeverity::Warning),
            (StabilityClass::Unstable, StabilityClass::Robust) => Some(AlertSeverity::Info),
            _ => None,
        };
        if let Some(severity) = severity {
            alerts.push(InstabilityAlert {
                feature: f.feature.clone(),
                severity,
                from: prev_class,
                to: f.class,
            });
        }
    }
    alerts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_partitions_all_features() {
        let mut rows = Vec::new();
        let mut ys = Vec::new();
        let mut state = 2u64;
        let mut noise = || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            (state >> 11) as f64 / (1u64 << 53) as f64
        };
        for i in 0..80 {
            let x1 = (i as f64 * 0.1).sin();
            let x2 = noise();
            let x3 = noise();
            rows.push(vec![x1, x2, x3]);
            ys.push(2.0 * x1 + 0.01 * noise());
        }
        let ds = Dataset {
            feature_names: vec!["x1".into(), "x2".into(), "x3".into()],
            rows,
            y: ys,
        };
        let result = score(&ds, 15, 0.8, 9);
        assert_eq!(result.len(), 3);
        let (mut robust, mut moderate, mut unstable) = (0, 0, 0);
        for f in &result {
            match f.class {
                StabilityClass::Robust => robust += 1,
                StabilityClass::Moderate => moderate += 1,
                StabilityClass::Unstable => unstable += 1,
            }
        }
        assert_eq!(robust + moderate + unstable, 3);
    }

    #[test]
    fn robust_to_unstable_is_critical() {
        let mut prev = HashMap::new();
        prev.insert("x".to_string(), StabilityClass::Robust);
        let current = vec![FeatureStability {
            feature: "x".into(),
            enet_freq: 0.0,
            boruta_freq: 0.0,
            rf_importance_avg: 0.0,
            composite: 0.0,
            class: StabilityClass::Unstable,
        }];
        let alerts = diff_alerts(&prev, &current);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, AlertSeverity::Critical);
    }
}
