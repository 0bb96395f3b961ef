//! Feature Selector (spec §4.7): dual Elastic-Net/Boruta selection with
//! interaction validation and bootstrap stability scoring, per instrument
//! per decision date.

pub mod boruta;
pub mod dataset;
pub mod elastic_net;
pub mod interactions;
pub mod snapshot;
pub mod stability;
pub mod tree;

use chrono::NaiveDate;
use macro_core::EngineConfig;

pub use dataset::Dataset;
use stability::{FeatureStability, InstabilityAlert};

/// `ModelArtefact`'s feature-subset block (spec §3, §4.7 step 7): the
/// linear set (Elastic-Net, feeds Ridge), the nonlinear set (Boruta
/// confirmed ∪ tentative, feeds GBM/RF/XGBoost) and their union including
/// confirmed interactions (the merged set carried into prediction frames).
#[derive(Debug, Clone)]
pub struct FeatureSelectionResult {
    pub date: NaiveDate,
    pub instrument: String,
    pub linear_set: Vec<String>,
    pub nonlinear_set: Vec<String>,
    pub merged_set: Vec<String>,
    pub elastic_net_coefficient_path: Vec<(f64, Vec<f64>)>,
    pub boruta_confirmed: Vec<String>,
    pub boruta_tentative: Vec<String>,
    pub boruta_rejected: Vec<String>,
    pub interaction_features_admitted: Vec<String>,
    pub stability: Vec<FeatureStability>,
    pub alerts: Vec<InstabilityAlert>,
}

/// A step-dependent, instrument-dependent deterministic seed (spec §5):
/// every random call downstream (bootstrap indices, Boruta shuffles, forest
/// bagging) derives from this so a given `(date, instrument)` reproduces
/// byte-for-byte.
fn step_seed(date: NaiveDate, instrument: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    date.hash(&mut hasher);
    instrument.hash(&mut hasher);
    hasher.finish()
}

/// Run the full selection pipeline for one instrument at one decision date
/// (spec §4.7 steps 1-7). `raw` must already be winsorised-free (this
/// function winsorises internally per step 1).
pub fn run(
    raw: &Dataset,
    date: NaiveDate,
    instrument: &str,
    cfg: &EngineConfig,
    previous_snapshot: Option<&std::collections::HashMap<String, stability::StabilityClass>>,
) -> FeatureSelectionResult {
    let seed = step_seed(date, instrument);
    let winsorised = raw.winsorised();

    let with_interactions = interactions::build_validated(&winsorised, seed);
    let interaction_features_admitted: Vec<String> = with_interactions
        .feature_names
        .iter()
        .filter(|n| !winsorised.feature_names.contains(n))
        .cloned()
        .collect();

    let fsc = &cfg.feature_selection;

    let enet_fit = elastic_net::select(&with_interactions, &fsc.enet_l1_ratios, fsc.enet_alpha_grid_size);

    let boruta_result = boruta::run(
        &with_interactions.rows,
        &with_interactions.y,
        fsc.boruta_iterations,
        fsc.boruta_trees,
        fsc.boruta_max_depth,
        seed,
    );

    let mut confirmed = Vec::new();
    let mut tentative = Vec::new();
    let mut rejected = Vec::new();
    for (name, verdict) in with_interactions.feature_names.iter().zip(&boruta_result.verdicts) {
        match verdict {
            boruta::BorutaVerdict::Confirmed => confirmed.push(name.clone()),
            boruta::BorutaVerdict::Tentative => tentative.push(name.clone()),
            boruta::BorutaVerdict::Rejected => rejected.push(name.clone()),
        }
    }

    let stability_scores = stability::score(
        &with_interactions,
        fsc.stability_subsamples,
        fsc.stability_subsample_fraction,
        seed,
    );

    let alerts = match previous_snapshot {
        Some(prev) => stability::diff_alerts(prev, &stability_scores),
        None => Vec::new(),
    };

    let mut nonlinear_set = confirmed.clone();
    nonlinear_set.extend(tentative.clone());
    nonlinear_set.sort();
    nonlinear_set.dedup();

    let mut merged_set = enet_fit.selected.clone();
    merged_set.extend(nonlinear_set.clone());
    merged_set.extend(interaction_features_admitted.clone());
    merged_set.sort();
    merged_set.dedup();

    FeatureSelectionResult {
        date,
        instrument: instrument.to_string(),
        linear_set: enet_fit.selected.clone(),
        nonlinear_set,
        merged_set,
        elastic_net_coefficient_path: enet_fit.coefficient_path,
        boruta_confirmed: confirmed,
        boruta_tentative: tentative,
        boruta_rejected: rejected,
        interaction_features_admitted,
        stability: stability_scores,
        alerts,
    }
}

/// Classification counts partition exactly (spec §8.8): robust + moderate +
/// unstable = total.
pub fn classification_partitions(result: &FeatureSelectionResult) -> bool {
    use stability::StabilityClass::*;
    let total = result.stability.len();
    let counted = result
        .stability
        .iter()
        .filter(|f| matches!(f.class, Robust | Moderate | Unstable))
        .count();
    total == counted
}
