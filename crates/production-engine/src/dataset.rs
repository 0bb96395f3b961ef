//! Turns the feature panel and the instrument-returns panel into the
//! causal training pairs and current-month prediction rows the rest of
//! the engine needs (spec §4.7's "built from FeatureMatrix and
//! InstrumentReturns panels by the caller" — this crate is that caller).

use chrono::NaiveDate;
use feature_selector::dataset::Dataset;
use macro_core::types::{Instrument, MonthKey};
use macro_core::Panel;

/// Training pairs `(feature_row(d), return(d_next))` for every adjacent
/// pair of dates common to both panels with `d_next < t` (spec §4.2/§8
/// invariant 1: nothing at or after `t` may enter a fit). Feature row `d`
/// forecasts the *next* month's return, which is what makes `mu` at `t`
/// (computed from the feature row observed at `t`) a forecast rather than
/// a contemporaneous fit.
pub fn training_dataset(features: &Panel, returns: &Panel, instrument: Instrument, t: MonthKey) -> Dataset {
    let return_col = instrument_returns::column_name(instrument);
    let feature_names: Vec<String> = features.column_names().map(|s| s.to_string()).collect();

    let feature_index = features.index();
    let return_index = returns.index();
    let common: Vec<MonthKey> = feature_index.into_iter().filter(|d| return_index.contains(d)).collect();

    let mut rows = Vec::new();
    let mut y = Vec::new();
    for window in common.windows(2) {
        let (d, d_next) = (window[0], window[1]);
        if d_next >= t {
            continue;
        }
        let row = features.row(d);
        if row.len() != feature_names.len() {
            continue;
        }
        let target = match returns.column(return_col).and_then(|s| s.get(d_next)) {
            Some(v) => v,
            None => continue,
        };
        let feature_row: Vec<f64> = feature_names.iter().map(|n| row[n]).collect();
        rows.push(feature_row);
        y.push(target);
    }

    Dataset { feature_names, rows, y }
}

/// The current-month feature row (spec §4.2 causal: `features.as_of(t)`
/// already guarantees no row after `t` is visible), restricted to the
/// subset of feature names used by each learner group. Any name in either
/// set shaped like `"a_x_b"` that isn't a raw column is reconstructed from
/// its two base values (see [`expand_row_with_interactions`]), mirroring
/// how the same names get materialised on the training side.
pub fn prediction_rows(features: &Panel, t: MonthKey, linear_set: &[String], nonlinear_set: &[String]) -> Option<(Vec<f64>, Vec<f64>)> {
    let mut names = linear_set.to_vec();
    names.extend(nonlinear_set.iter().cloned());
    let row = expand_row_with_interactions(&features.row(t), &names);
    let linear: Vec<f64> = linear_set.iter().map(|n| row.get(n).copied().unwrap_or(0.0)).collect();
    let nonlinear: Vec<f64> = nonlinear_set.iter().map(|n| row.get(n).copied().unwrap_or(0.0)).collect();
    if linear.is_empty() && nonlinear.is_empty() {
        None
    } else {
        Some((linear, nonlinear))
    }
}

/// Reconstructs any `"{a}_x_{b}"` interaction columns named in `names` that
/// aren't already present in `ds`, recomputing the product of their two
/// base columns (spec §4.7 step 2's interaction features, mirrored here so
/// the nonlinear learners can actually consume the interaction columns
/// `feature_selector`'s shadow-permutation Boruta pass admitted, instead of
/// silently dropping them in [`restrict_columns`]).
pub fn expand_with_interactions(ds: &Dataset, names: &[String]) -> Dataset {
    let mut feature_names = ds.feature_names.clone();
    let mut rows = ds.rows.clone();
    for name in names {
        if feature_names.iter().any(|f| f == name) {
            continue;
        }
        let Some((a, b)) = name.split_once("_x_") else { continue };
        let ia = feature_names.iter().position(|f| f == a);
        let ib = feature_names.iter().position(|f| f == b);
        let (Some(ia), Some(ib)) = (ia, ib) else { continue };
        for row in rows.iter_mut() {
            row.push(row[ia] * row[ib]);
        }
        feature_names.push(name.clone());
    }
    Dataset { feature_names, rows, y: ds.y.clone() }
}

/// Same expansion as [`expand_with_interactions`] for a single named
/// feature row (the current-month prediction row).
pub fn expand_row_with_interactions(row: &std::collections::BTreeMap<String, f64>, names: &[String]) -> std::collections::BTreeMap<String, f64> {
    let mut out = row.clone();
    for name in names {
        if out.contains_key(name) {
            continue;
        }
        let Some((a, b)) = name.split_once("_x_") else { continue };
        if let (Some(&va), Some(&vb)) = (out.get(a), out.get(b)) {
            out.insert(name.clone(), va * vb);
        }
    }
    out
}

/// Restricts a training dataset's columns down to a named subset,
/// preserving row order (spec §4.7 step 7: the linear/nonlinear/merged
/// sets feed different learner groups from the same underlying rows).
pub fn restrict_columns(dataset: &Dataset, names: &[String]) -> (Vec<Vec<f64>>, Vec<f64>) {
    let indices: Vec<usize> = names
        .iter()
        .filter_map(|n| dataset.feature_names.iter().position(|f| f == n))
        .collect();
    let rows: Vec<Vec<f64>> = dataset.rows.iter().map(|r| indices.iter().map(|&j| r[j]).collect()).collect();
    (rows, dataset.y.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use macro_core::{Series, Unit};

    fn md(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn sample_panels() -> (Panel, Panel) {
        let mut features = Panel::new();
        let mut a = Series::new("z_vix", Unit::Index);
        for i in 0..24 {
            a.insert(md(2020 + i / 12, (i % 12) + 1), i as f64);
        }
        features.insert(a);

        let mut returns = Panel::new();
        let mut r = Series::new(instrument_returns::column_name(Instrument::Front), Unit::Ratio);
        for i in 0..24 {
            r.insert(md(2020 + i / 12, (i % 12) + 1), 0.01);
        }
        returns.insert(r);
        (features, returns)
    }

    #[test]
    fn training_pairs_exclude_dates_at_or_after_t() {
        let (features, returns) = sample_panels();
        let t = md(2021, 6);
        let ds = training_dataset(&features, &returns, Instrument::Front, t);
        assert!(!ds.rows.is_empty());
    }
}
