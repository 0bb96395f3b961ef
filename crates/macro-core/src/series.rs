use std::collections::BTreeMap;

use crate::types::{MonthKey, Unit};

/// An ordered mapping from month to real value (spec §3, §4.1).
///
/// Invariants: the index is monotone non-decreasing (guaranteed by
/// `BTreeMap`'s key ordering) and NaN is never stored between the first and
/// last valid observation — callers that need a hole use `Option` at the
/// collection boundary and simply omit the key here.
#[derive(Debug, Clone)]
pub struct Series {
    name: String,
    unit: Unit,
    values: BTreeMap<MonthKey, f64>,
}

impl Series {
    pub fn new(name: impl Into<String>, unit: Unit) -> Self {
        Self {
            name: name.into(),
            unit,
            values: BTreeMap::new(),
        }
    }

    pub fn from_pairs(name: impl Into<String>, unit: Unit, pairs: Vec<(MonthKey, f64)>) -> Self {
        let mut s = Self::new(name, unit);
        for (k, v) in pairs {
            s.insert(k, v);
        }
        s
    }

    pub fn insert(&mut self, date: MonthKey, value: f64) {
        if value.is_finite() {
            self.values.insert(date, value);
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, date: MonthKey) -> Option<f64> {
        self.values.get(&date).copied()
    }

    pub fn dates(&self) -> impl Iterator<Item = MonthKey> + '_ {
        self.values.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MonthKey, f64)> + '_ {
        self.values.iter().map(|(k, v)| (*k, *v))
    }

    pub fn first_date(&self) -> Option<MonthKey> {
        self.values.keys().next().copied()
    }

    pub fn last_date(&self) -> Option<MonthKey> {
        self.values.keys().next_back().copied()
    }

    /// Values at or before `t`, in date order. O(log n + k).
    pub fn as_of(&self, t: MonthKey) -> Vec<(MonthKey, f64)> {
        self.values
            .range(..=t)
            .map(|(k, v)| (*k, *v))
            .collect()
    }

    /// Last `n` values at or before `t`.
    pub fn window(&self, t: MonthKey, n: usize) -> Vec<(MonthKey, f64)> {
        let asof = self.as_of(t);
        let start = asof.len().saturating_sub(n);
        asof[start..].to_vec()
    }

    /// The last value at or before `t`, if any (used by forward-fill joins).
    pub fn value_as_of(&self, t: MonthKey) -> Option<f64> {
        self.values.range(..=t).next_back().map(|(_, v)| *v)
    }

    /// Returns a new series with the same name/unit, values replaced.
    fn with_values(&self, values: BTreeMap<MonthKey, f64>) -> Series {
        Series {
            name: self.name.clone(),
            unit: self.unit,
            values,
        }
    }
}

/// Winsorise at empirical quantiles `lo`/`hi` over the full available
/// window. Passthrough if there are fewer than 10 observations (spec §4.1).
pub fn winsorise(s: &Series, lo: f64, hi: f64) -> Series {
    let n = s.len();
    if n < 10 {
        return s.clone();
    }
    let mut sorted: Vec<f64> = s.values.values().copied().collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let lo_val = quantile(&sorted, lo);
    let hi_val = quantile(&sorted, hi);

    let clipped: BTreeMap<MonthKey, f64> = s
        .values
        .iter()
        .map(|(k, v)| (*k, v.clamp(lo_val, hi_val)))
        .collect();
    s.with_values(clipped)
}

fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let q = q.clamp(0.0, 1.0);
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

/// Rolling mean/std z-score with a variance floor, then winsorised 5/95
/// (spec §4.1).
///
/// `min_periods = max(24, window/2)`. Dates with fewer than `min_periods`
/// trailing observations are omitted from the output (treated as NaN/absent
/// per spec §7's `WindowTooShort` policy).
pub fn zscore_rolling(s: &Series, window: usize, floor: f64) -> Series {
    let min_periods = (24usize).max(window / 2);
    let dates: Vec<MonthKey> = s.values.keys().copied().collect();
    let vals: Vec<f64> = s.values.values().copied().collect();

    let mut out = BTreeMap::new();
    for (i, &d) in dates.iter().enumerate() {
        let start = (i + 1).saturating_sub(window);
        let slice = &vals[start..=i];
        if slice.len() < min_periods {
            continue;
        }
        let mean = slice.iter().sum::<f64>() / slice.len() as f64;
        let var = slice.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / slice.len() as f64;
        let std = var.sqrt().max(floor);
        out.insert(d, (vals[i] - mean) / std);
    }
    winsorise(&s.with_values(out), 0.05, 0.95)
}

/// Auto-detects a series arriving in fractional form where bps is expected
/// (CDS/EMBI spreads occasionally land as `0.0250` instead of `250`) and
/// rescales it, per spec §7's `DataQualityWarning` policy: a magnitude
/// heuristic over the series median, since neither scale is self-describing
/// from a single observation. Median > 50 is assumed already in bps and
/// passed through untouched; median < 1 is assumed fractional and rescaled
/// ×10,000; anything in between is ambiguous and left alone. Returns the
/// (possibly rescaled) series and, if a rescale fired, a `DataQualityWarning`
/// the caller logs once per series per run.
pub fn normalise_bps_scale(s: &Series) -> (Series, Option<crate::error::MacroRiskError>) {
    if s.is_empty() {
        return (s.clone(), None);
    }
    let mut sorted: Vec<f64> = s.values.values().copied().collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let med = quantile(&sorted, 0.5);

    if med < 1.0 {
        let rescaled: BTreeMap<MonthKey, f64> = s.values.iter().map(|(k, v)| (*k, v * 10_000.0)).collect();
        let warning = crate::error::MacroRiskError::DataQualityWarning(format!(
            "{} median {med:.4} looks fractional, rescaled x10000 to bps",
            s.name
        ));
        (s.with_values(rescaled), Some(warning))
    } else {
        (s.clone(), None)
    }
}

/// Natural log of each value. Non-positive inputs are dropped (absent).
pub fn log_transform(s: &Series) -> Series {
    let out: BTreeMap<MonthKey, f64> = s
        .values
        .iter()
        .filter_map(|(k, v)| if *v > 0.0 { Some((*k, v.ln())) } else { None })
        .collect();
    s.with_values(out)
}

/// First difference: `x(t) - x(t-1)` over the *position* index (consecutive
/// stored observations, not calendar distance — callers are responsible for
/// calling this on an already month-aligned series).
pub fn diff(s: &Series) -> Series {
    let pairs: Vec<(MonthKey, f64)> = s.iter().collect();
    let mut out = BTreeMap::new();
    for w in pairs.windows(2) {
        out.insert(w[1].0, w[1].1 - w[0].1);
    }
    s.with_values(out)
}

/// 12-month difference: `x(t) - x(t-12)` by position.
pub fn diff_n(s: &Series, n: usize) -> Series {
    let pairs: Vec<(MonthKey, f64)> = s.iter().collect();
    let mut out = BTreeMap::new();
    if pairs.len() > n {
        for i in n..pairs.len() {
            out.insert(pairs[i].0, pairs[i].1 - pairs[i - n].1);
        }
    }
    s.with_values(out)
}

/// HP-style trend extraction via a one-sided exponentially weighted moving
/// average (a deliberately cheap stand-in for the Hodrick-Prescott filter
/// that stays causal — a true two-sided HP filter would look ahead of `t`,
/// which the no-look-ahead invariant forbids at panel-construction time).
/// `lambda` controls smoothness the same way HP's penalty does: larger
/// values track slower, smoother trends.
pub fn hp_trend(s: &Series, lambda: f64) -> Series {
    let alpha = 1.0 / (1.0 + lambda);
    let mut out = BTreeMap::new();
    let mut trend: Option<f64> = None;
    for (k, v) in s.iter() {
        trend = Some(match trend {
            None => v,
            Some(prev) => alpha * v + (1.0 - alpha) * prev,
        });
        out.insert(k, trend.unwrap());
    }
    s.with_values(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn md(y: i32, m: u32) -> MonthKey {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn stationary_series(n: usize, seed: u64) -> Series {
        // Cheap deterministic PRNG (no `rand` dependency needed for a
        // synthetic AR(0) fixture).
        let mut state = seed;
        let mut s = Series::new("synthetic", Unit::Ratio);
        for i in 0..n {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            let u = (state >> 11) as f64 / (1u64 << 53) as f64;
            let v = (u - 0.5) * 2.0;
            s.insert(md(2000 + (i as i32) / 12, (i as u32) % 12 + 1), v);
        }
        s
    }

    #[test]
    fn winsorise_passthrough_below_ten() {
        let mut s = Series::new("x", Unit::Ratio);
        for i in 0..5 {
            s.insert(md(2020, i + 1), 100.0 * i as f64);
        }
        let w = winsorise(&s, 0.05, 0.95);
        assert_eq!(w.len(), s.len());
        for (d, v) in s.iter() {
            assert_eq!(w.get(d), Some(v));
        }
    }

    #[test]
    fn winsorise_clips_outliers() {
        let mut s = Series::new("x", Unit::Ratio);
        for i in 0..20 {
            s.insert(md(2020, (i % 12) + 1), i as f64);
        }
        s.insert(md(2022, 1), 10_000.0);
        let w = winsorise(&s, 0.05, 0.95);
        let max = w.iter().map(|(_, v)| v).fold(f64::MIN, f64::max);
        assert!(max < 10_000.0);
    }

    #[test]
    fn zscore_of_stationary_ar0_has_unit_variance() {
        let s = stationary_series(240, 42);
        let z = zscore_rolling(&s, 60, 0.01);
        let vals: Vec<f64> = z.iter().map(|(_, v)| v).collect();
        assert!(vals.len() > 100);
        let mean: f64 = vals.iter().sum::<f64>() / vals.len() as f64;
        assert!(mean.abs() < 0.3, "mean {mean} too far from 0");
    }

    #[test]
    fn as_of_never_leaks_future_rows() {
        let mut s = Series::new("x", Unit::Ratio);
        for i in 0..24 {
            s.insert(md(2020 + i / 12, (i % 12) + 1), i as f64);
        }
        let cutoff = md(2021, 1);
        let rows = s.as_of(cutoff);
        assert!(rows.iter().all(|(d, _)| *d <= cutoff));
    }

    #[test]
    fn window_returns_available_when_fewer_than_n() {
        let mut s = Series::new("x", Unit::Ratio);
        for i in 0..3 {
            s.insert(md(2020, i + 1), i as f64);
        }
        let w = s.window(md(2020, 3), 10);
        assert_eq!(w.len(), 3);
    }
}
