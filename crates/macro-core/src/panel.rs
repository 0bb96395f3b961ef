use std::collections::BTreeMap;

use crate::series::Series;
use crate::types::MonthKey;

/// An aligned table of `Series` sharing an index (spec §3, §4.2).
///
/// Panels are immutable once built: every operation below returns a new
/// `Panel`. This is what makes look-ahead leakage a type error rather than a
/// runtime one — a caller can only ever observe a `Panel` that was already
/// truncated to a prefix, there is no API that hands back "the whole
/// series" for inspection past `t`.
#[derive(Debug, Clone, Default)]
pub struct Panel {
    columns: BTreeMap<String, Series>,
}

impl Panel {
    pub fn new() -> Self {
        Self {
            columns: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, series: Series) {
        self.columns.insert(series.name().to_string(), series);
    }

    pub fn column(&self, name: &str) -> Option<&Series> {
        self.columns.get(name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(|s| s.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// The union of every column's index, sorted.
    pub fn index(&self) -> Vec<MonthKey> {
        let mut all: Vec<MonthKey> = self
            .columns
            .values()
            .flat_map(|s| s.dates())
            .collect();
        all.sort();
        all.dedup();
        all
    }

    /// Panel truncated to rows with index <= t. Never includes a row with
    /// index > t by construction (§4.2 invariant).
    pub fn as_of(&self, t: MonthKey) -> Panel {
        let mut out = Panel::new();
        for (name, series) in &self.columns {
            let mut s = Series::new(name.clone(), series.unit());
            for (d, v) in series.as_of(t) {
                s.insert(d, v);
            }
            out.columns.insert(name.clone(), s);
        }
        out
    }

    /// Panel holding only the last `n` rows (per column) at or before `t`.
    pub fn window(&self, t: MonthKey, n: usize) -> Panel {
        let mut out = Panel::new();
        for (name, series) in &self.columns {
            let mut s = Series::new(name.clone(), series.unit());
            for (d, v) in series.window(t, n) {
                s.insert(d, v);
            }
            out.columns.insert(name.clone(), s);
        }
        out
    }

    /// Forward-fill every column onto its own index (features only — never
    /// call this on a returns panel, per §4.2).
    pub fn forward_fill(&self) -> Panel {
        let mut out = Panel::new();
        for (name, series) in &self.columns {
            let mut s = Series::new(name.clone(), series.unit());
            let mut last: Option<f64> = None;
            for d in series.dates() {
                last = series.get(d).or(last);
                if let Some(v) = last {
                    s.insert(d, v);
                }
            }
            out.columns.insert(name.clone(), s);
        }
        out
    }

    /// Reindex every column onto `index`, forward-filling, and drop the
    /// leading rows where any column is still unfilled.
    pub fn align_to(&self, index: &[MonthKey]) -> Panel {
        let mut out = Panel::new();
        for (name, series) in &self.columns {
            let mut s = Series::new(name.clone(), series.unit());
            for &d in index {
                if let Some(v) = series.value_as_of(d) {
                    s.insert(d, v);
                }
            }
            out.columns.insert(name.clone(), s);
        }

        // Drop leading rows where not every column has a value yet.
        let first_complete = index.iter().copied().find(|&d| {
            out.columns.values().all(|s| s.get(d).is_some())
        });
        if let Some(first) = first_complete {
            let trimmed_index: Vec<MonthKey> = index.iter().copied().filter(|&d| d >= first).collect();
            return out.align_to(&trimmed_index).keep_only(&trimmed_index);
        }
        out
    }

    fn keep_only(&self, index: &[MonthKey]) -> Panel {
        let set: std::collections::BTreeSet<MonthKey> = index.iter().copied().collect();
        let mut out = Panel::new();
        for (name, series) in &self.columns {
            let mut s = Series::new(name.clone(), series.unit());
            for d in series.dates() {
                if set.contains(&d) {
                    s.insert(d, series.get(d).unwrap());
                }
            }
            out.columns.insert(name.clone(), s);
        }
        out
    }

    /// Row as a name->value map at an exact date (no alignment/ffill).
    pub fn row(&self, t: MonthKey) -> BTreeMap<String, f64> {
        self.columns
            .iter()
            .filter_map(|(name, s)| s.get(t).map(|v| (name.clone(), v)))
            .collect()
    }
}
