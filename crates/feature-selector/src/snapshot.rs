//! Persistent feature-selection snapshot history (spec §6): a single JSON
//! file bounded to the last 52 entries, one per instrument per
//! selection run. The harness is responsible for serialising access
//! (spec §5: "concurrent runs must serialise at the harness level, a file
//! lock is acceptable") — this module only owns the in-memory bounded
//! ring and its (de)serialisation, not file locking.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::stability::StabilityClass;

pub const MAX_HISTORY: usize = 52;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub date: NaiveDate,
    pub instrument: String,
    pub classes: HashMap<String, StabilityClass>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotHistory {
    /// Ordered oldest-first, capped at `MAX_HISTORY`.
    pub snapshots: Vec<Snapshot>,
}

impl SnapshotHistory {
    pub fn push(&mut self, snapshot: Snapshot) {
        self.snapshots.push(snapshot);
        if self.snapshots.len() > MAX_HISTORY {
            let drop = self.snapshots.len() - MAX_HISTORY;
            self.snapshots.drain(0..drop);
        }
    }

    /// Most recent snapshot for `instrument` strictly before `date`, if any.
    pub fn previous_for(&self, instrument: &str, date: NaiveDate) -> Option<&Snapshot> {
        self.snapshots
            .iter()
            .rev()
            .find(|s| s.instrument == instrument && s.date < date)
    }

    /// Persistence fraction of each feature's classification across the
    /// last `window` snapshots for `instrument` (spec §6
    /// `feature_selection_temporal`'s "rolling-window stability view").
    pub fn persistence(&self, instrument: &str, window: usize) -> HashMap<String, f64> {
        let relevant: Vec<&Snapshot> = self
            .snapshots
            .iter()
            .rev()
            .filter(|s| s.instrument == instrument)
            .take(window)
            .collect();
        if relevant.is_empty() {
            return HashMap::new();
        }
        let mut counts: HashMap<String, usize> = HashMap::new();
        for snap in &relevant {
            for (feature, class) in &snap.classes {
                if matches!(class, StabilityClass::Robust) {
                    *counts.entry(feature.clone()).or_insert(0) += 1;
                }
            }
        }
        counts
            .into_iter()
            .map(|(f, c)| (f, c as f64 / relevant.len() as f64))
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(data: &str) -> serde_json::Result<Self> {
        serde_json::from_str(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn md(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    #[test]
    fn history_bounded_to_52_entries() {
        let mut history = SnapshotHistory::default();
        for i in 0..60 {
            history.push(Snapshot {
                date: md(2015 + i / 12, (i % 12) + 1),
                instrument: "fx".into(),
                classes: HashMap::new(),
            });
        }
        assert_eq!(history.snapshots.len(), MAX_HISTORY);
    }

    #[test]
    fn round_trips_through_json() {
        let mut history = SnapshotHistory::default();
        history.push(Snapshot {
            date: md(2020, 1),
            instrument: "front".into(),
            classes: HashMap::from([("z_vix".to_string(), StabilityClass::Robust)]),
        });
        let json = history.to_json().unwrap();
        let restored = SnapshotHistory::from_json(&json).unwrap();
        assert_eq!(restored.snapshots.len(), 1);
    }
}
