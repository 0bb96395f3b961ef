//! Loads and saves the single persisted artefact of the core (spec §6):
//! the feature-selection `SnapshotHistory` JSON file, bounded to 52
//! entries. Concurrent runs serialise at this layer via an advisory file
//! lock (spec §5) — the in-memory bounded ring itself lives in
//! `feature_selector::snapshot`.

use std::fs;
use std::io::Write;
use std::path::Path;

use fs2::FileExt;
use feature_selector::snapshot::SnapshotHistory;

/// Reads the snapshot history at `path`, returning an empty history if the
/// file doesn't exist yet (first run) and logging + returning empty on a
/// corrupt file rather than aborting the backtest over a diagnostics
/// artefact.
pub fn load(path: &Path) -> SnapshotHistory {
    match fs::read_to_string(path) {
        Ok(data) => SnapshotHistory::from_json(&data).unwrap_or_else(|err| {
            tracing::warn!(%err, path = %path.display(), "feature-selection snapshot file unreadable, starting fresh");
            SnapshotHistory::default()
        }),
        Err(_) => SnapshotHistory::default(),
    }
}

/// Writes `history` to `path` under an exclusive advisory lock, so two
/// runs writing the same file serialise rather than interleave.
pub fn save(path: &Path, history: &SnapshotHistory) -> anyhow::Result<()> {
    let file = fs::OpenOptions::new().create(true).write(true).truncate(true).open(path)?;
    file.lock_exclusive()?;
    let json = history.to_json()?;
    (&file).write_all(json.as_bytes())?;
    fs2::FileExt::unlock(&file)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_as_empty_history() {
        let history = load(Path::new("/tmp/does-not-exist-macro-risk-snapshot.json"));
        assert!(history.snapshots.is_empty());
    }

    #[test]
    fn round_trips_through_save_and_load() {
        let dir = std::env::temp_dir().join(format!("macro-risk-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("snapshot.json");
        let mut history = SnapshotHistory::default();
        history.push(feature_selector::snapshot::Snapshot {
            date: chrono::NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            instrument: "fx".into(),
            classes: Default::default(),
        });
        save(&path, &history).unwrap();
        let restored = load(&path);
        assert_eq!(restored.snapshots.len(), 1);
        fs::remove_dir_all(&dir).ok();
    }
}
