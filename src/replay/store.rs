//! Replay Persistence
//!
//! One JSON file per match under a replay directory, named after the match
//! start time.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

use crate::replay::error::ReplayError;
use crate::replay::watcher::Watcher;

/// File name prefix of saved logs.
const FILE_PREFIX: &str = "replay_";

/// Directory of saved action logs.
#[derive(Clone, Debug)]
pub struct ReplayStore {
    dir: PathBuf,
}

impl ReplayStore {
    /// Use `dir` for replays. Created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Replay directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save a log and return its path.
    ///
    /// Never overwrites: a second match started in the same second gets a
    /// unique suffix.
    pub fn save(&self, watcher: &Watcher) -> Result<PathBuf, ReplayError> {
        fs::create_dir_all(&self.dir).map_err(|source| ReplayError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let stem = format!("{}{}", FILE_PREFIX, watcher.time.format("%Y-%m-%dT%H_%M_%S"));
        let mut path = self.dir.join(format!("{}.json", stem));

        let file = match create_new(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                let suffix = Uuid::new_v4().simple().to_string();
                path = self.dir.join(format!("{}_{}.json", stem, &suffix[..8]));
                debug!(path = %path.display(), "replay name taken, using suffix");
                create_new(&path).map_err(|source| ReplayError::Io { path: path.clone(), source })?
            }
            Err(source) => return Err(ReplayError::Io { path, source }),
        };

        let mut writer = BufWriter::new(file);
        watcher.write_json(&mut writer)?;
        writer
            .flush()
            .and_then(|_| writer.get_ref().sync_all())
            .map_err(|source| ReplayError::Io { path: path.clone(), source })?;

        info!(path = %path.display(), actions = watcher.actions.len(), "replay saved");
        Ok(path)
    }

    /// Load and validate a saved log.
    pub fn load(path: impl AsRef<Path>) -> Result<Watcher, ReplayError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ReplayError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Watcher::read_json(BufReader::new(file))
    }

    /// Saved logs, oldest first. A missing directory is empty.
    pub fn list(&self) -> Result<Vec<PathBuf>, ReplayError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(ReplayError::Io { path: self.dir.clone(), source });
            }
        };

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| ReplayError::Io {
                path: self.dir.clone(),
                source,
            })?;
            let path = entry.path();
            let is_replay = path
                .file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| n.starts_with(FILE_PREFIX) && n.ends_with(".json"));
            if is_replay {
                paths.push(path);
            }
        }
        // Timestamped names sort chronologically
        paths.sort();
        Ok(paths)
    }
}

fn create_new(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().write(true).create_new(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;
    use crate::game::action::PlayerAction;
    use crate::game::state::PlayerMapState;

    fn sample(secs: i64) -> Watcher {
        let mut watcher = Watcher::new(
            "meadow".into(),
            Utc.timestamp_opt(secs, 0).unwrap(),
            PlayerMapState { health: 100, money: 650 },
            4,
        );
        watcher.append(0, PlayerAction::StartWave).unwrap();
        watcher.append(120, PlayerAction::Stop).unwrap();
        watcher
    }

    #[test]
    fn test_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let store = ReplayStore::new(tmp.path().join("Replays"));
        let watcher = sample(1_700_000_000);

        let path = store.save(&watcher).unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "replay_2023-11-14T22_13_20.json"
        );
        assert_eq!(ReplayStore::load(&path).unwrap(), watcher);
    }

    #[test]
    fn test_same_second_does_not_clobber() {
        let tmp = TempDir::new().unwrap();
        let store = ReplayStore::new(tmp.path());
        let first = sample(1_700_000_000);
        let mut second = sample(1_700_000_000);
        second.append(200, PlayerAction::Stop).unwrap();

        let a = store.save(&first).unwrap();
        let b = store.save(&second).unwrap();
        assert_ne!(a, b);
        assert_eq!(ReplayStore::load(&a).unwrap(), first);
        assert_eq!(ReplayStore::load(&b).unwrap(), second);
    }

    #[test]
    fn test_list_is_chronological() {
        let tmp = TempDir::new().unwrap();
        let store = ReplayStore::new(tmp.path());
        assert!(store.list().unwrap().is_empty());

        store.save(&sample(1_700_000_100)).unwrap();
        store.save(&sample(1_700_000_000)).unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed[0] < listed[1]);
        assert_eq!(
            ReplayStore::load(&listed[0]).unwrap().time,
            Utc.timestamp_opt(1_700_000_000, 0).unwrap()
        );
    }

    #[test]
    fn test_missing_dir_lists_empty_and_load_fails() {
        let tmp = TempDir::new().unwrap();
        let store = ReplayStore::new(tmp.path().join("absent"));
        assert!(store.list().unwrap().is_empty());
        assert!(matches!(
            ReplayStore::load(tmp.path().join("absent/replay.json")),
            Err(ReplayError::Io { .. })
        ));
    }

    #[test]
    fn test_unwritable_target_reports_error() {
        let tmp = TempDir::new().unwrap();
        // A file where the directory should be
        let blocker = tmp.path().join("Replays");
        std::fs::write(&blocker, "not a directory").unwrap();
        let store = ReplayStore::new(&blocker);
        assert!(matches!(store.save(&sample(0)), Err(ReplayError::Io { .. })));
    }
}
