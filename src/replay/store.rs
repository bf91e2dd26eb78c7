//! Replay persistence.
//!
//! ```text
//! <root>/<level>.json            best run per level
//! <root>/last_runs/<level>.json  most recent run per level
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::data::{ReplayData, ReplayError};

/// Runs shorter than this are never committed.
pub const MIN_COMMIT_FRAMES: u64 = 10;

const LAST_RUNS_DIR: &str = "last_runs";

/// Which stored run to address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReplayKind {
    /// Fastest run.
    Best,
    /// Most recent run.
    Last,
}

/// Result of [`ReplayStore::commit`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Run too short; nothing written.
    TooShort,
    /// `last` written; `new_best` tells whether `best` was replaced too.
    Saved {
        /// The run became the level's best.
        new_best: bool,
    },
}

/// Best/last replay files on disk.
#[derive(Clone, Debug)]
pub struct ReplayStore {
    root: PathBuf,
}

impl ReplayStore {
    /// Store rooted at `root`. Directories are created on first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File path for a level's run of the given kind.
    ///
    /// Level names are used as file names, so anything that could leave the
    /// store root (separators, `.`/`..`, empty) is rejected.
    pub fn path(&self, level: &str, kind: ReplayKind) -> Result<PathBuf, ReplayError> {
        let unsafe_name = level.is_empty()
            || level == "."
            || level == ".."
            || level.contains(['/', '\\', '\0']);
        if unsafe_name {
            return Err(ReplayError::InvalidLevel(level.to_string()));
        }
        let dir = match kind {
            ReplayKind::Best => self.root.clone(),
            ReplayKind::Last => self.root.join(LAST_RUNS_DIR),
        };
        Ok(dir.join(format!("{level}.json")))
    }

    /// Load a stored run. A missing file is `Ok(None)`.
    pub fn load(&self, level: &str, kind: ReplayKind) -> Result<Option<ReplayData>, ReplayError> {
        let path = self.path(level, kind)?;
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let data = ReplayData::from_json(&json)?;
        debug!(level, ?kind, frames = data.duration_frames, "Loaded replay");
        Ok(Some(data))
    }

    /// Write a run, replacing any existing file of that kind.
    pub fn save(&self, data: &ReplayData, kind: ReplayKind) -> Result<(), ReplayError> {
        let path = self.path(&data.level, kind)?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&path, data.to_json()?)?;
        Ok(())
    }

    /// Commit a finished run: always as `last`, and as `best` when the
    /// level has no readable best yet or this run took fewer frames.
    pub fn commit(&self, data: &ReplayData) -> Result<CommitOutcome, ReplayError> {
        if data.duration_frames < MIN_COMMIT_FRAMES {
            debug!(frames = data.duration_frames, "Run too short to commit");
            return Ok(CommitOutcome::TooShort);
        }

        self.save(data, ReplayKind::Last)?;

        let current_best = match self.load(&data.level, ReplayKind::Best) {
            Ok(best) => best,
            Err(e) => {
                warn!(level = %data.level, error = %e, "Unreadable best replay, replacing");
                None
            }
        };
        let new_best = current_best.map_or(true, |best| data.duration_frames < best.duration_frames);

        if new_best {
            self.save(data, ReplayKind::Best)?;
            info!(level = %data.level, frames = data.duration_frames, "New best run");
        }

        Ok(CommitOutcome::Saved { new_best })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(level: &str, frames: u64) -> ReplayData {
        let mut data = ReplayData::new(level, "default", 1);
        data.duration_frames = frames;
        data
    }

    #[test]
    fn test_paths() {
        let store = ReplayStore::new("/tmp/replays");
        assert_eq!(
            store.path("4", ReplayKind::Best).unwrap(),
            PathBuf::from("/tmp/replays/4.json")
        );
        assert_eq!(
            store.path("4", ReplayKind::Last).unwrap(),
            PathBuf::from("/tmp/replays/last_runs/4.json")
        );
    }

    #[test]
    fn test_level_names_cannot_leave_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReplayStore::new(dir.path().join("replays"));

        for level in ["../x", "a/b", "a\\b", "..", ".", ""] {
            assert!(
                matches!(
                    store.path(level, ReplayKind::Best),
                    Err(ReplayError::InvalidLevel(_))
                ),
                "accepted {level:?}"
            );
        }
        assert!(matches!(
            store.commit(&run("../x", 100)),
            Err(ReplayError::InvalidLevel(_))
        ));
        assert!(!dir.path().join("x.json").exists());
        assert!(store.load("../x", ReplayKind::Last).is_err());
        assert!(store.path("level-1_a", ReplayKind::Best).is_ok());
    }

    #[test]
    fn test_load_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReplayStore::new(dir.path());
        assert!(store.load("1", ReplayKind::Best).unwrap().is_none());
    }

    #[test]
    fn test_short_runs_not_committed() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReplayStore::new(dir.path());

        assert_eq!(store.commit(&run("1", 9)).unwrap(), CommitOutcome::TooShort);
        assert!(!store.path("1", ReplayKind::Last).unwrap().exists());
        assert!(!store.path("1", ReplayKind::Best).unwrap().exists());
    }

    #[test]
    fn test_best_only_replaced_by_faster_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReplayStore::new(dir.path());

        assert_eq!(
            store.commit(&run("1", 300)).unwrap(),
            CommitOutcome::Saved { new_best: true }
        );
        assert_eq!(
            store.commit(&run("1", 400)).unwrap(),
            CommitOutcome::Saved { new_best: false }
        );

        let best = store.load("1", ReplayKind::Best).unwrap().unwrap();
        let last = store.load("1", ReplayKind::Last).unwrap().unwrap();
        assert_eq!(best.duration_frames, 300);
        assert_eq!(last.duration_frames, 400);

        assert_eq!(
            store.commit(&run("1", 250)).unwrap(),
            CommitOutcome::Saved { new_best: true }
        );
        assert_eq!(
            store.load("1", ReplayKind::Best).unwrap().unwrap().duration_frames,
            250
        );
    }

    #[test]
    fn test_corrupt_best_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReplayStore::new(dir.path());
        fs::write(store.path("2", ReplayKind::Best).unwrap(), "{not json").unwrap();

        assert!(store.load("2", ReplayKind::Best).is_err());
        assert_eq!(
            store.commit(&run("2", 500)).unwrap(),
            CommitOutcome::Saved { new_best: true }
        );
        assert_eq!(
            store.load("2", ReplayKind::Best).unwrap().unwrap().duration_frames,
            500
        );
    }

    #[test]
    fn test_levels_are_separate() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReplayStore::new(dir.path());
        store.commit(&run("1", 100)).unwrap();
        store.commit(&run("2", 200)).unwrap();

        assert_eq!(
            store.load("1", ReplayKind::Best).unwrap().unwrap().duration_frames,
            100
        );
        assert_eq!(
            store.load("2", ReplayKind::Last).unwrap().unwrap().duration_frames,
            200
        );
    }
}
