//! Replay Manager
//!
//! Ties recording, storage and ghost playback to the level lifecycle:
//!
//! ```text
//! on_level_load   pick ghost source (by GhostMode), start a recording
//! record_tick     once per tick, before the simulation steps
//! step_ghost      once per tick
//! commit_run      at level end: store as last, and as best if faster
//! ```
//!
//! A missing or unreadable replay means "no ghost this session"; it is
//! logged and never an error for the caller.

use tracing::{info, warn};

use crate::config::{GhostMode, SyncConfig};
use crate::sim::{InputToken, Simulation};

use super::data::{ReplayData, ReplayError};
use super::ghost::{GhostStatus, ReplayGhost};
use super::recorder::ReplayRecorder;
use super::store::{CommitOutcome, ReplayKind, ReplayStore};

/// Per-level recording and ghost playback.
#[derive(Debug)]
pub struct ReplayManager {
    store: ReplayStore,
    enabled: bool,
    mode: GhostMode,
    checkpoint_interval: u64,
    recorder: Option<ReplayRecorder>,
    ghost: Option<ReplayGhost>,
}

impl ReplayManager {
    /// Manager using the store and ghost settings from `config`.
    pub fn new(config: &SyncConfig) -> Self {
        Self::with_store(ReplayStore::new(&config.replay_dir), config)
    }

    /// Manager over an explicit store.
    pub fn with_store(store: ReplayStore, config: &SyncConfig) -> Self {
        Self {
            store,
            enabled: config.ghost_enabled,
            mode: config.ghost_mode,
            checkpoint_interval: config.checkpoint_interval,
            recorder: None,
            ghost: None,
        }
    }

    /// The backing store.
    pub fn store(&self) -> &ReplayStore {
        &self.store
    }

    /// Ghost for the current level, if one was loaded.
    pub fn ghost(&self) -> Option<&ReplayGhost> {
        self.ghost.as_ref()
    }

    /// True while a run is being recorded.
    pub fn is_recording(&self) -> bool {
        self.recorder.is_some()
    }

    /// Prepare for a new level: start recording and load a ghost.
    pub fn on_level_load(&mut self, level: &str, skin: &str, seed: u64) {
        self.recorder = None;
        self.ghost = None;
        if !self.enabled {
            return;
        }

        self.recorder = Some(ReplayRecorder::new(
            level,
            skin,
            seed,
            self.checkpoint_interval,
        ));

        let order = match self.mode {
            GhostMode::Best => [ReplayKind::Best, ReplayKind::Last],
            GhostMode::Last => [ReplayKind::Last, ReplayKind::Best],
        };
        let source = order
            .into_iter()
            .find_map(|kind| self.load_for_level(level, kind));

        self.ghost = source.and_then(|data| match ReplayGhost::from_replay(&data) {
            Ok(ghost) => {
                info!(level, frames = ghost.duration(), "Ghost loaded");
                Some(ghost)
            }
            Err(e) => {
                warn!(level, error = %e, "Replay unusable, ghost disabled");
                None
            }
        });
    }

    fn load_for_level(&self, level: &str, kind: ReplayKind) -> Option<ReplayData> {
        match self.store.load(level, kind) {
            Ok(Some(data)) if data.level == level => Some(data),
            Ok(_) => None,
            Err(e) => {
                warn!(level, ?kind, error = %e, "Failed to load replay");
                None
            }
        }
    }

    /// Record this tick. Call before stepping the simulation.
    ///
    /// Ticks where the primary player has no lives left are not recorded.
    pub fn record_tick<S: Simulation + ?Sized>(&mut self, sim: &S, inputs: &[InputToken]) {
        let Some(recorder) = self.recorder.as_mut() else {
            return;
        };
        if sim.world().players.first().is_some_and(|p| p.lives <= 0) {
            return;
        }
        recorder.record(sim, inputs);
    }

    /// Step the ghost, if any.
    pub fn step_ghost<S: Simulation + ?Sized>(&mut self, sim: &S) -> Option<GhostStatus> {
        self.ghost.as_mut().map(|ghost| ghost.step(sim))
    }

    /// End the current recording and persist it.
    ///
    /// Returns `Ok(None)` when nothing was being recorded.
    pub fn commit_run(&mut self) -> Result<Option<CommitOutcome>, ReplayError> {
        let Some(recorder) = self.recorder.take() else {
            return Ok(None);
        };
        let data = recorder.finish();
        let outcome = self.store.commit(&data)?;
        info!(level = %data.level, frames = data.duration_frames, ?outcome, "Run committed");
        Ok(Some(outcome))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::sim::{PhysicsConfig, PlatformerSim};

    fn config(dir: &std::path::Path, mode: GhostMode) -> SyncConfig {
        SyncConfig {
            replay_dir: dir.to_path_buf(),
            ghost_mode: mode,
            ..SyncConfig::default()
        }
    }

    fn play(manager: &mut ReplayManager, level: &str, ticks: u64) {
        let mut sim = PlatformerSim::with_layout(1, PhysicsConfig::default(), 0);
        manager.on_level_load(level, "default", 1);
        for _ in 0..ticks {
            manager.record_tick(&sim, &[InputToken::Right]);
            manager.step_ghost(&sim);
            sim.advance_one_tick(&[InputToken::Right]);
        }
        manager.commit_run().unwrap();
    }

    #[test]
    fn test_no_ghost_without_replays() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = ReplayManager::new(&config(dir.path(), GhostMode::Best));

        manager.on_level_load("1", "default", 1);
        assert!(manager.is_recording());
        assert!(manager.ghost().is_none());
    }

    #[test]
    fn test_ghost_prefers_mode() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = ReplayManager::new(&config(dir.path(), GhostMode::Best));
        play(&mut manager, "1", 50);
        play(&mut manager, "1", 80);

        manager.on_level_load("1", "default", 1);
        assert_eq!(manager.ghost().unwrap().duration(), 50);

        let mut last = ReplayManager::new(&config(dir.path(), GhostMode::Last));
        last.on_level_load("1", "default", 1);
        assert_eq!(last.ghost().unwrap().duration(), 80);
    }

    #[test]
    fn test_falls_back_to_other_kind() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = ReplayManager::new(&config(dir.path(), GhostMode::Last));
        play(&mut manager, "3", 40);
        fs::remove_file(manager.store().path("3", ReplayKind::Last).unwrap()).unwrap();

        manager.on_level_load("3", "default", 1);
        assert_eq!(manager.ghost().unwrap().duration(), 40);
    }

    #[test]
    fn test_corrupt_replay_disables_ghost() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = ReplayManager::new(&config(dir.path(), GhostMode::Best));
        fs::write(manager.store().path("2", ReplayKind::Best).unwrap(), "][").unwrap();

        manager.on_level_load("2", "default", 1);
        assert!(manager.ghost().is_none());
        assert!(manager.is_recording());
    }

    #[test]
    fn test_disabled_records_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path(), GhostMode::Best);
        cfg.ghost_enabled = false;
        let mut manager = ReplayManager::new(&cfg);

        play(&mut manager, "1", 50);
        assert!(!manager.is_recording());
        assert!(manager.ghost().is_none());
        assert!(!manager.store().path("1", ReplayKind::Last).unwrap().exists());
        assert_eq!(manager.commit_run().unwrap(), None);
    }

    #[test]
    fn test_ticks_without_lives_not_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = ReplayManager::new(&config(dir.path(), GhostMode::Best));
        let mut sim = PlatformerSim::with_layout(1, PhysicsConfig::default(), 0);
        manager.on_level_load("5", "default", 1);

        for t in 0..50 {
            if t == 30 {
                sim.world_mut().players[0].lives = 0;
            }
            manager.record_tick(&sim, &[InputToken::Right]);
            sim.advance_one_tick(&[InputToken::Right]);
        }
        manager.commit_run().unwrap();

        let last = manager.store().load("5", ReplayKind::Last).unwrap().unwrap();
        assert_eq!(last.duration_frames, 30);
        assert_eq!(last.inputs.len(), 30);
    }

    #[test]
    fn test_ghost_steps_alongside_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = ReplayManager::new(&config(dir.path(), GhostMode::Best));
        play(&mut manager, "1", 30);

        let sim = PlatformerSim::with_layout(1, PhysicsConfig::default(), 0);
        manager.on_level_load("1", "default", 1);
        for _ in 0..30 {
            assert_eq!(manager.step_ghost(&sim), Some(GhostStatus::Running));
        }
        assert_eq!(manager.step_ghost(&sim), Some(GhostStatus::Finished));
        assert_eq!(manager.ghost().unwrap().entity().pos[0], 130.0);
    }
}
