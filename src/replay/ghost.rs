//! Ghost playback.
//!
//! A ghost is a stand-in actor that resimulates a recorded run through the
//! simulation's own per-actor step. Stored checkpoints pull it back onto
//! the recorded trajectory whenever they come up.

use std::collections::BTreeMap;

use crate::sim::{Actor, EntityKind, InputToken, Simulation};
use crate::sync::snapshot::EntitySnapshot;

use super::data::{ReplayData, ReplayError};

/// Entity id reserved for the ghost.
pub const GHOST_ENTITY_ID: u32 = 999;

/// Ghost progress after a step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GhostStatus {
    /// Still replaying recorded inputs.
    Running,
    /// Log exhausted; idling at the final pose.
    Finished,
}

/// Resimulated ghost of a recorded run.
#[derive(Clone, Debug)]
pub struct ReplayGhost {
    entity: Actor,
    start: Actor,
    inputs: BTreeMap<u64, Vec<InputToken>>,
    checkpoints: BTreeMap<u64, EntitySnapshot>,
    duration: u64,
    tick: u64,
    level: String,
    skin: String,
}

impl ReplayGhost {
    /// Build a ghost from a replay.
    ///
    /// Every checkpoint is decoded up front; a malformed one rejects the
    /// whole replay.
    pub fn from_replay(data: &ReplayData) -> Result<Self, ReplayError> {
        let checkpoints: BTreeMap<u64, EntitySnapshot> = data
            .decode_checkpoints()?
            .into_iter()
            .filter_map(|(tick, snap)| snap.players.into_iter().next().map(|p| (tick, p)))
            .collect();

        let mut start = Actor::new(EntityKind::Player, GHOST_ENTITY_ID, [0.0, 0.0]);
        if let Some(first) = checkpoints.get(&0) {
            first.apply_to(&mut start);
        }

        Ok(Self {
            entity: start.clone(),
            start,
            inputs: data.input_map(),
            checkpoints,
            duration: data.duration_frames,
            tick: 0,
            level: data.level.clone(),
            skin: data.skin.clone(),
        })
    }

    /// The ghost actor.
    pub fn entity(&self) -> &Actor {
        &self.entity
    }

    /// Next tick to replay.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Recorded length.
    pub fn duration(&self) -> u64 {
        self.duration
    }

    /// Level the run was recorded on.
    pub fn level(&self) -> &str {
        &self.level
    }

    /// Skin of the recorded player.
    pub fn skin(&self) -> &str {
        &self.skin
    }

    /// Advance the ghost by one tick.
    pub fn step<S: Simulation + ?Sized>(&mut self, sim: &S) -> GhostStatus {
        if self.tick >= self.duration {
            self.entity.set_action("idle");
            return GhostStatus::Finished;
        }

        if let Some(checkpoint) = self.checkpoints.get(&self.tick) {
            checkpoint.apply_to(&mut self.entity);
        }

        let inputs = self
            .inputs
            .get(&self.tick)
            .map(Vec::as_slice)
            .unwrap_or_default();
        sim.step_actor(&mut self.entity, inputs);

        self.tick += 1;
        GhostStatus::Running
    }

    /// Rewind to the start of the run.
    pub fn reset(&mut self) {
        self.tick = 0;
        self.entity = self.start.clone();
    }
}
