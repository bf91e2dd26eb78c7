//! Snapshot Service
//!
//! Captures the full state of a [`Simulation`] into an owned
//! [`SimulationSnapshot`], writes snapshots back onto a live simulation,
//! and converts snapshots to and from transport formats.
//!
//! Snapshots never share storage with the live world: capture clones every
//! field, restore copies fields back. A snapshot is never mutated once it
//! has been handed to the buffer, the codec or the recorder.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::hash::{StateHash, StateHasher};
use crate::core::rng::{RngState, RngStateError};
use crate::sim::{Actor, EntityKind, Projectile, ProjectileOwner, Simulation, Vec2};

/// Errors from snapshot conversion and restore.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// JSON structure did not match the snapshot layout.
    #[error("invalid snapshot json: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary encoding or decoding failed.
    #[error("invalid snapshot bytes: {0}")]
    Binary(#[from] bincode::Error),

    /// Embedded RNG state could not be restored.
    #[error("invalid rng state: {0}")]
    RngState(#[from] RngStateError),
}

// =============================================================================
// SNAPSHOT TYPES
// =============================================================================

/// How much of the world a snapshot covers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureScope {
    /// Everything: players, enemies, projectiles and RNG state.
    #[default]
    Full,
    /// Players and globals only (cheap per-tick checkpoints).
    PlayersOnly,
}

/// Captured state of one player or enemy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntitySnapshot {
    /// Player or enemy.
    #[serde(rename = "type")]
    pub kind: EntityKind,
    /// Stable identifier.
    pub id: u32,
    /// Position.
    pub pos: Vec2,
    /// Velocity.
    pub velocity: Vec2,
    /// Facing left.
    pub flip: bool,
    /// Action name.
    pub action: String,
    /// Remaining lives.
    pub lives: i32,
    /// Ticks since grounded.
    pub air_time: i32,
    /// Jump charges.
    pub jumps: i32,
    /// Wall slide flag.
    pub wall_slide: bool,
    /// Dash ticks remaining.
    pub dashing: i32,
    /// Shot cooldown.
    pub shoot_cooldown: i32,
    /// Enemy walk ticks remaining.
    pub walking: i32,
}

impl Default for EntitySnapshot {
    fn default() -> Self {
        Self::from_actor(&Actor::new(EntityKind::Player, 0, [0.0, 0.0]))
    }
}

impl EntitySnapshot {
    /// Deep copy of a live actor.
    pub fn from_actor(actor: &Actor) -> Self {
        Self {
            kind: actor.kind,
            id: actor.id,
            pos: actor.pos,
            velocity: actor.velocity,
            flip: actor.flip,
            action: actor.action.clone(),
            lives: actor.lives,
            air_time: actor.air_time,
            jumps: actor.jumps,
            wall_slide: actor.wall_slide,
            dashing: actor.dashing,
            shoot_cooldown: actor.shoot_cooldown,
            walking: actor.walking,
        }
    }

    /// Write every captured field onto a live actor.
    ///
    /// `kind` and `id` are left alone: they describe the slot, not its state.
    pub fn apply_to(&self, actor: &mut Actor) {
        actor.pos = self.pos;
        actor.velocity = self.velocity;
        actor.flip = self.flip;
        actor.set_action(&self.action);
        actor.lives = self.lives;
        actor.air_time = self.air_time;
        actor.jumps = self.jumps;
        actor.wall_slide = self.wall_slide;
        actor.dashing = self.dashing;
        actor.shoot_cooldown = self.shoot_cooldown;
        actor.walking = self.walking;
    }

    fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u8(self.kind as u8);
        hasher.update_u32(self.id);
        hasher.update_vec2(self.pos);
        hasher.update_vec2(self.velocity);
        hasher.update_bool(self.flip);
        hasher.update_str(&self.action);
        hasher.update_i64(self.lives as i64);
        hasher.update_i64(self.air_time as i64);
        hasher.update_i64(self.jumps as i64);
        hasher.update_bool(self.wall_slide);
        hasher.update_i64(self.dashing as i64);
        hasher.update_i64(self.shoot_cooldown as i64);
        hasher.update_i64(self.walking as i64);
    }
}

/// Captured state of one projectile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectileSnapshot {
    /// Position.
    pub pos: Vec2,
    /// Horizontal speed.
    pub velocity: f64,
    /// Ticks alive.
    pub timer: f64,
    /// Side that fired it.
    pub owner: ProjectileOwner,
}

impl From<&Projectile> for ProjectileSnapshot {
    fn from(p: &Projectile) -> Self {
        Self {
            pos: p.pos,
            velocity: p.velocity,
            timer: p.age,
            owner: p.owner,
        }
    }
}

impl From<&ProjectileSnapshot> for Projectile {
    fn from(p: &ProjectileSnapshot) -> Self {
        Self {
            pos: p.pos,
            velocity: p.velocity,
            age: p.timer,
            owner: p.owner,
        }
    }
}

/// Complete (or players-only) simulation state at one tick.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSnapshot {
    /// Tick this state belongs to.
    pub tick: u64,
    /// Coverage of this snapshot.
    pub scope: CaptureScope,
    /// RNG state (absent for players-only captures).
    pub rng_state: Option<RngState>,
    /// Players in world order.
    pub players: Vec<EntitySnapshot>,
    /// Enemies in world order.
    pub enemies: Vec<EntitySnapshot>,
    /// Projectiles in world order.
    pub projectiles: Vec<ProjectileSnapshot>,
    /// Score.
    pub score: i64,
    /// Death counter.
    pub dead_count: i64,
    /// Level transition counter.
    pub transition: i64,
}

impl SimulationSnapshot {
    /// SHA-256 over every field, in declaration order.
    pub fn checksum(&self) -> StateHash {
        let mut hasher = StateHasher::for_snapshot();
        hasher.update_u64(self.tick);
        hasher.update_u8(self.scope as u8);
        match &self.rng_state {
            Some(state) => {
                hasher.update_bool(true);
                hasher.update_str(&state.algorithm);
                hasher.update_u8(state.version);
                hasher.update_u64(state.words.len() as u64);
                for word in &state.words {
                    hasher.update_u64(*word);
                }
            }
            None => hasher.update_bool(false),
        }
        for list in [&self.players, &self.enemies] {
            hasher.update_u64(list.len() as u64);
            for entity in list {
                entity.hash_into(&mut hasher);
            }
        }
        hasher.update_u64(self.projectiles.len() as u64);
        for projectile in &self.projectiles {
            hasher.update_vec2(projectile.pos);
            hasher.update_f64(projectile.velocity);
            hasher.update_f64(projectile.timer);
            hasher.update_u8(projectile.owner as u8);
        }
        hasher.update_i64(self.score);
        hasher.update_i64(self.dead_count);
        hasher.update_i64(self.transition);
        hasher.finalize()
    }

    /// Primary controlled entity (first player), if any.
    pub fn primary(&self) -> Option<&EntitySnapshot> {
        self.players.first()
    }
}

/// SHA-256 checksum of a snapshot (see [`SimulationSnapshot::checksum`]).
pub fn snapshot_checksum(snapshot: &SimulationSnapshot) -> StateHash {
    snapshot.checksum()
}

// =============================================================================
// CAPTURE / RESTORE
// =============================================================================

/// Capture the simulation's current state.
///
/// With `optimized` set, enemies, projectiles and the RNG state are skipped
/// and the snapshot is marked [`CaptureScope::PlayersOnly`].
pub fn capture<S: Simulation + ?Sized>(sim: &S, optimized: bool) -> SimulationSnapshot {
    let world = sim.world();
    let players = world.players.iter().map(EntitySnapshot::from_actor).collect();

    if optimized {
        return SimulationSnapshot {
            tick: world.tick,
            scope: CaptureScope::PlayersOnly,
            rng_state: None,
            players,
            enemies: Vec::new(),
            projectiles: Vec::new(),
            score: world.score,
            dead_count: world.dead_count,
            transition: world.transition,
        };
    }

    SimulationSnapshot {
        tick: world.tick,
        scope: CaptureScope::Full,
        rng_state: Some(world.rng.get_state()),
        players,
        enemies: world.enemies.iter().map(EntitySnapshot::from_actor).collect(),
        projectiles: world.projectiles.iter().map(ProjectileSnapshot::from).collect(),
        score: world.score,
        dead_count: world.dead_count,
        transition: world.transition,
    }
}

/// Write a snapshot back onto the live simulation.
///
/// Entities are matched by position: live entities beyond the snapshot's
/// list are left untouched, snapshot entries beyond the live list are
/// dropped. No entity is ever created or destroyed. Projectiles have no
/// identity and are replaced wholesale. Enemies, projectiles and RNG state
/// are only restored from [`CaptureScope::Full`] snapshots.
///
/// The RNG state is validated first, so on error the world is unchanged.
pub fn restore<S: Simulation + ?Sized>(
    sim: &mut S,
    snapshot: &SimulationSnapshot,
) -> Result<(), SnapshotError> {
    let world = sim.world_mut();
    let full = snapshot.scope == CaptureScope::Full;

    if full {
        if let Some(state) = &snapshot.rng_state {
            world.rng.set_state(state)?;
        }
    }

    world.tick = snapshot.tick;
    world.score = snapshot.score;
    world.dead_count = snapshot.dead_count;
    world.transition = snapshot.transition;

    for (live, snap) in world.players.iter_mut().zip(&snapshot.players) {
        snap.apply_to(live);
    }

    if full {
        for (live, snap) in world.enemies.iter_mut().zip(&snapshot.enemies) {
            snap.apply_to(live);
        }
        world.projectiles = snapshot.projectiles.iter().map(Projectile::from).collect();
    }

    Ok(())
}

/// Apply `update` on top of `base` with the same rules as [`restore`].
///
/// Fields `update` does not cover (enemies, projectiles and RNG of a
/// players-only capture, a missing RNG state, entities past the end of its
/// lists) keep their value from `base`. The result has `base`'s scope.
pub fn overlay(base: &SimulationSnapshot, update: &SimulationSnapshot) -> SimulationSnapshot {
    let mut merged = base.clone();
    merged.tick = update.tick;
    merged.score = update.score;
    merged.dead_count = update.dead_count;
    merged.transition = update.transition;

    let apply = |slot: &mut EntitySnapshot, snap: &EntitySnapshot| {
        *slot = EntitySnapshot {
            kind: slot.kind,
            id: slot.id,
            ..snap.clone()
        };
    };

    for (slot, snap) in merged.players.iter_mut().zip(&update.players) {
        apply(slot, snap);
    }

    if update.scope == CaptureScope::Full {
        if let Some(state) = &update.rng_state {
            merged.rng_state = Some(state.clone());
        }
        for (slot, snap) in merged.enemies.iter_mut().zip(&update.enemies) {
            apply(slot, snap);
        }
        merged.projectiles = update.projectiles.clone();
    }

    merged
}

// =============================================================================
// SERIALIZATION
// =============================================================================

/// Convert to a language-neutral JSON value.
///
/// The RNG state is written in its portable nested-array form. Non-finite
/// floats have no JSON representation and come back as errors on
/// [`deserialize`].
pub fn serialize(snapshot: &SimulationSnapshot) -> Result<serde_json::Value, SnapshotError> {
    Ok(serde_json::to_value(snapshot)?)
}

/// Parse a JSON value produced by [`serialize`].
///
/// Missing fields take their defaults; the RNG state may be given as a
/// nested array or as an object.
pub fn deserialize(value: &serde_json::Value) -> Result<SimulationSnapshot, SnapshotError> {
    Ok(SimulationSnapshot::deserialize(value)?)
}

/// Compact binary encoding for transport.
pub fn to_bytes(snapshot: &SimulationSnapshot) -> Result<Vec<u8>, SnapshotError> {
    Ok(bincode::serialize(snapshot)?)
}

/// Decode bytes produced by [`to_bytes`].
pub fn from_bytes(bytes: &[u8]) -> Result<SimulationSnapshot, SnapshotError> {
    Ok(bincode::deserialize(bytes)?)
}

// =============================================================================
// TEST STRATEGIES
// =============================================================================

#[cfg(test)]
pub(crate) mod strategies {
    use proptest::prelude::*;

    use super::*;

    fn coord() -> impl Strategy<Value = f64> {
        -1000.0f64..1000.0
    }

    pub fn entity(kind: EntityKind) -> impl Strategy<Value = EntitySnapshot> {
        (
            0u32..12,
            (coord(), coord()),
            (coord(), coord()),
            any::<bool>(),
            prop::sample::select(vec!["idle", "run", "jump", "dash"]),
            (0i32..5, 0i32..30, 0i32..2, any::<bool>()),
            (0i32..60, 0i32..30, 0i32..120),
        )
            .prop_map(
                move |(id, pos, vel, flip, action, (lives, air_time, jumps, wall_slide), (dashing, shoot_cooldown, walking))| {
                    EntitySnapshot {
                        kind,
                        id,
                        pos: [pos.0, pos.1],
                        velocity: [vel.0, vel.1],
                        flip,
                        action: action.to_string(),
                        lives,
                        air_time,
                        jumps,
                        wall_slide,
                        dashing,
                        shoot_cooldown,
                        walking,
                    }
                },
            )
    }

    pub fn projectile() -> impl Strategy<Value = ProjectileSnapshot> {
        ((coord(), coord()), -2.0f64..2.0, 0.0f64..360.0, any::<bool>()).prop_map(
            |(pos, velocity, timer, by_player)| ProjectileSnapshot {
                pos: [pos.0, pos.1],
                velocity,
                timer,
                owner: if by_player {
                    ProjectileOwner::Player
                } else {
                    ProjectileOwner::Enemy
                },
            },
        )
    }

    pub fn snapshot() -> impl Strategy<Value = SimulationSnapshot> {
        (
            0u64..10_000,
            prop::option::of((any::<u64>(), 1u64..)),
            prop::collection::vec(entity(EntityKind::Player), 0..3),
            prop::collection::vec(entity(EntityKind::Enemy), 0..5),
            prop::collection::vec(projectile(), 0..4),
            (-5i64..500, 0i64..20, -30i64..30),
        )
            .prop_map(
                |(tick, rng, players, enemies, projectiles, (score, dead_count, transition))| {
                    SimulationSnapshot {
                        tick,
                        scope: CaptureScope::Full,
                        rng_state: rng.map(|(a, b)| RngState::from_words([a, b])),
                        players,
                        enemies,
                        projectiles,
                        score,
                        dead_count,
                        transition,
                    }
                },
            )
    }
}

// =============================================================================
// TESTS
// =============================================================================
