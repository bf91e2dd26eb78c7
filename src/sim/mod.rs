//! Simulation Contract
//!
//! The synchronization core does not step physics itself. It drives a
//! [`Simulation`] collaborator that owns a [`World`] of live entities and
//! advances it one tick at a time.
//!
//! ## Module Structure
//!
//! - `input`: Input tokens applied per tick
//! - `platformer`: Small reference simulation used by the demo, batch mode and tests

pub mod input;
pub mod platformer;

use serde::{Deserialize, Serialize};

use crate::core::rng::DeterministicRng;

pub use input::InputToken;
pub use platformer::{PhysicsConfig, PlatformerSim};

/// 2D vector as `[x, y]`.
pub type Vec2 = [f64; 2];

// =============================================================================
// LIVE ENTITIES
// =============================================================================

/// Which entity list an actor belongs to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Player-controlled (or ghost) actor.
    #[default]
    Player,
    /// AI-controlled actor.
    Enemy,
}

/// Side that fired a projectile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectileOwner {
    /// Fired by a player.
    Player,
    /// Fired by an enemy.
    #[default]
    Enemy,
}

/// Live state of a player or enemy.
#[derive(Clone, Debug, PartialEq)]
pub struct Actor {
    /// Player or enemy.
    pub kind: EntityKind,
    /// Stable identifier.
    pub id: u32,
    /// Position.
    pub pos: Vec2,
    /// Velocity (x is residual push such as a dash, y is vertical speed).
    pub velocity: Vec2,
    /// Facing left.
    pub flip: bool,
    /// Animation/action name (`idle`, `run`, `jump`, ...).
    pub action: String,
    /// Remaining lives (players).
    pub lives: i32,
    /// Ticks since last grounded.
    pub air_time: i32,
    /// Remaining jump charges.
    pub jumps: i32,
    /// Sliding down a wall.
    pub wall_slide: bool,
    /// Remaining dash ticks.
    pub dashing: i32,
    /// Ticks until the next shot is allowed.
    pub shoot_cooldown: i32,
    /// Remaining walk ticks (enemies).
    pub walking: i32,
}

impl Actor {
    /// Create a grounded, idle actor.
    pub fn new(kind: EntityKind, id: u32, pos: Vec2) -> Self {
        Self {
            kind,
            id,
            pos,
            velocity: [0.0, 0.0],
            flip: false,
            action: "idle".to_string(),
            lives: 0,
            air_time: 0,
            jumps: 1,
            wall_slide: false,
            dashing: 0,
            shoot_cooldown: 0,
            walking: 0,
        }
    }

    /// Create a player with the given lives.
    pub fn player(id: u32, pos: Vec2, lives: i32) -> Self {
        Self {
            lives,
            ..Self::new(EntityKind::Player, id, pos)
        }
    }

    /// Create an enemy.
    pub fn enemy(id: u32, pos: Vec2) -> Self {
        Self::new(EntityKind::Enemy, id, pos)
    }

    /// Switch action, skipping the allocation when unchanged.
    pub fn set_action(&mut self, action: &str) {
        if self.action != action {
            self.action.clear();
            self.action.push_str(action);
        }
    }
}

/// Live projectile. Fixed shape; projectiles have no identity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projectile {
    /// Position.
    pub pos: Vec2,
    /// Horizontal speed (projectiles fly straight).
    pub velocity: f64,
    /// Ticks alive.
    pub age: f64,
    /// Side that fired it.
    pub owner: ProjectileOwner,
}

// =============================================================================
// WORLD
// =============================================================================

/// All state a snapshot captures.
///
/// The RNG lives here so every simulation instance owns its own stream.
#[derive(Clone, Debug, PartialEq)]
pub struct World {
    /// Current tick.
    pub tick: u64,
    /// The instance's random stream.
    pub rng: DeterministicRng,
    /// Players, addressed positionally.
    pub players: Vec<Actor>,
    /// Enemies, addressed positionally.
    pub enemies: Vec<Actor>,
    /// Live projectiles.
    pub projectiles: Vec<Projectile>,
    /// Collected score.
    pub score: i64,
    /// Death counter.
    pub dead_count: i64,
    /// Level transition counter.
    pub transition: i64,
}

impl World {
    /// Empty world at tick 0 with a freshly seeded RNG.
    pub fn new(seed: u64) -> Self {
        Self {
            tick: 0,
            rng: DeterministicRng::new(seed),
            players: Vec::new(),
            enemies: Vec::new(),
            projectiles: Vec::new(),
            score: 0,
            dead_count: 0,
            transition: 0,
        }
    }
}

// =============================================================================
// SIMULATION CONTRACT
// =============================================================================

/// A steppable simulation.
///
/// Implementations must be deterministic: the same `World` plus the same
/// inputs always produce the same next `World`. All randomness must come
/// from `World::rng`.
pub trait Simulation {
    /// Live state.
    fn world(&self) -> &World;

    /// Mutable live state (used by restore).
    fn world_mut(&mut self) -> &mut World;

    /// Advance one tick, applying `inputs` to the controlled player.
    ///
    /// Must increment `World::tick` by one.
    fn advance_one_tick(&mut self, inputs: &[InputToken]);

    /// Per-actor movement update used for controlled players.
    ///
    /// Ghosts are driven through this same path so their motion is a true
    /// resimulation.
    fn step_actor(&self, actor: &mut Actor, inputs: &[InputToken]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_action() {
        let mut actor = Actor::player(0, [0.0, 0.0], 3);
        assert_eq!(actor.action, "idle");
        actor.set_action("run");
        assert_eq!(actor.action, "run");
        assert_eq!(actor.lives, 3);
        assert_eq!(actor.kind, EntityKind::Player);
    }
}
