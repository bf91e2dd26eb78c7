//! Reference Platformer Simulation
//!
//! A deliberately small, fully deterministic stand-in for the game's real
//! stepping logic. It moves players from input tokens, wanders enemies with
//! the world RNG, and flies projectiles. Collision is a flat floor plus a
//! hit radius.

use crate::sim::input::{has, horizontal_axis, InputToken};
use crate::sim::{Actor, Projectile, ProjectileOwner, Simulation, World};

/// Movement constants.
#[derive(Clone, Debug, PartialEq)]
pub struct PhysicsConfig {
    /// Horizontal distance per tick while left/right is held.
    pub run_speed: f64,
    /// Vertical acceleration per tick.
    pub gravity: f64,
    /// Terminal fall speed.
    pub max_fall: f64,
    /// Initial upward speed of a jump.
    pub jump_speed: f64,
    /// Y coordinate of the floor (y grows downward).
    pub floor_y: f64,
    /// Decay of residual horizontal velocity per tick.
    pub friction: f64,
    /// Length of a dash in ticks.
    pub dash_ticks: i32,
    /// Horizontal speed during the burst phase of a dash.
    pub dash_speed: f64,
    /// Ticks between shots.
    pub shoot_cooldown: i32,
    /// Projectile horizontal speed.
    pub projectile_speed: f64,
    /// Projectile lifetime in ticks.
    pub projectile_lifetime: f64,
    /// Distance at which a projectile hits an actor.
    pub hit_radius: f64,
    /// Per-tick chance an idle enemy starts walking.
    pub enemy_walk_chance: f64,
    /// Per-tick chance an idle enemy fires.
    pub enemy_shoot_chance: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            run_speed: 1.0,
            gravity: 0.1,
            max_fall: 5.0,
            jump_speed: 3.0,
            floor_y: 100.0,
            friction: 0.1,
            dash_ticks: 60,
            dash_speed: 8.0,
            shoot_cooldown: 30,
            projectile_speed: 1.5,
            projectile_lifetime: 360.0,
            hit_radius: 4.0,
            enemy_walk_chance: 0.01,
            enemy_shoot_chance: 0.005,
        }
    }
}

/// Number of ticks at the start of a dash that apply the burst speed.
const DASH_BURST_TICKS: i32 = 10;

/// Player lives at spawn.
const START_LIVES: i32 = 3;

/// Reference simulation implementing [`Simulation`].
#[derive(Clone, Debug)]
pub struct PlatformerSim {
    world: World,
    physics: PhysicsConfig,
}

impl PlatformerSim {
    /// One player at the origin and three enemies placed by the seeded RNG.
    pub fn new(seed: u64) -> Self {
        Self::with_layout(seed, PhysicsConfig::default(), 3)
    }

    /// Build with explicit physics and enemy count.
    pub fn with_layout(seed: u64, physics: PhysicsConfig, enemy_count: u32) -> Self {
        let mut world = World::new(seed);
        world
            .players
            .push(Actor::player(0, [100.0, physics.floor_y], START_LIVES));

        for i in 0..enemy_count {
            let x = world.rng.uniform(150.0, 600.0).round();
            let mut enemy = Actor::enemy(100 + i, [x, physics.floor_y]);
            enemy.flip = world.rng.random() < 0.5;
            world.enemies.push(enemy);
        }

        Self { world, physics }
    }

    /// Physics constants in use.
    pub fn physics(&self) -> &PhysicsConfig {
        &self.physics
    }

    fn step_enemies(&mut self) {
        let physics = &self.physics;
        let World {
            rng,
            enemies,
            projectiles,
            ..
        } = &mut self.world;

        for enemy in enemies.iter_mut() {
            if enemy.walking > 0 {
                enemy.pos[0] += if enemy.flip { -0.5 } else { 0.5 };
                enemy.walking -= 1;
                enemy.set_action("run");
                continue;
            }

            enemy.set_action("idle");
            if rng.random() < physics.enemy_walk_chance {
                enemy.walking = rng.randint(30, 120) as i32;
                enemy.flip = rng.random() < 0.5;
            } else if rng.random() < physics.enemy_shoot_chance {
                let direction = if enemy.flip { -1.0 } else { 1.0 };
                projectiles.push(Projectile {
                    pos: [enemy.pos[0] + direction * 7.0, enemy.pos[1]],
                    velocity: direction * physics.projectile_speed,
                    age: 0.0,
                    owner: ProjectileOwner::Enemy,
                });
            }
        }
    }

    fn step_projectiles(&mut self) {
        let physics = &self.physics;
        let world = &mut self.world;

        for projectile in world.projectiles.iter_mut() {
            projectile.pos[0] += projectile.velocity;
            projectile.age += 1.0;
        }

        let mut survivors = Vec::with_capacity(world.projectiles.len());
        for projectile in world.projectiles.drain(..) {
            if projectile.age > physics.projectile_lifetime {
                continue;
            }

            match projectile.owner {
                ProjectileOwner::Enemy => {
                    let hit = world
                        .players
                        .iter_mut()
                        .find(|p| p.dashing == 0 && within(p, &projectile, physics.hit_radius));
                    if let Some(player) = hit {
                        player.lives -= 1;
                        world.dead_count += 1;
                        continue;
                    }
                }
                ProjectileOwner::Player => {
                    let hit = world
                        .enemies
                        .iter()
                        .position(|e| within(e, &projectile, physics.hit_radius));
                    if let Some(index) = hit {
                        world.enemies.remove(index);
                        world.score += 1;
                        continue;
                    }
                }
            }
            survivors.push(projectile);
        }
        world.projectiles = survivors;
    }
}

fn within(actor: &Actor, projectile: &Projectile, radius: f64) -> bool {
    let dx = actor.pos[0] - projectile.pos[0];
    let dy = actor.pos[1] - projectile.pos[1];
    dx * dx + dy * dy <= radius * radius
}

/// Shared per-actor movement. Used for live players and for ghosts.
fn step_body(physics: &PhysicsConfig, actor: &mut Actor, inputs: &[InputToken]) {
    let axis = horizontal_axis(inputs);

    if has(inputs, InputToken::Jump) && actor.jumps > 0 {
        actor.velocity[1] = -physics.jump_speed;
        actor.jumps -= 1;
        actor.air_time = 5;
    }

    if has(inputs, InputToken::Dash) && actor.dashing == 0 {
        actor.dashing = physics.dash_ticks;
    }

    if actor.dashing > 0 {
        let burst = actor.dashing > physics.dash_ticks - DASH_BURST_TICKS;
        actor.dashing -= 1;
        if burst {
            actor.velocity[0] = if actor.flip {
                -physics.dash_speed
            } else {
                physics.dash_speed
            };
        }
    }

    actor.pos[0] += axis * physics.run_speed + actor.velocity[0];
    if actor.velocity[0] > 0.0 {
        actor.velocity[0] = (actor.velocity[0] - physics.friction).max(0.0);
    } else if actor.velocity[0] < 0.0 {
        actor.velocity[0] = (actor.velocity[0] + physics.friction).min(0.0);
    }

    actor.velocity[1] = (actor.velocity[1] + physics.gravity).min(physics.max_fall);
    actor.pos[1] += actor.velocity[1];

    if actor.pos[1] >= physics.floor_y {
        actor.pos[1] = physics.floor_y;
        actor.velocity[1] = 0.0;
        actor.air_time = 0;
        actor.jumps = 1;
    } else {
        actor.air_time += 1;
    }

    if axis > 0.0 {
        actor.flip = false;
    } else if axis < 0.0 {
        actor.flip = true;
    }

    let action = if actor.dashing > 0 {
        "dash"
    } else if actor.air_time > 4 {
        "jump"
    } else if axis != 0.0 {
        "run"
    } else {
        "idle"
    };
    actor.set_action(action);

    if actor.shoot_cooldown > 0 {
        actor.shoot_cooldown -= 1;
    }
}

impl Simulation for PlatformerSim {
    fn world(&self) -> &World {
        &self.world
    }

    fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    fn advance_one_tick(&mut self, inputs: &[InputToken]) {
        self.world.tick += 1;

        // Only the first player is locally controlled.
        let physics = &self.physics;
        let mut shots = Vec::new();
        for (index, player) in self.world.players.iter_mut().enumerate() {
            let tokens: &[InputToken] = if index == 0 { inputs } else { &[] };
            step_body(physics, player, tokens);

            if has(tokens, InputToken::Shoot) && player.shoot_cooldown == 0 {
                player.shoot_cooldown = physics.shoot_cooldown;
                let direction = if player.flip { -1.0 } else { 1.0 };
                shots.push(Projectile {
                    pos: [player.pos[0] + direction * 7.0, player.pos[1]],
                    velocity: direction * physics.projectile_speed,
                    age: 0.0,
                    owner: ProjectileOwner::Player,
                });
            }
        }
        self.world.projectiles.extend(shots);

        self.step_enemies();
        self.step_projectiles();

        let step = self.world.transition.signum();
        self.world.transition -= step;
    }

    fn step_actor(&self, actor: &mut Actor, inputs: &[InputToken]) {
        step_body(&self.physics, actor, inputs);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_sim(seed: u64) -> PlatformerSim {
        PlatformerSim::with_layout(seed, PhysicsConfig::default(), 0)
    }

    #[test]
    fn test_run_right_moves_exactly_run_speed() {
        let mut sim = quiet_sim(1);
        let start = sim.world().players[0].pos;

        sim.advance_one_tick(&[InputToken::Right]);

        let player = &sim.world().players[0];
        assert_eq!(player.pos[0], start[0] + 1.0);
        assert_eq!(player.pos[1], start[1]);
        assert_eq!(player.action, "run");
        assert_eq!(sim.world().tick, 1);
    }

    #[test]
    fn test_jump_leaves_floor_and_lands() {
        let mut sim = quiet_sim(1);
        sim.advance_one_tick(&[InputToken::Jump]);
        assert!(sim.world().players[0].pos[1] < 100.0);
        assert_eq!(sim.world().players[0].jumps, 0);

        for _ in 0..200 {
            sim.advance_one_tick(&[]);
        }
        let player = &sim.world().players[0];
        assert_eq!(player.pos[1], 100.0);
        assert_eq!(player.jumps, 1);
        assert_eq!(player.action, "idle");
    }

    #[test]
    fn test_left_flips() {
        let mut sim = quiet_sim(1);
        sim.advance_one_tick(&[InputToken::Left]);
        assert!(sim.world().players[0].flip);
    }

    #[test]
    fn test_shoot_spawns_player_projectile_with_cooldown() {
        let mut sim = quiet_sim(1);
        sim.advance_one_tick(&[InputToken::Shoot]);
        sim.advance_one_tick(&[InputToken::Shoot]);

        let projectiles = &sim.world().projectiles;
        assert_eq!(projectiles.len(), 1);
        assert_eq!(projectiles[0].owner, ProjectileOwner::Player);
        assert!(projectiles[0].velocity > 0.0);
    }

    #[test]
    fn test_enemy_layout_is_seeded() {
        let a = PlatformerSim::new(7);
        let b = PlatformerSim::new(7);
        assert_eq!(a.world(), b.world());
        assert_eq!(a.world().enemies.len(), 3);
    }

    #[test]
    fn test_step_actor_matches_live_player() {
        let mut sim = quiet_sim(3);
        let mut shadow = sim.world().players[0].clone();
        let script = [
            vec![InputToken::Right],
            vec![InputToken::Right, InputToken::Jump],
            vec![InputToken::Dash],
            vec![],
            vec![InputToken::Left],
        ];

        for inputs in &script {
            sim.step_actor(&mut shadow, inputs);
            sim.advance_one_tick(inputs);
            assert_eq!(shadow, sim.world().players[0]);
        }
    }

    #[test]
    fn test_transition_counts_toward_zero() {
        let mut sim = quiet_sim(1);
        sim.world_mut().transition = 2;
        sim.advance_one_tick(&[]);
        sim.advance_one_tick(&[]);
        sim.advance_one_tick(&[]);
        assert_eq!(sim.world().transition, 0);

        sim.world_mut().transition = -1;
        sim.advance_one_tick(&[]);
        assert_eq!(sim.world().transition, 0);
    }
}
