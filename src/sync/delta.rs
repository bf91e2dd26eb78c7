//! Delta Codec
//!
//! Compact difference between two snapshots, used to ship state changes
//! without resending the whole world.
//!
//! Entity lists are diffed in one of three shapes:
//!
//! ```text
//! same length, same id at every index  -> Positional  (index -> changed fields)
//! ids unique on both sides             -> Keyed       (added / removed / changed + order)
//! anything else                        -> Replace     (full current list)
//! ```
//!
//! Projectiles carry no id, so they are either positional or replaced.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::core::rng::RngState;
use crate::sim::{EntityKind, ProjectileOwner, Vec2};

use super::snapshot::{CaptureScope, EntitySnapshot, ProjectileSnapshot, SimulationSnapshot};

// =============================================================================
// FIELD DIFFS
// =============================================================================

/// Changed fields of one entity. `None` means unchanged.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityFields {
    /// New kind.
    pub kind: Option<EntityKind>,
    /// New id.
    pub id: Option<u32>,
    /// New position.
    pub pos: Option<Vec2>,
    /// New velocity.
    pub velocity: Option<Vec2>,
    /// New facing.
    pub flip: Option<bool>,
    /// New action name.
    pub action: Option<String>,
    /// New lives.
    pub lives: Option<i32>,
    /// New air time.
    pub air_time: Option<i32>,
    /// New jump charges.
    pub jumps: Option<i32>,
    /// New wall slide flag.
    pub wall_slide: Option<bool>,
    /// New dash ticks.
    pub dashing: Option<i32>,
    /// New shot cooldown.
    pub shoot_cooldown: Option<i32>,
    /// New walk ticks.
    pub walking: Option<i32>,
}

/// Keep `curr` only if it differs from `prev`.
fn changed<T: PartialEq + Clone>(prev: &T, curr: &T) -> Option<T> {
    (prev != curr).then(|| curr.clone())
}

// Floats compare by bit pattern so that -0.0 and 0.0 survive a round trip.
fn changed_f64(prev: f64, curr: f64) -> Option<f64> {
    (prev.to_bits() != curr.to_bits()).then_some(curr)
}

fn changed_vec2(prev: Vec2, curr: Vec2) -> Option<Vec2> {
    (prev[0].to_bits() != curr[0].to_bits() || prev[1].to_bits() != curr[1].to_bits())
        .then_some(curr)
}

impl EntityFields {
    /// Fields that differ between two entities, or `None` if identical.
    pub fn diff(prev: &EntitySnapshot, curr: &EntitySnapshot) -> Option<Self> {
        let fields = Self {
            kind: changed(&prev.kind, &curr.kind),
            id: changed(&prev.id, &curr.id),
            pos: changed_vec2(prev.pos, curr.pos),
            velocity: changed_vec2(prev.velocity, curr.velocity),
            flip: changed(&prev.flip, &curr.flip),
            action: changed(&prev.action, &curr.action),
            lives: changed(&prev.lives, &curr.lives),
            air_time: changed(&prev.air_time, &curr.air_time),
            jumps: changed(&prev.jumps, &curr.jumps),
            wall_slide: changed(&prev.wall_slide, &curr.wall_slide),
            dashing: changed(&prev.dashing, &curr.dashing),
            shoot_cooldown: changed(&prev.shoot_cooldown, &curr.shoot_cooldown),
            walking: changed(&prev.walking, &curr.walking),
        };
        (fields != Self::default()).then_some(fields)
    }

    /// Write the changed fields onto `entity`.
    pub fn apply(&self, entity: &mut EntitySnapshot) {
        if let Some(kind) = self.kind {
            entity.kind = kind;
        }
        if let Some(id) = self.id {
            entity.id = id;
        }
        if let Some(pos) = self.pos {
            entity.pos = pos;
        }
        if let Some(velocity) = self.velocity {
            entity.velocity = velocity;
        }
        if let Some(flip) = self.flip {
            entity.flip = flip;
        }
        if let Some(action) = &self.action {
            entity.action.clone_from(action);
        }
        if let Some(lives) = self.lives {
            entity.lives = lives;
        }
        if let Some(air_time) = self.air_time {
            entity.air_time = air_time;
        }
        if let Some(jumps) = self.jumps {
            entity.jumps = jumps;
        }
        if let Some(wall_slide) = self.wall_slide {
            entity.wall_slide = wall_slide;
        }
        if let Some(dashing) = self.dashing {
            entity.dashing = dashing;
        }
        if let Some(shoot_cooldown) = self.shoot_cooldown {
            entity.shoot_cooldown = shoot_cooldown;
        }
        if let Some(walking) = self.walking {
            entity.walking = walking;
        }
    }
}

/// Changed fields of one projectile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectileFields {
    /// New position.
    pub pos: Option<Vec2>,
    /// New horizontal speed.
    pub velocity: Option<f64>,
    /// New age.
    pub timer: Option<f64>,
    /// New owner.
    pub owner: Option<ProjectileOwner>,
}

impl ProjectileFields {
    /// Fields that differ, or `None` if identical.
    pub fn diff(prev: &ProjectileSnapshot, curr: &ProjectileSnapshot) -> Option<Self> {
        let fields = Self {
            pos: changed_vec2(prev.pos, curr.pos),
            velocity: changed_f64(prev.velocity, curr.velocity),
            timer: changed_f64(prev.timer, curr.timer),
            owner: changed(&prev.owner, &curr.owner),
        };
        (fields != Self::default()).then_some(fields)
    }

    /// Write the changed fields onto `projectile`.
    pub fn apply(&self, projectile: &mut ProjectileSnapshot) {
        if let Some(pos) = self.pos {
            projectile.pos = pos;
        }
        if let Some(velocity) = self.velocity {
            projectile.velocity = velocity;
        }
        if let Some(timer) = self.timer {
            projectile.timer = timer;
        }
        if let Some(owner) = self.owner {
            projectile.owner = owner;
        }
    }
}

// =============================================================================
// LIST DIFFS
// =============================================================================

/// One id-keyed change.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityChange {
    /// Entity present only in the current list.
    Added(EntitySnapshot),
    /// Entity present only in the previous list.
    Removed(u32),
    /// Entity present in both with differing fields.
    Changed {
        /// Entity id.
        id: u32,
        /// Fields that differ.
        fields: EntityFields,
    },
}

/// Difference between two entity lists.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityListDelta {
    /// Changed fields keyed by list index.
    Positional(Vec<(usize, EntityFields)>),
    /// Changes keyed by id, plus the id order of the resulting list.
    Keyed {
        /// Additions, removals and field changes.
        changes: Vec<EntityChange>,
        /// Ids of the resulting list, in order.
        order: Vec<u32>,
    },
    /// The whole current list.
    Replace(Vec<EntitySnapshot>),
}

/// Difference between two projectile lists.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectileListDelta {
    /// Changed fields keyed by list index.
    Positional(Vec<(usize, ProjectileFields)>),
    /// The whole current list.
    Replace(Vec<ProjectileSnapshot>),
}

/// Change to the embedded RNG state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RngChange {
    /// New state.
    Set(RngState),
    /// State no longer present.
    Clear,
}

fn unique_ids(list: &[EntitySnapshot]) -> bool {
    let mut seen = HashSet::with_capacity(list.len());
    list.iter().all(|e| seen.insert(e.id))
}

fn diff_entities(prev: &[EntitySnapshot], curr: &[EntitySnapshot]) -> Option<EntityListDelta> {
    let aligned = prev.len() == curr.len() && prev.iter().zip(curr).all(|(a, b)| a.id == b.id);

    if aligned {
        let changes: Vec<_> = prev
            .iter()
            .zip(curr)
            .enumerate()
            .filter_map(|(i, (a, b))| EntityFields::diff(a, b).map(|f| (i, f)))
            .collect();
        return (!changes.is_empty()).then_some(EntityListDelta::Positional(changes));
    }

    if !(unique_ids(prev) && unique_ids(curr)) {
        return Some(EntityListDelta::Replace(curr.to_vec()));
    }

    let before: HashMap<u32, &EntitySnapshot> = prev.iter().map(|e| (e.id, e)).collect();
    let after: HashSet<u32> = curr.iter().map(|e| e.id).collect();

    let mut changes: Vec<EntityChange> = prev
        .iter()
        .filter(|e| !after.contains(&e.id))
        .map(|e| EntityChange::Removed(e.id))
        .collect();

    for entity in curr {
        match before.get(&entity.id) {
            Some(old) => {
                if let Some(fields) = EntityFields::diff(old, entity) {
                    changes.push(EntityChange::Changed {
                        id: entity.id,
                        fields,
                    });
                }
            }
            None => changes.push(EntityChange::Added(entity.clone())),
        }
    }

    Some(EntityListDelta::Keyed {
        changes,
        order: curr.iter().map(|e| e.id).collect(),
    })
}

fn apply_entities(base: &[EntitySnapshot], delta: &EntityListDelta) -> Vec<EntitySnapshot> {
    match delta {
        EntityListDelta::Replace(list) => list.clone(),
        EntityListDelta::Positional(changes) => {
            let mut list = base.to_vec();
            for (index, fields) in changes {
                if let Some(entity) = list.get_mut(*index) {
                    fields.apply(entity);
                }
            }
            list
        }
        EntityListDelta::Keyed { changes, order } => {
            let mut by_id: HashMap<u32, EntitySnapshot> =
                base.iter().map(|e| (e.id, e.clone())).collect();
            for change in changes {
                match change {
                    EntityChange::Added(entity) => {
                        by_id.insert(entity.id, entity.clone());
                    }
                    EntityChange::Removed(id) => {
                        by_id.remove(id);
                    }
                    EntityChange::Changed { id, fields } => {
                        if let Some(entity) = by_id.get_mut(id) {
                            fields.apply(entity);
                        }
                    }
                }
            }
            order.iter().filter_map(|id| by_id.remove(id)).collect()
        }
    }
}

fn diff_projectiles(
    prev: &[ProjectileSnapshot],
    curr: &[ProjectileSnapshot],
) -> Option<ProjectileListDelta> {
    if prev.len() != curr.len() {
        return Some(ProjectileListDelta::Replace(curr.to_vec()));
    }
    let changes: Vec<_> = prev
        .iter()
        .zip(curr)
        .enumerate()
        .filter_map(|(i, (a, b))| ProjectileFields::diff(a, b).map(|f| (i, f)))
        .collect();
    (!changes.is_empty()).then_some(ProjectileListDelta::Positional(changes))
}

fn apply_projectiles(
    base: &[ProjectileSnapshot],
    delta: &ProjectileListDelta,
) -> Vec<ProjectileSnapshot> {
    match delta {
        ProjectileListDelta::Replace(list) => list.clone(),
        ProjectileListDelta::Positional(changes) => {
            let mut list = base.to_vec();
            for (index, fields) in changes {
                if let Some(projectile) = list.get_mut(*index) {
                    fields.apply(projectile);
                }
            }
            list
        }
    }
}

// =============================================================================
// SNAPSHOT DELTA
// =============================================================================

/// Difference between two snapshots. Every `None` field is unchanged.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDelta {
    /// New tick.
    pub tick: Option<u64>,
    /// New coverage.
    pub scope: Option<CaptureScope>,
    /// RNG state change.
    pub rng_state: Option<RngChange>,
    /// New score.
    pub score: Option<i64>,
    /// New death counter.
    pub dead_count: Option<i64>,
    /// New transition counter.
    pub transition: Option<i64>,
    /// Player list change.
    pub players: Option<EntityListDelta>,
    /// Enemy list change.
    pub enemies: Option<EntityListDelta>,
    /// Projectile list change.
    pub projectiles: Option<ProjectileListDelta>,
}

impl SnapshotDelta {
    /// True when applying this delta changes nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Compute the delta that turns `prev` into `curr`.
pub fn compute_delta(prev: &SimulationSnapshot, curr: &SimulationSnapshot) -> SnapshotDelta {
    let rng_state = match (&prev.rng_state, &curr.rng_state) {
        (a, b) if a == b => None,
        (_, Some(state)) => Some(RngChange::Set(state.clone())),
        (Some(_), None) => Some(RngChange::Clear),
        (None, None) => None,
    };

    SnapshotDelta {
        tick: changed(&prev.tick, &curr.tick),
        scope: changed(&prev.scope, &curr.scope),
        rng_state,
        score: changed(&prev.score, &curr.score),
        dead_count: changed(&prev.dead_count, &curr.dead_count),
        transition: changed(&prev.transition, &curr.transition),
        players: diff_entities(&prev.players, &curr.players),
        enemies: diff_entities(&prev.enemies, &curr.enemies),
        projectiles: diff_projectiles(&prev.projectiles, &curr.projectiles),
    }
}

/// Apply `delta` to a copy of `base`.
///
/// Applying a delta to a snapshot other than the one it was computed from
/// still yields a well-formed snapshot; out-of-range indices and unknown ids
/// are ignored.
pub fn apply_delta(base: &SimulationSnapshot, delta: &SnapshotDelta) -> SimulationSnapshot {
    let rng_state = match &delta.rng_state {
        None => base.rng_state.clone(),
        Some(RngChange::Set(state)) => Some(state.clone()),
        Some(RngChange::Clear) => None,
    };

    SimulationSnapshot {
        tick: delta.tick.unwrap_or(base.tick),
        scope: delta.scope.unwrap_or(base.scope),
        rng_state,
        players: match &delta.players {
            Some(d) => apply_entities(&base.players, d),
            None => base.players.clone(),
        },
        enemies: match &delta.enemies {
            Some(d) => apply_entities(&base.enemies, d),
            None => base.enemies.clone(),
        },
        projectiles: match &delta.projectiles {
            Some(d) => apply_projectiles(&base.projectiles, d),
            None => base.projectiles.clone(),
        },
        score: delta.score.unwrap_or(base.score),
        dead_count: delta.dead_count.unwrap_or(base.dead_count),
        transition: delta.transition.unwrap_or(base.transition),
    }
}

// =============================================================================
// TESTS
// =============================================================================
