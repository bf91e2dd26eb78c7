//! Snapshot interpolation for remote entities.
//!
//! Remote state arrives at discrete ticks; rendering happens in between.
//! [`SnapshotHistory`] keeps a bounded, tick-ordered history and finds the
//! pair of samples around a (fractional) render tick.

use std::collections::VecDeque;

use crate::sim::Vec2;
use crate::sync::snapshot::EntitySnapshot;

/// Default number of samples kept.
pub const DEFAULT_HISTORY: usize = 20;

/// Where a render tick falls relative to the history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Surrounding<'a, T> {
    /// Nothing buffered.
    Empty,
    /// Target is older than the oldest sample.
    BeforeOldest(u64, &'a T),
    /// Target is at or past the newest sample.
    AtOrAfterNewest(u64, &'a T),
    /// Target lies between two samples; `t` is in `[0, 1)`.
    Between {
        /// Earlier sample.
        prev: (u64, &'a T),
        /// Later sample.
        next: (u64, &'a T),
        /// Fraction of the way from `prev` to `next`.
        t: f64,
    },
}

/// Bounded tick-ordered sample history.
#[derive(Debug, Clone)]
pub struct SnapshotHistory<T> {
    samples: VecDeque<(u64, T)>,
    max_size: usize,
}

impl<T> Default for SnapshotHistory<T> {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY)
    }
}

impl<T> SnapshotHistory<T> {
    /// History keeping at most `max_size` samples (at least one).
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            samples: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when empty.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Add a sample. Returns `false` if it is older than the newest sample
    /// and was dropped; a sample for the newest tick replaces it.
    pub fn push(&mut self, tick: u64, state: T) -> bool {
        match self.samples.back_mut() {
            Some((newest, _)) if tick < *newest => return false,
            Some((newest, slot)) if tick == *newest => {
                *slot = state;
                return true;
            }
            _ => {}
        }
        if self.samples.len() == self.max_size {
            self.samples.pop_front();
        }
        self.samples.push_back((tick, state));
        true
    }

    /// Locate `target` within the history.
    pub fn surrounding(&self, target: f64) -> Surrounding<'_, T> {
        let (Some((oldest, first)), Some((newest, last))) =
            (self.samples.front(), self.samples.back())
        else {
            return Surrounding::Empty;
        };

        if target >= *newest as f64 {
            return Surrounding::AtOrAfterNewest(*newest, last);
        }
        if target < *oldest as f64 {
            return Surrounding::BeforeOldest(*oldest, first);
        }

        // Render ticks usually trail the newest sample closely.
        for i in (1..self.samples.len()).rev() {
            let (next_tick, next) = &self.samples[i];
            let (prev_tick, prev) = &self.samples[i - 1];
            let (lo, hi) = (*prev_tick as f64, *next_tick as f64);
            if lo <= target && target < hi {
                return Surrounding::Between {
                    prev: (*prev_tick, prev),
                    next: (*next_tick, next),
                    t: (target - lo) / (hi - lo),
                };
            }
        }
        Surrounding::Empty
    }
}

/// Rendered state of an entity between two samples.
#[derive(Debug, Clone, PartialEq)]
pub struct InterpolatedState {
    /// Interpolated position.
    pub pos: Vec2,
    /// Interpolated velocity.
    pub velocity: Vec2,
    /// Facing, from the earlier sample.
    pub flip: bool,
    /// Action, from the earlier sample.
    pub action: String,
}

impl From<&EntitySnapshot> for InterpolatedState {
    fn from(e: &EntitySnapshot) -> Self {
        Self {
            pos: e.pos,
            velocity: e.velocity,
            flip: e.flip,
            action: e.action.clone(),
        }
    }
}

#[inline]
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

#[inline]
fn lerp_vec2(a: Vec2, b: Vec2, t: f64) -> Vec2 {
    [lerp(a[0], b[0], t), lerp(a[1], b[1], t)]
}

/// Blend two entity samples. Continuous fields are interpolated linearly;
/// discrete fields keep the earlier sample until the next one is reached.
pub fn interpolate_entity(prev: &EntitySnapshot, next: &EntitySnapshot, t: f64) -> InterpolatedState {
    InterpolatedState {
        pos: lerp_vec2(prev.pos, next.pos, t),
        velocity: lerp_vec2(prev.velocity, next.velocity, t),
        flip: prev.flip,
        action: prev.action.clone(),
    }
}

impl SnapshotHistory<EntitySnapshot> {
    /// Entity state to render at `target`. Outside the history the nearest
    /// sample is held.
    pub fn sample(&self, target: f64) -> Option<InterpolatedState> {
        match self.surrounding(target) {
            Surrounding::Empty => None,
            Surrounding::BeforeOldest(_, state) | Surrounding::AtOrAfterNewest(_, state) => {
                Some(state.into())
            }
            Surrounding::Between { prev, next, t } => Some(interpolate_entity(prev.1, next.1, t)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(x: f64, action: &str) -> EntitySnapshot {
        EntitySnapshot {
            pos: [x, 0.0],
            velocity: [x / 10.0, 0.0],
            action: action.to_string(),
            ..EntitySnapshot::default()
        }
    }

    #[test]
    fn test_surrounding_cases() {
        let mut history = SnapshotHistory::new(8);
        assert!(matches!(history.surrounding(1.0), Surrounding::Empty));

        history.push(10, 'a');
        history.push(20, 'b');
        history.push(30, 'c');

        assert_eq!(history.surrounding(5.0), Surrounding::BeforeOldest(10, &'a'));
        assert_eq!(history.surrounding(30.0), Surrounding::AtOrAfterNewest(30, &'c'));
        assert_eq!(
            history.surrounding(25.0),
            Surrounding::Between {
                prev: (20, &'b'),
                next: (30, &'c'),
                t: 0.5
            }
        );
        assert_eq!(
            history.surrounding(10.0),
            Surrounding::Between {
                prev: (10, &'a'),
                next: (20, &'b'),
                t: 0.0
            }
        );
    }

    #[test]
    fn test_out_of_order_dropped_and_bounded() {
        let mut history = SnapshotHistory::new(3);
        assert!(history.push(5, 0));
        assert!(!history.push(4, 1));
        assert!(history.push(5, 2));
        assert_eq!(history.len(), 1);

        for tick in 6..10 {
            history.push(tick, 0);
        }
        assert_eq!(history.len(), 3);
        assert!(matches!(history.surrounding(0.0), Surrounding::BeforeOldest(7, _)));
    }

    #[test]
    fn test_interpolate_entity() {
        let mut prev = at(0.0, "run");
        prev.flip = true;
        let next = at(10.0, "jump");

        let mid = interpolate_entity(&prev, &next, 0.25);
        assert_eq!(mid.pos, [2.5, 0.0]);
        assert_eq!(mid.velocity, [0.25, 0.0]);
        assert!(mid.flip);
        assert_eq!(mid.action, "run");
    }

    #[test]
    fn test_sample_holds_edges() {
        let mut history = SnapshotHistory::default();
        assert!(history.sample(0.0).is_none());

        history.push(100, at(4.0, "idle"));
        history.push(104, at(8.0, "run"));

        assert_eq!(history.sample(90.0).unwrap().pos, [4.0, 0.0]);
        assert_eq!(history.sample(102.0).unwrap().pos, [6.0, 0.0]);
        assert_eq!(history.sample(200.0).unwrap().action, "run");
    }
}
