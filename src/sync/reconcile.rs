//! Reconciliation Service
//!
//! Client-side prediction with rollback. The service owns the simulation and
//! its [`RollbackBuffer`]:
//!
//! ```text
//! predict(inputs)           step -> capture -> push (tick, snapshot, inputs)
//!
//! on_authoritative_snapshot(auth)
//!   local = buffer[auth.tick]            missing    -> NotBuffered
//!   target = overlay(local, auth)
//!   compare(local, target)               equal      -> Consistent
//!   restore(target), buffer[auth.tick] = target
//!   for t in auth.tick+1 ..= newest:     inputs gap -> Partial
//!       step(buffer[t].inputs), buffer[t] = capture
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::hash::short_hex;
use crate::sim::{InputToken, Simulation};

use super::rollback::{FrameMiss, RollbackBuffer};
use super::snapshot::{self, SimulationSnapshot, SnapshotError};

/// How local and authoritative state are compared.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DivergenceCheck {
    /// Only the first player's position.
    PrimaryPosition,
    /// SHA-256 over every snapshot field.
    #[default]
    Checksum,
}

impl DivergenceCheck {
    /// True when `local` and `authoritative` disagree under this check.
    pub fn diverged(self, local: &SimulationSnapshot, authoritative: &SimulationSnapshot) -> bool {
        match self {
            DivergenceCheck::PrimaryPosition => {
                local.primary().map(|p| p.pos) != authoritative.primary().map(|p| p.pos)
            }
            DivergenceCheck::Checksum => local.checksum() != authoritative.checksum(),
        }
    }
}

impl fmt::Display for DivergenceCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DivergenceCheck::PrimaryPosition => "primary_position",
            DivergenceCheck::Checksum => "checksum",
        })
    }
}

impl FromStr for DivergenceCheck {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "primary_position" | "position" => Ok(DivergenceCheck::PrimaryPosition),
            "checksum" => Ok(DivergenceCheck::Checksum),
            other => Err(format!("unknown divergence check: {other}")),
        }
    }
}

/// What handling an authoritative snapshot did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// No local frame for the authoritative tick; the snapshot was discarded.
    NotBuffered(FrameMiss),
    /// Local state already matched.
    Consistent {
        /// Authoritative tick.
        tick: u64,
    },
    /// State was corrected and every later buffered tick resimulated.
    Corrected {
        /// Authoritative tick.
        tick: u64,
        /// Number of ticks resimulated.
        resimulated: u64,
    },
    /// State was corrected but resimulation stopped at a missing frame.
    Partial {
        /// Authoritative tick.
        tick: u64,
        /// Ticks resimulated before stopping.
        resimulated: u64,
        /// The frame that was missing.
        missing: FrameMiss,
    },
}

impl ReconcileOutcome {
    /// True if the live state was rewritten.
    pub fn corrected(&self) -> bool {
        matches!(
            self,
            ReconcileOutcome::Corrected { .. } | ReconcileOutcome::Partial { .. }
        )
    }
}

/// Prediction plus rollback-and-resimulate for one simulation instance.
pub struct ReconciliationService<S: Simulation> {
    sim: S,
    buffer: RollbackBuffer,
    check: DivergenceCheck,
}

impl<S: Simulation> ReconciliationService<S> {
    /// Wrap `sim`, buffering its current state as the first frame.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(sim: S, capacity: usize, check: DivergenceCheck) -> Self {
        let mut buffer = RollbackBuffer::new(capacity);
        // An empty buffer accepts any tick.
        let _ = buffer.push(snapshot::capture(&sim, false), Vec::new());
        Self { sim, buffer, check }
    }

    /// The simulation.
    pub fn sim(&self) -> &S {
        &self.sim
    }

    /// Mutable access to the simulation.
    ///
    /// Ticks advanced through here bypass the buffer and cannot be
    /// resimulated.
    pub fn sim_mut(&mut self) -> &mut S {
        &mut self.sim
    }

    /// The frame history.
    pub fn buffer(&self) -> &RollbackBuffer {
        &self.buffer
    }

    /// Comparison in use.
    pub fn divergence_check(&self) -> DivergenceCheck {
        self.check
    }

    /// Give back the simulation.
    pub fn into_inner(self) -> S {
        self.sim
    }

    /// Step one tick locally and buffer the result.
    ///
    /// Returns the new tick.
    pub fn predict(&mut self, inputs: &[InputToken]) -> Result<u64, FrameMiss> {
        self.sim.advance_one_tick(inputs);
        let snap = snapshot::capture(&self.sim, false);
        let tick = snap.tick;
        self.buffer.push(snap, inputs.to_vec())?;
        Ok(tick)
    }

    /// Compare an authoritative snapshot against local history and, on
    /// divergence, rewind to it and replay buffered inputs up to the newest
    /// predicted tick.
    ///
    /// The authoritative snapshot is laid over the buffered frame for its
    /// tick, so whatever it leaves out (players-only captures, a missing RNG
    /// state) is taken from local history at that same tick.
    pub fn on_authoritative_snapshot(
        &mut self,
        authoritative: &SimulationSnapshot,
    ) -> Result<ReconcileOutcome, SnapshotError> {
        let tick = authoritative.tick;

        let local = match self.buffer.get(tick) {
            Ok(frame) => frame,
            Err(miss) => {
                debug!(tick, %miss, "Discarding authoritative snapshot");
                return Ok(ReconcileOutcome::NotBuffered(miss));
            }
        };

        let target = snapshot::overlay(&local.snapshot, authoritative);
        if !self.check.diverged(&local.snapshot, &target) {
            debug!(tick, scope = ?authoritative.scope, "Prediction consistent");
            return Ok(ReconcileOutcome::Consistent { tick });
        }

        info!(
            tick,
            check = %self.check,
            scope = ?authoritative.scope,
            local = %short_hex(&local.snapshot.checksum()),
            authoritative = %short_hex(&target.checksum()),
            "Prediction diverged, rolling back"
        );

        let inputs_at_tick = local.inputs.clone();
        // Checked against the buffer above, so every tick from here on is
        // inside the window.
        let newest = self.buffer.newest_tick().unwrap_or(tick);

        snapshot::restore(&mut self.sim, &target)?;
        self.buffer.push(target, inputs_at_tick).ok();

        let mut resimulated = 0;
        for t in tick + 1..=newest {
            let inputs = match self.buffer.get(t) {
                Ok(frame) => frame.inputs.clone(),
                Err(missing) => {
                    warn!(tick, at = t, %missing, "Resimulation stopped early");
                    return Ok(ReconcileOutcome::Partial {
                        tick,
                        resimulated,
                        missing,
                    });
                }
            };
            self.sim.advance_one_tick(&inputs);
            self.buffer
                .push(snapshot::capture(&self.sim, false), inputs)
                .ok();
            resimulated += 1;
        }

        info!(tick, resimulated, "Rollback complete");
        Ok(ReconcileOutcome::Corrected { tick, resimulated })
    }
}

// =============================================================================
// TESTS
// =============================================================================
