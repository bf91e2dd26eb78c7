//! Replay recording.
//!
//! Called once per tick *before* the simulation steps, so the checkpoint
//! stored for tick `t` is the state the inputs of tick `t` were applied to.

use tracing::warn;

use crate::sim::{InputToken, Simulation};
use crate::sync::snapshot;

use super::data::{InputRecord, ReplayData};

/// Accumulates one run into a [`ReplayData`].
#[derive(Clone, Debug)]
pub struct ReplayRecorder {
    data: ReplayData,
    checkpoint_interval: u64,
}

impl ReplayRecorder {
    /// Start recording a run. An interval of zero is treated as one.
    pub fn new(
        level: impl Into<String>,
        skin: impl Into<String>,
        seed: u64,
        checkpoint_interval: u64,
    ) -> Self {
        Self {
            data: ReplayData::new(level, skin, seed),
            checkpoint_interval: checkpoint_interval.max(1),
        }
    }

    /// Ticks recorded so far.
    pub fn duration_frames(&self) -> u64 {
        self.data.duration_frames
    }

    /// Recorded data so far.
    pub fn data(&self) -> &ReplayData {
        &self.data
    }

    /// Log this tick's inputs and, every N ticks, a players-only checkpoint.
    pub fn record<S: Simulation + ?Sized>(&mut self, sim: &S, inputs: &[InputToken]) {
        let tick = self.data.duration_frames;

        if tick % self.checkpoint_interval == 0 {
            match snapshot::serialize(&snapshot::capture(sim, true)) {
                Ok(value) => {
                    self.data.snapshots.insert(tick, value);
                }
                Err(e) => warn!(tick, error = %e, "Skipping replay checkpoint"),
            }
        }

        self.data.inputs.push(InputRecord {
            tick,
            inputs: inputs.to_vec(),
        });
        self.data.duration_frames += 1;
    }

    /// Finish the run.
    pub fn finish(self) -> ReplayData {
        self.data
    }
}
