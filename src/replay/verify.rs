//! Replay Verification
//!
//! Resimulates a recorded run on a fresh simulation and compares every
//! stored checkpoint against the resimulated state.

use tracing::{debug, warn};

use crate::core::hash::{short_hex, StateHash};
use crate::sim::Simulation;
use crate::sync::snapshot;

use super::data::{ReplayData, ReplayError};

/// Outcome of verifying a replay.
#[derive(Debug)]
pub struct VerificationResult {
    /// Every checkpoint matched.
    pub valid: bool,

    /// Number of ticks resimulated.
    pub ticks: u64,

    /// Per-checkpoint comparison, in tick order.
    pub checkpoint_results: Vec<CheckpointResult>,

    /// Reason verification could not run, if any.
    pub error: Option<ReplayError>,
}

impl VerificationResult {
    /// First checkpoint that did not match.
    pub fn first_divergence(&self) -> Option<&CheckpointResult> {
        self.checkpoint_results.iter().find(|c| !c.valid)
    }
}

/// Comparison at one checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointResult {
    /// Tick of the checkpoint.
    pub tick: u64,
    /// Checksum of the stored checkpoint.
    pub expected: StateHash,
    /// Checksum of the resimulated state.
    pub computed: StateHash,
    /// Did this checkpoint match?
    pub valid: bool,
}

/// Verify `replay` by resimulating it on `sim`.
///
/// `sim` must be freshly built from the replay's seed and level, in the
/// state the recording started from.
pub fn verify_replay<S: Simulation>(replay: &ReplayData, mut sim: S) -> VerificationResult {
    let checkpoints = match replay.decode_checkpoints() {
        Ok(checkpoints) => checkpoints,
        Err(e) => {
            return VerificationResult {
                valid: false,
                ticks: 0,
                checkpoint_results: vec![],
                error: Some(e),
            };
        }
    };

    let inputs = replay.input_map();
    let mut checkpoint_results = Vec::with_capacity(checkpoints.len());

    for tick in 0..replay.duration_frames {
        if let Some(expected) = checkpoints.get(&tick) {
            let computed = snapshot::capture(&sim, expected.scope != snapshot::CaptureScope::Full);
            let expected_hash = expected.checksum();
            let computed_hash = computed.checksum();
            let valid = expected_hash == computed_hash;
            if !valid {
                warn!(
                    tick,
                    expected = %short_hex(&expected_hash),
                    computed = %short_hex(&computed_hash),
                    "Replay checkpoint mismatch"
                );
            }
            checkpoint_results.push(CheckpointResult {
                tick,
                expected: expected_hash,
                computed: computed_hash,
                valid,
            });
        }

        let tick_inputs = inputs.get(&tick).map(Vec::as_slice).unwrap_or_default();
        sim.advance_one_tick(tick_inputs);
    }

    let valid = checkpoint_results.iter().all(|c| c.valid);
    debug!(
        ticks = replay.duration_frames,
        checkpoints = checkpoint_results.len(),
        valid,
        "Replay verified"
    );

    VerificationResult {
        valid,
        ticks: replay.duration_frames,
        checkpoint_results,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::recorder::ReplayRecorder;
    use crate::sim::{InputToken, PlatformerSim};

    fn record(seed: u64, ticks: u64) -> ReplayData {
        let mut sim = PlatformerSim::new(seed);
        let mut recorder = ReplayRecorder::new("1", "default", seed, 10);
        for t in 0..ticks {
            let inputs = match t % 12 {
                0 => vec![InputToken::Jump, InputToken::Right],
                3 => vec![InputToken::Shoot],
                7 => vec![InputToken::Dash],
                _ => vec![InputToken::Right],
            };
            recorder.record(&sim, &inputs);
            sim.advance_one_tick(&inputs);
        }
        recorder.finish()
    }

    #[test]
    fn test_resimulation_reproduces_checkpoints() {
        let replay = record(77, 200);
        let result = verify_replay(&replay, PlatformerSim::new(replay.seed));

        assert!(result.valid);
        assert!(result.error.is_none());
        assert_eq!(result.ticks, 200);
        assert_eq!(result.checkpoint_results.len(), 20);
        assert!(result.first_divergence().is_none());
    }

    #[test]
    fn test_tampered_inputs_detected() {
        let mut replay = record(77, 60);
        replay.inputs[15].inputs = vec![InputToken::Left];

        let result = verify_replay(&replay, PlatformerSim::new(replay.seed));
        assert!(!result.valid);
        let first = result.first_divergence().unwrap();
        assert_eq!(first.tick, 20);
        assert_ne!(first.expected, first.computed);
        // Checkpoints before the tampered tick still match.
        assert!(result.checkpoint_results[0].valid);
        assert!(result.checkpoint_results[1].valid);
    }

    #[test]
    fn test_malformed_checkpoint_reports_error() {
        let mut replay = record(5, 30);
        replay.snapshots.insert(10, serde_json::json!({"players": [{"pos": "left"}]}));

        let result = verify_replay(&replay, PlatformerSim::new(replay.seed));
        assert!(!result.valid);
        assert!(matches!(
            result.error,
            Some(ReplayError::Checkpoint { tick: 10, .. })
        ));
    }
}
