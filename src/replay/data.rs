//! Replay file format.
//!
//! ```json
//! {
//!   "version": 2,
//!   "level": "3",
//!   "skin": "default",
//!   "seed": 42,
//!   "duration_frames": 812,
//!   "inputs": [{"tick": 0, "inputs": ["right"]}, ...],
//!   "snapshots": {"0": {...}, "10": {...}}
//! }
//! ```
//!
//! Inputs are logged for every tick; snapshots are players-only checkpoints
//! taken every N ticks and stored in their serialized JSON form.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sim::InputToken;
use crate::sync::snapshot::{self, SimulationSnapshot, SnapshotError};

/// Current replay format version.
pub const REPLAY_VERSION: u32 = 2;

/// Errors loading, saving or decoding replays.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// File system failure.
    #[error("replay io error: {0}")]
    Io(#[from] std::io::Error),

    /// Not valid replay JSON.
    #[error("invalid replay json: {0}")]
    Json(#[from] serde_json::Error),

    /// Written by a newer format.
    #[error("unsupported replay version {found} (supported up to {supported})")]
    UnsupportedVersion {
        /// Version in the file.
        found: u32,
        /// Newest supported version.
        supported: u32,
    },

    /// Level name cannot be used as a file name.
    #[error("invalid level name {0:?}")]
    InvalidLevel(String),

    /// A stored checkpoint could not be decoded.
    #[error("malformed checkpoint at tick {tick}: {source}")]
    Checkpoint {
        /// Tick of the checkpoint.
        tick: u64,
        /// Underlying decode error.
        #[source]
        source: SnapshotError,
    },
}

/// Inputs active during one tick.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRecord {
    /// Tick relative to the start of the run.
    pub tick: u64,
    /// Active tokens.
    #[serde(default)]
    pub inputs: Vec<InputToken>,
}

fn default_version() -> u32 {
    REPLAY_VERSION
}

fn default_level() -> String {
    "0".to_string()
}

fn default_skin() -> String {
    "default".to_string()
}

/// A recorded run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplayData {
    /// Format version.
    #[serde(default = "default_version")]
    pub version: u32,
    /// Level identifier.
    #[serde(default = "default_level")]
    pub level: String,
    /// Cosmetic skin of the recorded player.
    #[serde(default = "default_skin")]
    pub skin: String,
    /// World seed of the run.
    #[serde(default)]
    pub seed: u64,
    /// Number of recorded ticks.
    #[serde(default)]
    pub duration_frames: u64,
    /// Per-tick inputs.
    #[serde(default)]
    pub inputs: Vec<InputRecord>,
    /// Serialized players-only checkpoints by tick.
    #[serde(default)]
    pub snapshots: BTreeMap<u64, serde_json::Value>,
}

impl ReplayData {
    /// Empty replay for a new run.
    pub fn new(level: impl Into<String>, skin: impl Into<String>, seed: u64) -> Self {
        Self {
            version: REPLAY_VERSION,
            level: level.into(),
            skin: skin.into(),
            seed,
            duration_frames: 0,
            inputs: Vec::new(),
            snapshots: BTreeMap::new(),
        }
    }

    /// Parse replay JSON, rejecting versions newer than this build.
    pub fn from_json(json: &str) -> Result<Self, ReplayError> {
        let data: ReplayData = serde_json::from_str(json)?;
        if data.version > REPLAY_VERSION {
            return Err(ReplayError::UnsupportedVersion {
                found: data.version,
                supported: REPLAY_VERSION,
            });
        }
        Ok(data)
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, ReplayError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode the checkpoint stored for `tick`, if any.
    pub fn checkpoint(&self, tick: u64) -> Option<Result<SimulationSnapshot, ReplayError>> {
        self.snapshots.get(&tick).map(|value| {
            snapshot::deserialize(value).map_err(|source| ReplayError::Checkpoint { tick, source })
        })
    }

    /// Decode every checkpoint.
    pub fn decode_checkpoints(&self) -> Result<BTreeMap<u64, SimulationSnapshot>, ReplayError> {
        self.snapshots
            .keys()
            .filter_map(|&tick| self.checkpoint(tick).map(|r| r.map(|s| (tick, s))))
            .collect()
    }

    /// Inputs keyed by tick.
    pub fn input_map(&self) -> BTreeMap<u64, Vec<InputToken>> {
        self.inputs
            .iter()
            .map(|record| (record.tick, record.inputs.clone()))
            .collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_shape() {
        let mut data = ReplayData::new("3", "default", 42);
        data.inputs.push(InputRecord {
            tick: 0,
            inputs: vec![InputToken::Right, InputToken::Jump],
        });
        data.snapshots.insert(0, serde_json::json!({"tick": 0}));
        data.duration_frames = 1;

        let value: serde_json::Value = serde_json::from_str(&data.to_json().unwrap()).unwrap();
        assert_eq!(value["version"], 2);
        assert_eq!(value["level"], "3");
        assert_eq!(value["inputs"][0]["inputs"], serde_json::json!(["right", "jump"]));
        assert!(value["snapshots"]["0"].is_object());

        assert_eq!(ReplayData::from_json(&data.to_json().unwrap()).unwrap(), data);
    }

    #[test]
    fn test_missing_fields_default() {
        let data = ReplayData::from_json("{}").unwrap();
        assert_eq!(data.version, REPLAY_VERSION);
        assert_eq!(data.level, "0");
        assert_eq!(data.skin, "default");
        assert!(data.inputs.is_empty());
        assert!(data.snapshots.is_empty());
    }

    #[test]
    fn test_newer_version_rejected() {
        let err = ReplayData::from_json(r#"{"version": 9}"#).unwrap_err();
        assert!(matches!(
            err,
            ReplayError::UnsupportedVersion { found: 9, supported: 2 }
        ));
    }

    #[test]
    fn test_malformed_checkpoint() {
        let mut data = ReplayData::new("1", "default", 0);
        data.snapshots.insert(10, serde_json::json!({"players": 5}));

        assert!(data.checkpoint(0).is_none());
        assert!(matches!(
            data.checkpoint(10),
            Some(Err(ReplayError::Checkpoint { tick: 10, .. }))
        ));
        assert!(data.decode_checkpoints().is_err());
    }

    #[test]
    fn test_unknown_input_token_rejected() {
        let json = r#"{"inputs": [{"tick": 0, "inputs": ["moonwalk"]}]}"#;
        assert!(matches!(ReplayData::from_json(json), Err(ReplayError::Json(_))));
    }
}
