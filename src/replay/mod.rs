//! Replays and Ghosts
//!
//! Records a run as per-tick inputs plus periodic players-only checkpoints,
//! persists best/last runs per level, and plays them back as a resimulated
//! ghost.
//!
//! ## Module Structure
//!
//! - `data`: Versioned JSON replay format
//! - `recorder`: Per-tick recording
//! - `ghost`: Resimulated playback actor
//! - `store`: Best/last files on disk
//! - `manager`: Level lifecycle glue (record, commit, ghost selection)
//! - `verify`: Resimulate a replay and check every checkpoint

pub mod data;
pub mod ghost;
pub mod manager;
pub mod recorder;
pub mod store;
pub mod verify;

pub use data::{InputRecord, ReplayData, ReplayError, REPLAY_VERSION};
pub use ghost::{GhostStatus, ReplayGhost, GHOST_ENTITY_ID};
pub use manager::ReplayManager;
pub use recorder::ReplayRecorder;
pub use store::{CommitOutcome, ReplayKind, ReplayStore, MIN_COMMIT_FRAMES};
pub use verify::{verify_replay, CheckpointResult, VerificationResult};
