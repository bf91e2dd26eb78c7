//! State Synchronization
//!
//! Snapshot capture/restore, delta encoding, the rollback buffer and
//! prediction reconciliation. Everything here runs synchronously inside the
//! owner's tick.
//!
//! ## Module Structure
//!
//! - `snapshot`: Capture, restore and (de)serialization of whole-world state
//! - `delta`: Field-level differences between snapshots
//! - `rollback`: Fixed-capacity tick-indexed frame history
//! - `reconcile`: Prediction, divergence detection and resimulation

pub mod delta;
pub mod reconcile;
pub mod rollback;
pub mod snapshot;

pub use delta::{apply_delta, compute_delta, EntityListDelta, SnapshotDelta};
pub use reconcile::{DivergenceCheck, ReconcileOutcome, ReconciliationService};
pub use rollback::{FrameData, FrameMiss, Lookup, RollbackBuffer};
pub use snapshot::{
    CaptureScope, EntitySnapshot, ProjectileSnapshot, SimulationSnapshot, SnapshotError,
};
