//! # rollsync
//!
//! Deterministic state synchronization for a 2D action platformer:
//! snapshots, deltas, rollback/resimulation and replay ghosts.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         ROLLSYNC                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── rng.rs      - Xorshift128+ PRNG with portable state     │
//! │  └── hash.rs     - SHA-256 state checksums                   │
//! │                                                              │
//! │  sim/            - Simulation contract                       │
//! │  ├── input.rs    - Per-tick input tokens                     │
//! │  └── platformer.rs - Reference platformer simulation         │
//! │                                                              │
//! │  sync/           - State synchronization (deterministic)     │
//! │  ├── snapshot.rs - Capture / restore / serialize             │
//! │  ├── delta.rs    - Snapshot deltas                           │
//! │  ├── rollback.rs - Tick-indexed frame history                │
//! │  └── reconcile.rs- Prediction and rollback                   │
//! │                                                              │
//! │  replay/         - Recording, storage, ghosts, verification  │
//! │                                                              │
//! │  network/        - Messaging (non-deterministic)             │
//! │  ├── protocol.rs - Message envelope                          │
//! │  ├── transport.rs- Transport trait + loopback                │
//! │  ├── netsync.rs  - Typed send/receive                        │
//! │  └── interpolation.rs - Remote entity smoothing              │
//! │                                                              │
//! │  batch.rs        - Parallel independent instances            │
//! │  config.rs       - Environment-driven settings               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! The `core/`, `sim/` and `sync/` modules are deterministic:
//! - No system time dependencies
//! - All randomness from the world-owned seeded Xorshift128+
//! - Snapshots are owned deep copies, never aliased with live state
//!
//! Given an identical snapshot (including RNG state) and identical inputs,
//! the simulation produces identical results.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod batch;
pub mod config;
pub mod core;
pub mod network;
pub mod replay;
pub mod sim;
pub mod sync;

// Re-export commonly used types
pub use config::{GhostMode, SyncConfig};
pub use crate::core::rng::{DeterministicRng, RngState};
pub use sim::{InputToken, Simulation, World};
pub use sync::reconcile::{DivergenceCheck, ReconcileOutcome, ReconciliationService};
pub use sync::rollback::RollbackBuffer;
pub use sync::snapshot::SimulationSnapshot;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Simulation tick rate (Hz)
pub const TICK_RATE: u32 = 60;

/// Default rollback history (10 seconds at 60 Hz)
pub const DEFAULT_ROLLBACK_CAPACITY: usize = 600;

/// Default ticks between replay checkpoints
pub const DEFAULT_CHECKPOINT_INTERVAL: u64 = 10;
