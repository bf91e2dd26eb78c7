//! Core deterministic primitives.
//!
//! Everything here is pure and platform-independent: the seeded RNG that
//! each simulation owns, and the hashing used to compare states.

pub mod hash;
pub mod rng;

// Re-export core types
pub use hash::{StateHash, StateHasher};
pub use rng::{DeterministicRng, RngState, RngStateError};
