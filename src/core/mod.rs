//! Core deterministic primitives.
//!
//! Geometry and hashing shared by the simulation and the replay verifier.
//! Nothing in here reads the clock or holds state between calls.

pub mod geometry;
pub mod hash;

// Re-export core types
pub use geometry::{Point, Path, path_contains};
pub use hash::{StateHash, StateHasher, compute_state_hash};
