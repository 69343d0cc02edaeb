//! Core primitives.
//!
//! Geometry and seeded randomness shared by every simulation module.

pub mod vec2;
pub mod rng;

// Re-export core types
pub use vec2::Vec2;
pub use rng::{DeterministicRng, derive_match_seed};
