//! # Lane Siege Game Server
//!
//! Authoritative two-player lane battle server. Clients send intents over a
//! WebSocket; each match runs its own fixed-step simulation and broadcasts
//! full snapshots back to both players.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    LANE SIEGE SERVER                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/            - Shared primitives                        │
//! │  ├── vec2.rs      - 2D arena vector                          │
//! │  └── rng.rs       - Seeded Xorshift128+ PRNG                 │
//! │                                                              │
//! │  game/            - Match rules (pure, synchronous)          │
//! │  ├── state.rs     - Players, units, castles, structures      │
//! │  ├── economy.rs   - Balances, rate ramp, powerups            │
//! │  ├── effects.rs   - Deferred hits on the match clock         │
//! │  ├── combat.rs    - Targeting, modifiers, castle weapons     │
//! │  ├── structures.rs- Traps, turrets, mines                    │
//! │  ├── actions.rs   - Player intents                           │
//! │  ├── tick.rs      - Authoritative simulation loop            │
//! │  └── snapshot.rs  - Client state document                    │
//! │                                                              │
//! │  network/         - Networking (non-deterministic)           │
//! │  ├── server.rs    - WebSocket server                         │
//! │  ├── protocol.rs  - Message types                            │
//! │  └── session.rs   - Match sessions and registry              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism
//!
//! The `core/` and `game/` modules never read the wall clock:
//! - Time is a logical match clock advanced only by ticks
//! - No HashMap (uses BTreeMap for sorted iteration)
//! - All randomness from the match's seeded Xorshift128+
//!
//! Given the same seed and the same intents between the same ticks, a
//! match plays out identically.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use core::vec2::Vec2;
pub use core::rng::DeterministicRng;
pub use game::state::{MatchState, PlayerId, Slot, UnitKind, WeaponKind};
pub use game::tick::TICK_INTERVAL_MS;
pub use network::{GameServer, MatchRegistry, ServerConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
