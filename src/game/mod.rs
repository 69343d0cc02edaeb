//! Game Logic Module
//!
//! All match simulation code. Pure and synchronous: no I/O, no wall clock,
//! randomness only from the match's own seeded generator.
//!
//! ## Module Structure
//!
//! - `state`: Match state, players, units, castles, structures
//! - `economy`: Balances, generation rate, prices, powerups
//! - `effects`: Deferred damage and removals on the match clock
//! - `combat`: Targeting, damage modifiers, castle weapons, win detection
//! - `structures`: Traps, turrets and mines
//! - `actions`: Player intents and their validation
//! - `tick`: Authoritative simulation loop
//! - `snapshot`: Client-facing state document
//! - `events`: Game events for logging and notifications
//! - `error`: Rejection reasons

pub mod state;
pub mod economy;
pub mod effects;
pub mod combat;
pub mod structures;
pub mod actions;
pub mod tick;
pub mod snapshot;
pub mod events;
pub mod error;

// Re-export key types
pub use state::{MatchState, PlayerId, Slot, UnitKind, WeaponKind, EntityId};
pub use structures::StructureKind;
pub use actions::{Intent, Outcome, RematchStatus};
pub use tick::{tick, TickResult, TICK_INTERVAL_MS};
pub use snapshot::MatchSnapshot;
pub use events::{GameEvent, GameEventData};
pub use error::{ActionError, ActionResult};
