//! Network Layer
//!
//! WebSocket gateway, wire protocol and per-match sessions.
//! This layer is **non-deterministic** - all game logic runs through `game/`.

pub mod protocol;
pub mod session;
pub mod server;

pub use protocol::{ClientMessage, ServerMessage, ErrorCode};
pub use session::{MatchSession, MatchRegistry, JoinOutcome, SharedSession};
pub use server::{GameServer, ServerConfig, GameServerError};
