//! Game Events
//!
//! Events generated during simulation. The session drains them after each
//! tick or intent for logging and for the one-off client notifications.

use serde::{Serialize, Deserialize};
use crate::game::state::{EntityId, PlayerId, UnitKind, WeaponKind};

/// Why a match ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// A castle reached zero health
    BaseDestroyed,
    /// A player won the gamble
    Gamble,
}

/// Game event data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GameEventData {
    /// A unit entered the field
    UnitSpawned {
        player_id: PlayerId,
        unit_id: EntityId,
        kind: UnitKind,
        lane: u8,
    },

    /// A unit's health reached zero
    UnitKilled {
        unit_id: EntityId,
        kind: UnitKind,
        owner: PlayerId,
        killer: Option<PlayerId>,
        reward: f64,
    },

    /// A trap or mine went off
    StructureTriggered {
        structure_id: EntityId,
        owner: PlayerId,
        victims: u32,
    },

    /// A turret was destroyed
    TurretDestroyed {
        turret_id: EntityId,
        owner: PlayerId,
    },

    /// A castle gained a level
    CastleUpgraded {
        player_id: PlayerId,
        level: u8,
    },

    /// A castle switched weapons
    WeaponChanged {
        player_id: PlayerId,
        weapon: WeaponKind,
    },

    /// The shared generation rate went up
    RateIncreased {
        rate: f64,
    },

    /// A gamble paid off
    GambleWon {
        player_id: PlayerId,
    },

    /// Match was reset to the starting position
    MatchReset,

    /// Match ended
    MatchEnded {
        winner_id: Option<PlayerId>,
        reason: EndReason,
    },
}

/// A game event stamped with the match clock.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Match clock when the event occurred
    pub at_ms: u64,

    /// Player the event is about
    pub player_id: Option<PlayerId>,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(at_ms: u64, data: GameEventData) -> Self {
        let player_id = match &data {
            GameEventData::UnitSpawned { player_id, .. } => Some(*player_id),
            GameEventData::UnitKilled { owner, .. } => Some(*owner),
            GameEventData::StructureTriggered { owner, .. } => Some(*owner),
            GameEventData::TurretDestroyed { owner, .. } => Some(*owner),
            GameEventData::CastleUpgraded { player_id, .. } => Some(*player_id),
            GameEventData::WeaponChanged { player_id, .. } => Some(*player_id),
            GameEventData::GambleWon { player_id } => Some(*player_id),
            GameEventData::MatchEnded { winner_id, .. } => *winner_id,
            _ => None,
        };

        Self { at_ms, player_id, data }
    }

    /// Create unit spawned event.
    pub fn unit_spawned(
        at_ms: u64,
        player_id: PlayerId,
        unit_id: EntityId,
        kind: UnitKind,
        lane: u8,
    ) -> Self {
        Self::new(at_ms, GameEventData::UnitSpawned { player_id, unit_id, kind, lane })
    }

    /// Create unit killed event.
    pub fn unit_killed(
        at_ms: u64,
        unit_id: EntityId,
        kind: UnitKind,
        owner: PlayerId,
        killer: Option<PlayerId>,
        reward: f64,
    ) -> Self {
        Self::new(at_ms, GameEventData::UnitKilled { unit_id, kind, owner, killer, reward })
    }

    /// Create structure triggered event.
    pub fn structure_triggered(
        at_ms: u64,
        structure_id: EntityId,
        owner: PlayerId,
        victims: u32,
    ) -> Self {
        Self::new(at_ms, GameEventData::StructureTriggered { structure_id, owner, victims })
    }

    /// Create turret destroyed event.
    pub fn turret_destroyed(at_ms: u64, turret_id: EntityId, owner: PlayerId) -> Self {
        Self::new(at_ms, GameEventData::TurretDestroyed { turret_id, owner })
    }

    /// Create castle upgraded event.
    pub fn castle_upgraded(at_ms: u64, player_id: PlayerId, level: u8) -> Self {
        Self::new(at_ms, GameEventData::CastleUpgraded { player_id, level })
    }

    /// Create weapon changed event.
    pub fn weapon_changed(at_ms: u64, player_id: PlayerId, weapon: WeaponKind) -> Self {
        Self::new(at_ms, GameEventData::WeaponChanged { player_id, weapon })
    }

    /// Create rate increased event.
    pub fn rate_increased(at_ms: u64, rate: f64) -> Self {
        Self::new(at_ms, GameEventData::RateIncreased { rate })
    }

    /// Create gamble won event.
    pub fn gamble_won(at_ms: u64, player_id: PlayerId) -> Self {
        Self::new(at_ms, GameEventData::GambleWon { player_id })
    }

    /// Create match reset event.
    pub fn match_reset(at_ms: u64) -> Self {
        Self::new(at_ms, GameEventData::MatchReset)
    }

    /// Create match ended event.
    pub fn match_ended(at_ms: u64, winner_id: Option<PlayerId>, reason: EndReason) -> Self {
        Self::new(at_ms, GameEventData::MatchEnded { winner_id, reason })
    }
}
