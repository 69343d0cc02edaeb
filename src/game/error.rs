//! Action Rejections
//!
//! Every player intent either succeeds or returns one of these. A rejection
//! never leaves partial state behind. The `Display` text is what clients see.

/// Why an intent was refused.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ActionError {
    /// Not enough resources for the purchase.
    #[error("Insufficient resources: need {needed:.0}, have {available:.0}")]
    InsufficientResources {
        /// Price of the action.
        needed: f64,
        /// Balance at the time of the attempt.
        available: f64,
    },

    /// Placement outside the player's half of the arena.
    #[error("Placement must be on your side of the arena")]
    OutOfZone,

    /// Placement too close to an existing structure.
    #[error("Too close to another structure")]
    TooClose,

    /// No structure with that id is owned by the player.
    #[error("Structure not found")]
    StructureNotFound,

    /// Already at the level cap.
    #[error("Already at max level")]
    MaxLevel,

    /// Powerup was bought earlier in this match.
    #[error("Powerup already purchased")]
    AlreadyPurchased,

    /// Both player slots are taken.
    #[error("Match is full")]
    MatchFull,

    /// The match has already been decided.
    #[error("Match is over")]
    MatchOver,

    /// No match with that id is registered.
    #[error("Unknown match")]
    UnknownMatch,

    /// The sender is not a player in that match.
    #[error("Unknown player")]
    UnknownPlayer,

    /// Lane index outside 0..=2.
    #[error("Invalid lane {0}")]
    InvalidLane(u8),

    /// Castle level too low for the requested weapon.
    #[error("Castle level {required} required")]
    LevelTooLow {
        /// Minimum castle level.
        required: u8,
    },

    /// The castle already carries that weapon.
    #[error("Weapon already equipped")]
    WeaponAlreadyEquipped,

    /// Caller-supplied price is unusable.
    #[error("Invalid cost")]
    InvalidCost,

    /// This player already asked for a rematch.
    #[error("Rematch already requested")]
    RematchAlreadyRequested,
}

/// Result alias for player intents.
pub type ActionResult<T> = Result<T, ActionError>;
