//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! Every frame is a JSON text message, internally tagged by `"type"`,
//! with camelCase variant and field names.

use serde::{Serialize, Deserialize};

use crate::core::vec2::Vec2;
use crate::game::actions::Intent;
use crate::game::error::ActionError;
use crate::game::snapshot::MatchSnapshot;
use crate::game::state::{EntityId, PlayerId, UnitKind, WeaponKind};
use crate::game::structures::StructureKind;

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Take a seat in a match (created on first join).
    Join { match_id: String, player_name: String },

    /// Buy and deploy a unit.
    SpawnUnit { match_id: String, unit_type: UnitKind, lane: u8 },

    /// Restart the match.
    Reset { match_id: String },

    /// Change the highlighted lane.
    SelectLane { match_id: String, lane: u8 },

    /// Place a trap.
    PlaceTrap { match_id: String, x: f64, y: f64 },

    /// Place a turret.
    PlaceTurret { match_id: String, x: f64, y: f64 },

    /// Place a mine.
    PlaceMine { match_id: String, x: f64, y: f64 },

    /// Raise the castle's level.
    UpgradeCastle { match_id: String },

    /// Switch the castle weapon.
    ChangeCastleWeapon { match_id: String, weapon_type: WeaponKind },

    /// Raise a turret's level.
    UpgradeTurret { match_id: String, structure_id: EntityId },

    /// Raise a trap's level.
    UpgradeTrap { match_id: String, structure_id: EntityId },

    /// Raise a mine's level.
    UpgradeMine { match_id: String, structure_id: EntityId },

    /// Buy a powerup for a unit kind.
    PurchasePowerup { match_id: String, unit_type: UnitKind, powerup_name: String, cost: f64 },

    /// Pay for a shot at an instant win.
    Gamble { match_id: String },

    /// Vote for a rematch.
    RequestRematch { match_id: String },

    /// Give up the seat.
    Leave { match_id: String },
}

impl ClientMessage {
    /// Match the message is addressed to.
    pub fn match_id(&self) -> &str {
        match self {
            ClientMessage::Join { match_id, .. }
            | ClientMessage::SpawnUnit { match_id, .. }
            | ClientMessage::Reset { match_id }
            | ClientMessage::SelectLane { match_id, .. }
            | ClientMessage::PlaceTrap { match_id, .. }
            | ClientMessage::PlaceTurret { match_id, .. }
            | ClientMessage::PlaceMine { match_id, .. }
            | ClientMessage::UpgradeCastle { match_id }
            | ClientMessage::ChangeCastleWeapon { match_id, .. }
            | ClientMessage::UpgradeTurret { match_id, .. }
            | ClientMessage::UpgradeTrap { match_id, .. }
            | ClientMessage::UpgradeMine { match_id, .. }
            | ClientMessage::PurchasePowerup { match_id, .. }
            | ClientMessage::Gamble { match_id }
            | ClientMessage::RequestRematch { match_id }
            | ClientMessage::Leave { match_id } => match_id,
        }
    }

    /// Convert a gameplay message into an intent.
    ///
    /// Returns `None` for `join` and `leave`, which change membership instead.
    pub fn into_intent(self) -> Option<Intent> {
        let intent = match self {
            ClientMessage::Join { .. } | ClientMessage::Leave { .. } => return None,
            ClientMessage::SpawnUnit { unit_type, lane, .. } => {
                Intent::SpawnUnit { kind: unit_type, lane }
            }
            ClientMessage::Reset { .. } => Intent::Reset,
            ClientMessage::SelectLane { lane, .. } => Intent::SelectLane { lane },
            ClientMessage::PlaceTrap { x, y, .. } => place(StructureKind::Trap, x, y),
            ClientMessage::PlaceTurret { x, y, .. } => place(StructureKind::Turret, x, y),
            ClientMessage::PlaceMine { x, y, .. } => place(StructureKind::Mine, x, y),
            ClientMessage::UpgradeCastle { .. } => Intent::UpgradeCastle,
            ClientMessage::ChangeCastleWeapon { weapon_type, .. } => {
                Intent::ChangeWeapon { weapon: weapon_type }
            }
            ClientMessage::UpgradeTurret { structure_id, .. } => {
                upgrade(StructureKind::Turret, structure_id)
            }
            ClientMessage::UpgradeTrap { structure_id, .. } => {
                upgrade(StructureKind::Trap, structure_id)
            }
            ClientMessage::UpgradeMine { structure_id, .. } => {
                upgrade(StructureKind::Mine, structure_id)
            }
            ClientMessage::PurchasePowerup { unit_type, powerup_name, cost, .. } => {
                Intent::PurchasePowerup { kind: unit_type, name: powerup_name, cost }
            }
            ClientMessage::Gamble { .. } => Intent::Gamble,
            ClientMessage::RequestRematch { .. } => Intent::RequestRematch,
        };
        Some(intent)
    }
}

fn place(kind: StructureKind, x: f64, y: f64) -> Intent {
    Intent::Place { kind, position: Vec2::new(x, y) }
}

fn upgrade(kind: StructureKind, id: EntityId) -> Intent {
    Intent::Upgrade { kind, id }
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Join result.
    Joined {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        slot: Option<u8>,
        #[serde(skip_serializing_if = "Option::is_none")]
        snapshot: Option<Box<MatchSnapshot>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// Full state after a tick or a successful intent.
    StateUpdated { snapshot: Box<MatchSnapshot> },

    /// Acknowledgement of one intent, sent to its sender.
    ActionResult {
        action: String,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// The opponent left.
    PlayerLeft { slot: u8 },

    /// One player asked for a rematch.
    RematchRequested { requester_name: String, player_id: PlayerId },

    /// Both players agreed; the match restarted.
    RematchStarted,

    /// A gamble paid off and ended the match.
    GambleWon { winner_name: String, message: String },

    /// Request could not be routed or parsed.
    Error { code: ErrorCode, message: String },
}

impl ServerMessage {
    /// Successful join.
    pub fn joined(slot: u8, snapshot: MatchSnapshot) -> Self {
        ServerMessage::Joined {
            success: true,
            slot: Some(slot),
            snapshot: Some(Box::new(snapshot)),
            message: None,
        }
    }

    /// Refused join.
    pub fn join_refused(reason: &ActionError) -> Self {
        ServerMessage::Joined {
            success: false,
            slot: None,
            snapshot: None,
            message: Some(reason.to_string()),
        }
    }

    /// Snapshot broadcast.
    pub fn state(snapshot: MatchSnapshot) -> Self {
        ServerMessage::StateUpdated { snapshot: Box::new(snapshot) }
    }

    /// Intent acknowledgement.
    pub fn ack(action: &str, result: Result<(), &ActionError>) -> Self {
        ServerMessage::ActionResult {
            action: action.to_string(),
            success: result.is_ok(),
            message: result.err().map(ToString::to_string),
        }
    }

    /// Routing or parse failure.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerMessage::Error { code, message: message.into() }
    }
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Frame was not a valid client message.
    InvalidMessage,
    /// No such match.
    UnknownMatch,
    /// Sender is not seated in that match.
    UnknownPlayer,
    /// Connection limit reached.
    ServerOverloaded,
    /// Internal error.
    InternalError,
}

impl ErrorCode {
    /// Routing error code for an intent rejection, if it is one.
    pub fn for_routing(err: &ActionError) -> Option<Self> {
        match err {
            ActionError::UnknownMatch => Some(ErrorCode::UnknownMatch),
            ActionError::UnknownPlayer => Some(ErrorCode::UnknownPlayer),
            _ => None,
        }
    }
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_messages_parse_from_wire() {
        let msg = ClientMessage::from_json(
            r#"{"type":"spawnUnit","matchId":"arena-1","unitType":"wizard","lane":2}"#,
        )
        .unwrap();
        assert_eq!(msg.match_id(), "arena-1");
        assert_eq!(msg.into_intent(), Some(Intent::SpawnUnit { kind: UnitKind::Wizard, lane: 2 }));

        let msg = ClientMessage::from_json(
            r#"{"type":"changeCastleWeapon","matchId":"m","weaponType":"arcane_spire"}"#,
        )
        .unwrap();
        assert_eq!(
            msg.into_intent(),
            Some(Intent::ChangeWeapon { weapon: WeaponKind::ArcaneSpire })
        );

        let msg = ClientMessage::from_json(concat!(
            r#"{"type":"purchasePowerup","matchId":"m","unitType":"knight","#,
            r#""powerupName":"vitality","cost":200}"#,
        ))
        .unwrap();
        let expected = Intent::PurchasePowerup {
            kind: UnitKind::Knight,
            name: "vitality".into(),
            cost: 200.0,
        };
        assert_eq!(msg.into_intent(), Some(expected));
    }

    #[test]
    fn test_membership_messages_are_not_intents() {
        let join = r#"{"type":"join","matchId":"m","playerName":"Ada"}"#;
        let join = ClientMessage::from_json(join).unwrap();
        assert_eq!(join, ClientMessage::Join { match_id: "m".into(), player_name: "Ada".into() });
        assert_eq!(join.into_intent(), None);

        let leave = ClientMessage::Leave { match_id: "m".into() };
        assert_eq!(leave.into_intent(), None);
    }

    #[test]
    fn test_structure_messages() {
        let raw = r#"{"type":"placeMine","matchId":"m","x":250.5,"y":100}"#;
        let msg = ClientMessage::from_json(raw).unwrap();
        assert_eq!(
            msg.into_intent(),
            Some(Intent::Place { kind: StructureKind::Mine, position: Vec2::new(250.5, 100.0) })
        );

        let raw = r#"{"type":"upgradeTrap","matchId":"m","structureId":7}"#;
        let msg = ClientMessage::from_json(raw).unwrap();
        assert_eq!(msg.into_intent(), Some(Intent::Upgrade { kind: StructureKind::Trap, id: 7 }));
    }

    #[test]
    fn test_malformed_messages_rejected() {
        let dragon = r#"{"type":"spawnUnit","matchId":"m","unitType":"dragon","lane":0}"#;
        assert!(ClientMessage::from_json(dragon).is_err());
        assert!(ClientMessage::from_json(r#"{"type":"teleport","matchId":"m"}"#).is_err());
        assert!(ClientMessage::from_json("not json").is_err());
    }

    #[test]
    fn test_server_message_shapes() {
        let ack = ServerMessage::ack("placeTrap", Err(&ActionError::TooClose));
        let json: serde_json::Value = serde_json::from_str(&ack.to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "actionResult");
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Too close to another structure");

        let ok = ServerMessage::ack("gamble", Ok(()));
        assert!(!ok.to_json().unwrap().contains("message"));

        let left = ServerMessage::PlayerLeft { slot: 1 }.to_json().unwrap();
        assert_eq!(left, r#"{"type":"playerLeft","slot":1}"#);

        let asked = ServerMessage::RematchRequested {
            requester_name: "Ada".into(),
            player_id: PlayerId::from_u128(1),
        };
        let json = asked.to_json().unwrap();
        assert!(json.contains(r#""requesterName":"Ada""#));
        assert_eq!(ServerMessage::from_json(&json).unwrap(), asked);

        let started = ServerMessage::RematchStarted.to_json().unwrap();
        assert_eq!(started, r#"{"type":"rematchStarted"}"#);
    }

    #[test]
    fn test_error_codes() {
        let msg = ServerMessage::error(ErrorCode::UnknownMatch, "Unknown match");
        let json = msg.to_json().unwrap();
        assert!(json.contains("unknown_match"));
        assert_eq!(
            ErrorCode::for_routing(&ActionError::UnknownPlayer),
            Some(ErrorCode::UnknownPlayer)
        );
        assert_eq!(ErrorCode::for_routing(&ActionError::MaxLevel), None);
    }

    #[test]
    fn test_refused_join() {
        let msg = ServerMessage::join_refused(&ActionError::MatchFull);
        assert_eq!(
            msg.to_json().unwrap(),
            r#"{"type":"joined","success":false,"message":"Match is full"}"#
        );
    }
}
