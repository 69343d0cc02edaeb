//! Client Snapshot
//!
//! The camelCase document broadcast to both players after every tick and
//! every successful intent. Logical match times are mapped onto wall-clock
//! milliseconds through the match epoch.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

use crate::game::state::{
    AnimationKind, AttackAnimation, Base, EntityId, MatchState, Mine, Player, PlayerId, Slot, Trap,
    Turret, Unit, UnitKind, WeaponKind,
};

/// Public view of a seated player.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub faction: String,
    pub color: String,
    pub side: Slot,
    pub slot: u8,
}

/// Public view of a unit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitView {
    pub id: EntityId,
    pub player_id: PlayerId,
    #[serde(rename = "type")]
    pub kind: UnitKind,
    pub x: f64,
    pub y: f64,
    pub health: f64,
    pub max_health: f64,
    pub speed: f64,
    pub damage: f64,
    pub attack_range: f64,
    pub attack_cooldown: u64,
    pub last_attack: Option<i64>,
    pub lane: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_lightning_range: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_lightning_targets: Option<u32>,
    pub dying: bool,
}

/// Public view of a castle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseView {
    pub x: f64,
    pub y: f64,
    pub health: f64,
    pub max_health: f64,
    pub level: u8,
    pub weapon_type: WeaponKind,
    pub damage: f64,
    pub range: f64,
    pub attack_cooldown: u64,
    pub last_attack: Option<i64>,
    pub multi_hit: u32,
    pub aoe: bool,
    pub lightning_chain: bool,
}

/// Public view of an attack animation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationView {
    pub id: EntityId,
    #[serde(rename = "type")]
    pub kind: AnimationKind,
    pub from_x: f64,
    pub from_y: f64,
    pub to_x: f64,
    pub to_y: f64,
    pub start_time: i64,
    pub duration: u64,
}

/// Public view of a trap.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrapView {
    pub id: EntityId,
    pub player_id: PlayerId,
    pub x: f64,
    pub y: f64,
    pub level: u8,
    pub damage: f64,
    pub trigger_radius: f64,
}

/// Public view of a turret.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurretView {
    pub id: EntityId,
    pub player_id: PlayerId,
    pub x: f64,
    pub y: f64,
    pub level: u8,
    pub health: f64,
    pub max_health: f64,
    pub damage: f64,
    pub range: f64,
    pub attack_cooldown: u64,
    pub last_attack: Option<i64>,
}

/// Public view of a mine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MineView {
    pub id: EntityId,
    pub player_id: PlayerId,
    pub x: f64,
    pub y: f64,
    pub level: u8,
    pub damage: f64,
    pub trigger_radius: f64,
    pub explosion_radius: f64,
}

/// Full match snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSnapshot {
    pub id: String,
    pub players: Vec<PlayerView>,
    pub units: Vec<UnitView>,
    pub game_over: bool,
    pub winner: Option<PlayerId>,
    pub resources: BTreeMap<PlayerId, f64>,
    pub bases: BTreeMap<PlayerId, BaseView>,
    pub selected_lanes: BTreeMap<PlayerId, u8>,
    pub animations: Vec<AnimationView>,
    pub traps: Vec<TrapView>,
    pub turrets: Vec<TurretView>,
    pub mines: Vec<MineView>,
    pub resource_rate: f64,
    pub powerups: BTreeMap<PlayerId, BTreeMap<UnitKind, Vec<String>>>,
}

impl MatchSnapshot {
    /// Capture the current state of a match.
    pub fn capture(state: &MatchState) -> Self {
        let wall = |ms: u64| state.epoch_ms.saturating_add(ms as i64);

        Self {
            id: state.id.clone(),
            players: state.players.iter().map(player_view).collect(),
            units: state.units.iter().map(|u| unit_view(u, &wall)).collect(),
            game_over: state.game_over,
            winner: state.winner,
            resources: state.ledger.balances().clone(),
            bases: state
                .bases
                .iter()
                .map(|(id, base)| (*id, base_view(base, &wall)))
                .collect(),
            selected_lanes: state.selected_lanes.clone(),
            animations: state.animations.iter().map(|a| animation_view(a, &wall)).collect(),
            traps: state.traps.iter().map(trap_view).collect(),
            turrets: state.turrets.iter().map(|t| turret_view(t, &wall)).collect(),
            mines: state.mines.iter().map(mine_view).collect(),
            resource_rate: state.ledger.rate(),
            powerups: state
                .powerups
                .all()
                .iter()
                .map(|(player, kinds)| {
                    let kinds = kinds
                        .iter()
                        .map(|(kind, names)| (*kind, names.iter().cloned().collect()))
                        .collect();
                    (*player, kinds)
                })
                .collect(),
        }
    }
}

fn player_view(p: &Player) -> PlayerView {
    PlayerView {
        id: p.id,
        name: p.name.clone(),
        faction: p.faction().to_string(),
        color: p.color().to_string(),
        side: p.slot,
        slot: p.slot.index(),
    }
}

fn unit_view(u: &Unit, wall: &impl Fn(u64) -> i64) -> UnitView {
    UnitView {
        id: u.id,
        player_id: u.owner,
        kind: u.kind,
        x: u.position.x,
        y: u.position.y,
        health: u.health,
        max_health: u.max_health,
        speed: u.speed,
        damage: u.damage,
        attack_range: u.attack_range,
        attack_cooldown: u.attack_cooldown_ms,
        last_attack: u.last_attack_ms.map(wall),
        lane: u.lane,
        chain_lightning_range: u.chain_lightning_range,
        chain_lightning_targets: u.chain_lightning_targets,
        dying: u.dying,
    }
}

fn base_view(b: &Base, wall: &impl Fn(u64) -> i64) -> BaseView {
    BaseView {
        x: b.position.x,
        y: b.position.y,
        health: b.health,
        max_health: b.max_health,
        level: b.level,
        weapon_type: b.weapon,
        damage: b.damage,
        range: b.range,
        attack_cooldown: b.cooldown_ms,
        last_attack: b.last_attack_ms.map(wall),
        multi_hit: b.multi_hit,
        aoe: b.aoe,
        lightning_chain: b.lightning_chain,
    }
}

fn animation_view(a: &AttackAnimation, wall: &impl Fn(u64) -> i64) -> AnimationView {
    AnimationView {
        id: a.id,
        kind: a.kind,
        from_x: a.from.x,
        from_y: a.from.y,
        to_x: a.to.x,
        to_y: a.to.y,
        start_time: wall(a.start_ms),
        duration: a.duration_ms,
    }
}

fn trap_view(t: &Trap) -> TrapView {
    TrapView {
        id: t.id,
        player_id: t.owner,
        x: t.position.x,
        y: t.position.y,
        level: t.level,
        damage: t.damage,
        trigger_radius: t.trigger_radius,
    }
}

fn turret_view(t: &Turret, wall: &impl Fn(u64) -> i64) -> TurretView {
    TurretView {
        id: t.id,
        player_id: t.owner,
        x: t.position.x,
        y: t.position.y,
        level: t.level,
        health: t.health,
        max_health: t.max_health,
        damage: t.damage,
        range: t.range,
        attack_cooldown: t.cooldown_ms,
        last_attack: t.last_attack_ms.map(wall),
    }
}

fn mine_view(m: &Mine) -> MineView {
    MineView {
        id: m.id,
        player_id: m.owner,
        x: m.position.x,
        y: m.position.y,
        level: m.level,
        damage: m.damage,
        trigger_radius: m.trigger_radius,
        explosion_radius: m.explosion_radius,
    }
}
