//! Game State Definitions
//!
//! Everything one match owns: players, bases, units, structures,
//! animations, the ledger and the deferred-effect queue.
//! Uses BTreeMap/BTreeSet for deterministic iteration order.

use std::collections::{BTreeMap, BTreeSet};
use serde::{Serialize, Deserialize};
use tracing::error;

use crate::core::rng::DeterministicRng;
use crate::core::vec2::Vec2;
use crate::game::economy::{Ledger, PowerupRegistry};
use crate::game::effects::PendingEffects;
use crate::game::error::{ActionError, ActionResult};
use crate::game::events::{EndReason, GameEvent};

// =============================================================================
// ARENA GEOMETRY
// =============================================================================

/// Arena width in arena units.
pub const ARENA_WIDTH: f64 = 1200.0;

/// Arena height in arena units.
pub const ARENA_HEIGHT: f64 = 600.0;

/// Vertical centre of each lane.
pub const LANE_Y: [f64; 3] = [150.0, 300.0, 450.0];

/// Number of lanes.
pub const LANE_COUNT: u8 = 3;

/// Lane selected for a freshly joined player.
pub const DEFAULT_LANE: u8 = 1;

/// Horizontal half-extent of a castle; units stop this far short of its centre.
pub const BASE_HALF_WIDTH: f64 = 40.0;

/// How far in front of its castle a unit appears.
pub const SPAWN_OFFSET: f64 = 50.0;

/// How long every attack animation stays visible.
pub const ANIMATION_DURATION_MS: u64 = 500;

/// Monotonic per-match identifier for units, structures and animations.
pub type EntityId = u64;

// =============================================================================
// PLAYER ID
// =============================================================================

/// Unique player identifier (UUID assigned by the gateway per connection).
///
/// Implements Ord for deterministic BTreeMap ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub uuid::Uuid);

impl PlayerId {
    /// Generate a fresh random id.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Build a stable id from a small number (tests, demos).
    pub fn from_u128(value: u128) -> Self {
        Self(uuid::Uuid::from_u128(value))
    }

    /// Parse from UUID string.
    pub fn from_uuid_str(s: &str) -> Option<Self> {
        uuid::Uuid::parse_str(s).ok().map(Self)
    }

    /// Short prefix for log lines.
    pub fn short(&self) -> String {
        let mut text = self.0.simple().to_string();
        text.truncate(8);
        text
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// SLOTS / FACTIONS
// =============================================================================

/// One of the two fixed player slots. Slot 0 holds the left half.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    /// Slot 0: left half, castle at the left edge
    Left,
    /// Slot 1: right half, castle at the right edge
    Right,
}

impl Slot {
    /// Both slots in assignment order.
    pub const ALL: [Slot; 2] = [Slot::Left, Slot::Right];

    /// Wire index (0 or 1).
    pub fn index(self) -> u8 {
        match self {
            Slot::Left => 0,
            Slot::Right => 1,
        }
    }

    /// Faction label shown to clients.
    pub fn faction(self) -> &'static str {
        match self {
            Slot::Left => "Crimson Legion",
            Slot::Right => "Azure Order",
        }
    }

    /// Faction color.
    pub fn color(self) -> &'static str {
        match self {
            Slot::Left => "#d64541",
            Slot::Right => "#3a7bd5",
        }
    }

    /// Fixed castle position for this slot.
    pub fn base_position(self) -> Vec2 {
        match self {
            Slot::Left => Vec2::new(60.0, ARENA_HEIGHT / 2.0),
            Slot::Right => Vec2::new(ARENA_WIDTH - 60.0, ARENA_HEIGHT / 2.0),
        }
    }

    /// +1 when this slot's units march right, -1 when they march left.
    pub fn forward(self) -> f64 {
        match self {
            Slot::Left => 1.0,
            Slot::Right => -1.0,
        }
    }

    /// Check if a point lies on this slot's half of the arena.
    pub fn owns(self, pos: Vec2) -> bool {
        if !pos.is_finite() || pos.y < 0.0 || pos.y > ARENA_HEIGHT {
            return false;
        }
        let mid = ARENA_WIDTH / 2.0;
        match self {
            Slot::Left => pos.x >= 0.0 && pos.x < mid,
            Slot::Right => pos.x >= mid && pos.x <= ARENA_WIDTH,
        }
    }
}

/// A seated player. Immutable once assigned.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Player {
    /// Unique player ID
    pub id: PlayerId,
    /// Display name
    pub name: String,
    /// Assigned slot (faction, color and side derive from it)
    pub slot: Slot,
}

impl Player {
    /// Faction label.
    pub fn faction(&self) -> &'static str {
        self.slot.faction()
    }

    /// Faction color.
    pub fn color(&self) -> &'static str {
        self.slot.color()
    }
}

// =============================================================================
// UNITS
// =============================================================================

/// Unit type. Closed set; every kind carries a fixed stat bundle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    /// Cheap melee fodder
    Peasant,
    /// Armored melee (takes 20% less damage from units)
    Knight,
    /// Ranged, 15% chance to crit for double damage
    Archer,
    /// Ranged caster with chain lightning
    Wizard,
    /// Heavy melee; buffs nearby allies by 30%
    King,
}

/// Wizard-only secondary strike.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChainLightning {
    /// Reach of the chain, measured from the wizard.
    pub range: f64,
    /// Total targets including the primary.
    pub targets: u32,
}

/// Base stats of a unit kind.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UnitStats {
    /// Spawn cost
    pub cost: f64,
    /// Maximum health
    pub max_health: f64,
    /// Arena units advanced per tick
    pub speed: f64,
    /// Damage per attack
    pub damage: f64,
    /// Attack reach
    pub attack_range: f64,
    /// Minimum time between attacks
    pub attack_cooldown_ms: u64,
    /// Resources paid to whoever kills this unit
    pub reward: f64,
    /// Chain lightning (wizards only)
    pub chain: Option<ChainLightning>,
}

impl UnitKind {
    /// Every unit kind.
    pub const ALL: [UnitKind; 5] = [
        UnitKind::Peasant,
        UnitKind::Knight,
        UnitKind::Archer,
        UnitKind::Wizard,
        UnitKind::King,
    ];

    /// Fixed stat bundle for this kind.
    pub fn stats(self) -> UnitStats {
        match self {
            UnitKind::Peasant => UnitStats {
                cost: 50.0,
                max_health: 60.0,
                speed: 6.0,
                damage: 8.0,
                attack_range: 30.0,
                attack_cooldown_ms: 1000,
                reward: 10.0,
                chain: None,
            },
            UnitKind::Knight => UnitStats {
                cost: 150.0,
                max_health: 200.0,
                speed: 4.5,
                damage: 15.0,
                attack_range: 35.0,
                attack_cooldown_ms: 1200,
                reward: 40.0,
                chain: None,
            },
            UnitKind::Archer => UnitStats {
                cost: 350.0,
                max_health: 80.0,
                speed: 5.0,
                damage: 20.0,
                attack_range: 150.0,
                attack_cooldown_ms: 1500,
                reward: 60.0,
                chain: None,
            },
            UnitKind::Wizard => UnitStats {
                cost: 400.0,
                max_health: 90.0,
                speed: 4.0,
                damage: 25.0,
                attack_range: 120.0,
                attack_cooldown_ms: 2000,
                reward: 80.0,
                chain: Some(ChainLightning { range: 130.0, targets: 4 }),
            },
            UnitKind::King => UnitStats {
                cost: 500.0,
                max_health: 400.0,
                speed: 3.0,
                damage: 30.0,
                attack_range: 40.0,
                attack_cooldown_ms: 1500,
                reward: 150.0,
                chain: None,
            },
        }
    }

    /// Spawn cost.
    #[inline]
    pub fn cost(self) -> f64 {
        self.stats().cost
    }

    /// Animation drawn when this kind attacks.
    pub fn attack_animation(self) -> AnimationKind {
        match self {
            UnitKind::Peasant | UnitKind::Knight => AnimationKind::Melee,
            UnitKind::Archer => AnimationKind::Arrow,
            UnitKind::Wizard => AnimationKind::Lightning,
            UnitKind::King => AnimationKind::Smash,
        }
    }
}

/// A unit on the field.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Unit {
    /// Unique id within the match
    pub id: EntityId,
    /// Owning player
    pub owner: PlayerId,
    /// Unit type
    pub kind: UnitKind,
    /// Current position
    pub position: Vec2,
    /// Current health (0..=max_health)
    pub health: f64,
    /// Maximum health
    pub max_health: f64,
    /// Arena units per tick
    pub speed: f64,
    /// Damage per attack
    pub damage: f64,
    /// Attack reach
    pub attack_range: f64,
    /// Minimum time between attacks
    pub attack_cooldown_ms: u64,
    /// Match clock of the last attack (None = never attacked)
    pub last_attack_ms: Option<u64>,
    /// Lane index (0..=2)
    pub lane: u8,
    /// Chain lightning reach (wizards)
    pub chain_lightning_range: Option<f64>,
    /// Chain lightning target count including the primary (wizards)
    pub chain_lightning_targets: Option<u32>,
    /// Killed and waiting out the death animation before removal
    pub dying: bool,
}

impl Unit {
    /// Create a unit with its kind's base stats.
    pub fn new(id: EntityId, owner: PlayerId, kind: UnitKind, lane: u8, position: Vec2) -> Self {
        let stats = kind.stats();
        Self {
            id,
            owner,
            kind,
            position,
            health: stats.max_health,
            max_health: stats.max_health,
            speed: stats.speed,
            damage: stats.damage,
            attack_range: stats.attack_range,
            attack_cooldown_ms: stats.attack_cooldown_ms,
            last_attack_ms: None,
            lane,
            chain_lightning_range: stats.chain.map(|c| c.range),
            chain_lightning_targets: stats.chain.map(|c| c.targets),
            dying: false,
        }
    }

    /// Alive and not waiting for removal.
    #[inline]
    pub fn is_alive(&self) -> bool {
        !self.dying && self.health > 0.0
    }

    /// Check if the unit's own cooldown has elapsed.
    #[inline]
    pub fn ready(&self, now_ms: u64) -> bool {
        self.last_attack_ms
            .map_or(true, |last| now_ms.saturating_sub(last) >= self.attack_cooldown_ms)
    }

    /// Chain lightning stats, if this unit has them.
    pub fn chain_lightning(&self) -> Option<ChainLightning> {
        match (self.chain_lightning_range, self.chain_lightning_targets) {
            (Some(range), Some(targets)) => Some(ChainLightning { range, targets }),
            _ => None,
        }
    }
}

// =============================================================================
// BASES
// =============================================================================

/// Castle weapon. Closed set; each carries a fixed profile.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum WeaponKind {
    /// Default single-target weapon
    #[default]
    Bow,
    /// Hits up to three targets with staggered bolts
    Ballista,
    /// Splash damage around the primary target
    Trebuchet,
    /// Lightning chaining off the primary target
    ArcaneSpire,
}

/// Fixed properties of a castle weapon.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WeaponProfile {
    /// Minimum castle level to equip
    pub level_required: u8,
    /// One-time switch fee
    pub switch_fee: f64,
    /// Multiplier on level damage
    pub damage_multiplier: f64,
    /// Multiplier on level range
    pub range_multiplier: f64,
    /// Time between volleys
    pub cooldown_ms: u64,
    /// Targets per volley
    pub multi_hit: u32,
    /// Splashes around the primary target
    pub aoe: bool,
    /// Chains off the primary target
    pub lightning_chain: bool,
}

impl WeaponKind {
    /// Every weapon.
    pub const ALL: [WeaponKind; 4] = [
        WeaponKind::Bow,
        WeaponKind::Ballista,
        WeaponKind::Trebuchet,
        WeaponKind::ArcaneSpire,
    ];

    /// Fixed profile for this weapon.
    pub fn profile(self) -> WeaponProfile {
        match self {
            WeaponKind::Bow => WeaponProfile {
                level_required: 1,
                switch_fee: 0.0,
                damage_multiplier: 1.0,
                range_multiplier: 1.0,
                cooldown_ms: 1500,
                multi_hit: 1,
                aoe: false,
                lightning_chain: false,
            },
            WeaponKind::Ballista => WeaponProfile {
                level_required: 2,
                switch_fee: 300.0,
                damage_multiplier: 0.9,
                range_multiplier: 1.1,
                cooldown_ms: 2000,
                multi_hit: 3,
                aoe: false,
                lightning_chain: false,
            },
            WeaponKind::Trebuchet => WeaponProfile {
                level_required: 3,
                switch_fee: 600.0,
                damage_multiplier: 1.5,
                range_multiplier: 1.2,
                cooldown_ms: 3000,
                multi_hit: 1,
                aoe: true,
                lightning_chain: false,
            },
            WeaponKind::ArcaneSpire => WeaponProfile {
                level_required: 4,
                switch_fee: 1000.0,
                damage_multiplier: 1.2,
                range_multiplier: 1.0,
                cooldown_ms: 2500,
                multi_hit: 1,
                aoe: false,
                lightning_chain: true,
            },
        }
    }

    /// Animation drawn for this weapon's shots.
    pub fn animation(self) -> AnimationKind {
        match self {
            WeaponKind::Bow => AnimationKind::CastleShot,
            WeaponKind::Ballista => AnimationKind::Bolt,
            WeaponKind::Trebuchet => AnimationKind::Boulder,
            WeaponKind::ArcaneSpire => AnimationKind::ArcaneChain,
        }
    }
}

/// Highest castle level.
pub const MAX_BASE_LEVEL: u8 = 5;

/// Castle health at level 1.
pub const BASE_HEALTH: f64 = 1000.0;

/// Extra max health per castle level.
pub const BASE_HEALTH_PER_LEVEL: f64 = 500.0;

/// A player's castle.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Base {
    /// Owning player
    pub owner: PlayerId,
    /// Fixed position
    pub position: Vec2,
    /// Current health (0..=max_health)
    pub health: f64,
    /// Maximum health
    pub max_health: f64,
    /// Upgrade level (1..=5)
    pub level: u8,
    /// Equipped weapon
    pub weapon: WeaponKind,
    /// Damage per hit (level × weapon)
    pub damage: f64,
    /// Horizontal reach (level × weapon)
    pub range: f64,
    /// Time between volleys
    pub cooldown_ms: u64,
    /// Match clock of the last volley
    pub last_attack_ms: Option<u64>,
    /// Targets per volley
    pub multi_hit: u32,
    /// Splash flag
    pub aoe: bool,
    /// Lightning chain flag
    pub lightning_chain: bool,
}

impl Base {
    /// Create a level-1 castle with the default weapon.
    pub fn new(owner: PlayerId, position: Vec2) -> Self {
        let mut base = Self {
            owner,
            position,
            health: BASE_HEALTH,
            max_health: BASE_HEALTH,
            level: 1,
            weapon: WeaponKind::default(),
            damage: 0.0,
            range: 0.0,
            cooldown_ms: 0,
            last_attack_ms: None,
            multi_hit: 1,
            aoe: false,
            lightning_chain: false,
        };
        base.recompute_stats();
        base
    }

    /// Derive combat stats from level and weapon.
    pub fn recompute_stats(&mut self) {
        let profile = self.weapon.profile();
        let steps = f64::from(self.level.saturating_sub(1));
        self.damage = (20.0 + steps * 10.0) * profile.damage_multiplier;
        self.range = (200.0 + steps * 25.0) * profile.range_multiplier;
        self.cooldown_ms = profile.cooldown_ms;
        self.multi_hit = profile.multi_hit;
        self.aoe = profile.aoe;
        self.lightning_chain = profile.lightning_chain;
    }

    /// Check if the castle can fire again.
    #[inline]
    pub fn ready(&self, now_ms: u64) -> bool {
        self.last_attack_ms
            .map_or(true, |last| now_ms.saturating_sub(last) >= self.cooldown_ms)
    }
}

// =============================================================================
// STRUCTURES
// =============================================================================

/// Single-use trap that hits the first enemy to step on it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Trap {
    /// Unique id within the match
    pub id: EntityId,
    /// Owning player
    pub owner: PlayerId,
    /// Position on the owner's half
    pub position: Vec2,
    /// Upgrade level
    pub level: u8,
    /// Damage dealt on trigger
    pub damage: f64,
    /// Trigger radius
    pub trigger_radius: f64,
}

/// Persistent turret.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Turret {
    /// Unique id within the match
    pub id: EntityId,
    /// Owning player
    pub owner: PlayerId,
    /// Position on the owner's half
    pub position: Vec2,
    /// Upgrade level
    pub level: u8,
    /// Current health
    pub health: f64,
    /// Maximum health
    pub max_health: f64,
    /// Damage per shot
    pub damage: f64,
    /// Targeting reach
    pub range: f64,
    /// Time between shots
    pub cooldown_ms: u64,
    /// Match clock of the last shot
    pub last_attack_ms: Option<u64>,
}

impl Turret {
    /// Check if the turret can fire again.
    #[inline]
    pub fn ready(&self, now_ms: u64) -> bool {
        self.last_attack_ms
            .map_or(true, |last| now_ms.saturating_sub(last) >= self.cooldown_ms)
    }
}

/// Single-use mine that splashes every enemy in its blast radius.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Mine {
    /// Unique id within the match
    pub id: EntityId,
    /// Owning player
    pub owner: PlayerId,
    /// Position on the owner's half
    pub position: Vec2,
    /// Upgrade level
    pub level: u8,
    /// Damage per enemy caught in the blast
    pub damage: f64,
    /// Trigger radius
    pub trigger_radius: f64,
    /// Blast radius
    pub explosion_radius: f64,
}

// =============================================================================
// ANIMATIONS
// =============================================================================

/// Visual kind of an attack animation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationKind {
    /// Peasant / knight swing
    Melee,
    /// Archer arrow
    Arrow,
    /// Wizard bolt and chain hops
    Lightning,
    /// King strike
    Smash,
    /// King aura pulse
    Aura,
    /// Bow shot from a castle
    CastleShot,
    /// Ballista bolt
    Bolt,
    /// Trebuchet boulder
    Boulder,
    /// Arcane spire chain
    ArcaneChain,
    /// Trap snap
    Trap,
    /// Mine blast
    Explosion,
    /// Turret shot
    TurretShot,
}

/// Transient visual record. Not authoritative.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttackAnimation {
    /// Unique id within the match
    pub id: EntityId,
    /// Origin point
    pub from: Vec2,
    /// Target point
    pub to: Vec2,
    /// Visual kind
    pub kind: AnimationKind,
    /// Match clock at creation
    pub start_ms: u64,
    /// Visible duration
    pub duration_ms: u64,
}

impl AttackAnimation {
    /// Check if the animation has run its course.
    #[inline]
    pub fn expired(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.start_ms) > self.duration_ms
    }
}

// =============================================================================
// MATCH STATE
// =============================================================================

/// Complete state of a match.
#[derive(Clone, Debug)]
pub struct MatchState {
    /// Caller-supplied match identifier
    pub id: String,

    /// Logical match clock in milliseconds (advanced only by ticks)
    pub clock_ms: u64,

    /// Wall-clock epoch (unix ms) that logical time 0 maps to on the wire
    pub epoch_ms: i64,

    /// Seated players in join order (0..=2)
    pub players: Vec<Player>,

    /// Units on the field
    pub units: Vec<Unit>,

    /// Armed traps
    pub traps: Vec<Trap>,

    /// Standing turrets
    pub turrets: Vec<Turret>,

    /// Armed mines
    pub mines: Vec<Mine>,

    /// Visible attack animations
    pub animations: Vec<AttackAnimation>,

    /// Deferred damage and removals
    pub pending: PendingEffects,

    /// Castles keyed by owner
    pub bases: BTreeMap<PlayerId, Base>,

    /// Balances and generation rate
    pub ledger: Ledger,

    /// Has a winner been decided?
    pub game_over: bool,

    /// Winner once decided
    pub winner: Option<PlayerId>,

    /// Lane each player currently has selected
    pub selected_lanes: BTreeMap<PlayerId, u8>,

    /// Purchased powerups
    pub powerups: PowerupRegistry,

    /// Players that asked for a rematch
    pub rematch_requests: BTreeSet<PlayerId>,

    /// Match RNG (crits, gamble)
    pub rng: DeterministicRng,

    /// Next entity id (monotonic counter)
    next_entity_id: EntityId,

    /// Events generated since the last drain
    pending_events: Vec<GameEvent>,
}

impl MatchState {
    /// Create an empty match.
    pub fn new(id: impl Into<String>, rng_seed: u64) -> Self {
        Self {
            id: id.into(),
            clock_ms: 0,
            epoch_ms: 0,
            players: Vec::new(),
            units: Vec::new(),
            traps: Vec::new(),
            turrets: Vec::new(),
            mines: Vec::new(),
            animations: Vec::new(),
            pending: PendingEffects::new(),
            bases: BTreeMap::new(),
            ledger: Ledger::new(0),
            game_over: false,
            winner: None,
            selected_lanes: BTreeMap::new(),
            powerups: PowerupRegistry::default(),
            rematch_requests: BTreeSet::new(),
            rng: DeterministicRng::new(rng_seed),
            next_entity_id: 1,
            pending_events: Vec::new(),
        }
    }

    /// Allocate the next entity id.
    pub fn next_id(&mut self) -> EntityId {
        let id = self.next_entity_id;
        self.next_entity_id += 1;
        id
    }

    /// First free slot, if any.
    pub fn open_slot(&self) -> Option<Slot> {
        Slot::ALL
            .into_iter()
            .find(|slot| self.players.iter().all(|p| p.slot != *slot))
    }

    /// Seat a player in the next open slot with a fresh castle and balance.
    pub fn add_player(&mut self, id: PlayerId, name: impl Into<String>) -> ActionResult<Slot> {
        if self.player(&id).is_some() {
            return Err(ActionError::MatchFull);
        }
        let slot = self.open_slot().ok_or(ActionError::MatchFull)?;

        self.players.push(Player { id, name: name.into(), slot });
        self.bases.insert(id, Base::new(id, slot.base_position()));
        self.ledger.open_account(id);
        self.selected_lanes.insert(id, DEFAULT_LANE);
        Ok(slot)
    }

    /// Remove a player with everything they own. Returns the vacated slot.
    pub fn remove_player(&mut self, id: &PlayerId) -> Option<Slot> {
        let index = self.players.iter().position(|p| p.id == *id)?;
        let player = self.players.remove(index);

        self.bases.remove(id);
        self.ledger.close_account(id);
        self.selected_lanes.remove(id);
        self.powerups.remove_player(id);
        self.rematch_requests.remove(id);
        self.units.retain(|u| u.owner != *id);
        self.traps.retain(|t| t.owner != *id);
        self.turrets.retain(|t| t.owner != *id);
        self.mines.retain(|m| m.owner != *id);
        // Queued chain hops and bolts leave with their owner
        self.pending.cancel_credited_to(id);

        Some(player.slot)
    }

    /// Get a player by ID.
    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == *id)
    }

    /// The other seated player.
    pub fn opponent_of(&self, id: &PlayerId) -> Option<PlayerId> {
        self.players.iter().find(|p| p.id != *id).map(|p| p.id)
    }

    /// Display name for a player (empty when unknown).
    pub fn player_name(&self, id: &PlayerId) -> &str {
        self.player(id).map(|p| p.name.as_str()).unwrap_or("")
    }

    /// Check if the tick loop should be running.
    pub fn is_live(&self) -> bool {
        self.players.len() == 2 && !self.game_over
    }

    /// Record a visible attack.
    pub fn push_animation(&mut self, kind: AnimationKind, from: Vec2, to: Vec2) {
        let id = self.next_id();
        self.animations.push(AttackAnimation {
            id,
            from,
            to,
            kind,
            start_ms: self.clock_ms,
            duration_ms: ANIMATION_DURATION_MS,
        });
    }

    /// Drop animations whose time is up.
    pub fn expire_animations(&mut self) {
        let now = self.clock_ms;
        self.animations.retain(|a| !a.expired(now));
    }

    /// Decide the match. Later calls are ignored.
    pub fn end_match(&mut self, winner: Option<PlayerId>, reason: EndReason) {
        if self.game_over {
            return;
        }
        self.game_over = true;
        self.winner = winner;
        // Deferred hits from a decided match never land
        self.pending.clear();
        self.push_event(GameEvent::match_ended(self.clock_ms, winner, reason));
    }

    /// Return every player to the starting position (reset / rematch).
    pub fn reset(&mut self) {
        let now = self.clock_ms;

        self.units.clear();
        self.traps.clear();
        self.turrets.clear();
        self.mines.clear();
        self.animations.clear();
        self.pending.clear();
        self.powerups.clear();
        self.rematch_requests.clear();
        self.game_over = false;
        self.winner = None;

        self.ledger.reset(now);
        let seats: Vec<(PlayerId, Slot)> = self.players.iter().map(|p| (p.id, p.slot)).collect();
        self.bases.clear();
        for (id, slot) in seats {
            self.bases.insert(id, Base::new(id, slot.base_position()));
            self.ledger.open_account(id);
        }

        self.push_event(GameEvent::match_reset(now));
    }

    /// Report a broken cross-field invariant without crashing.
    pub fn report_invariant(&self, what: &str) {
        error!(match_id = %self.id, clock_ms = self.clock_ms, "invariant violated: {}", what);
    }

    /// Take pending events (consumes them).
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Push a game event.
    pub fn push_event(&mut self, event: GameEvent) {
        self.pending_events.push(event);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::economy::STARTING_RESOURCES;
    use crate::game::effects::Effect;

    fn two_player_match() -> (MatchState, PlayerId, PlayerId) {
        let mut state = MatchState::new("m-1", 7);
        let a = PlayerId::from_u128(1);
        let b = PlayerId::from_u128(2);
        state.add_player(a, "Ada").unwrap();
        state.add_player(b, "Bo").unwrap();
        (state, a, b)
    }

    #[test]
    fn test_player_id_ordering() {
        let id1 = PlayerId::from_u128(1);
        let id2 = PlayerId::from_u128(2);
        assert!(id1 < id2);
        assert_eq!(PlayerId::from_uuid_str(&id1.to_string()), Some(id1));
    }

    #[test]
    fn test_slots_assigned_in_order() {
        let (state, a, b) = two_player_match();
        assert_eq!(state.player(&a).unwrap().slot, Slot::Left);
        assert_eq!(state.player(&b).unwrap().slot, Slot::Right);
        assert_eq!(state.player(&a).unwrap().faction(), "Crimson Legion");
        assert_eq!(state.ledger.balance(&a), STARTING_RESOURCES);
        assert_eq!(state.bases[&b].position, Slot::Right.base_position());
        assert!(state.is_live());
    }

    #[test]
    fn test_third_player_rejected() {
        let (mut state, _, _) = two_player_match();
        let c = PlayerId::from_u128(3);
        assert_eq!(state.add_player(c, "Cy"), Err(ActionError::MatchFull));
        assert_eq!(state.players.len(), 2);
    }

    #[test]
    fn test_vacated_slot_is_reused() {
        let (mut state, a, _) = two_player_match();
        assert_eq!(state.remove_player(&a), Some(Slot::Left));
        assert!(!state.bases.contains_key(&a));
        assert!(!state.is_live());

        let c = PlayerId::from_u128(3);
        assert_eq!(state.add_player(c, "Cy"), Ok(Slot::Left));
    }

    #[test]
    fn test_leaver_queued_hits_are_dropped() {
        let (mut state, a, b) = two_player_match();
        let victim = state.next_id();
        state.units.push(Unit::new(victim, b, UnitKind::King, 1, Vec2::new(900.0, 300.0)));
        let bolt = |credit_to: PlayerId| Effect::Damage {
            target: victim,
            amount: 50.0,
            credit_to: Some(credit_to),
            reward_scale: 1.0,
            origin: Vec2::ZERO,
            animation: AnimationKind::Bolt,
        };
        state.pending.schedule(150, bolt(a));
        state.pending.schedule(150, bolt(b));

        state.remove_player(&a);
        state.add_player(PlayerId::from_u128(3), "Cy").unwrap();

        assert_eq!(state.pending.drain_due(150), vec![bolt(b)]);
    }

    #[test]
    fn test_zone_ownership() {
        assert!(Slot::Left.owns(Vec2::new(100.0, 300.0)));
        assert!(!Slot::Left.owns(Vec2::new(600.0, 300.0)));
        assert!(Slot::Right.owns(Vec2::new(600.0, 300.0)));
        assert!(!Slot::Right.owns(Vec2::new(900.0, 700.0)));
        assert!(!Slot::Left.owns(Vec2::new(f64::NAN, 10.0)));
    }

    #[test]
    fn test_base_stats_follow_level_and_weapon() {
        let mut base = Base::new(PlayerId::from_u128(1), Vec2::ZERO);
        assert_eq!(base.damage, 20.0);
        assert_eq!(base.range, 200.0);
        assert_eq!(base.cooldown_ms, 1500);

        base.level = 3;
        base.weapon = WeaponKind::Trebuchet;
        base.recompute_stats();
        assert_eq!(base.damage, 60.0);
        assert_eq!(base.range, 300.0);
        assert!(base.aoe);
        assert_eq!(base.multi_hit, 1);
    }

    #[test]
    fn test_unit_cooldown_gate() {
        let mut unit = Unit::new(1, PlayerId::from_u128(1), UnitKind::Knight, 0, Vec2::ZERO);
        assert!(unit.ready(0));
        unit.last_attack_ms = Some(1000);
        assert!(!unit.ready(2100));
        assert!(unit.ready(2200));
    }

    #[test]
    fn test_only_wizards_chain() {
        for kind in UnitKind::ALL {
            let unit = Unit::new(1, PlayerId::from_u128(1), kind, 0, Vec2::ZERO);
            assert_eq!(unit.chain_lightning().is_some(), kind == UnitKind::Wizard);
        }
    }

    #[test]
    fn test_end_match_is_sticky() {
        let (mut state, a, b) = two_player_match();
        state.end_match(Some(a), EndReason::BaseDestroyed);
        state.end_match(Some(b), EndReason::BaseDestroyed);
        assert!(state.game_over);
        assert_eq!(state.winner, Some(a));
        assert!(!state.is_live());
    }

    #[test]
    fn test_animation_expiry() {
        let (mut state, _, _) = two_player_match();
        state.push_animation(AnimationKind::Arrow, Vec2::ZERO, Vec2::new(1.0, 1.0));
        state.clock_ms = ANIMATION_DURATION_MS;
        state.expire_animations();
        assert_eq!(state.animations.len(), 1);
        state.clock_ms = ANIMATION_DURATION_MS + 1;
        state.expire_animations();
        assert!(state.animations.is_empty());
    }

    #[test]
    fn test_entity_ids_are_unique() {
        let mut state = MatchState::new("ids", 0);
        let ids: BTreeSet<EntityId> = (0..100).map(|_| state.next_id()).collect();
        assert_eq!(ids.len(), 100);
    }
}
