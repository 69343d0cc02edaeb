//! Structures
//!
//! Placement, upgrades and per-tick behavior of traps, turrets and mines.

use serde::{Serialize, Deserialize};

use crate::core::vec2::Vec2;
use crate::game::combat::{self, Strike};
use crate::game::error::{ActionError, ActionResult};
use crate::game::events::GameEvent;
use crate::game::state::{AnimationKind, EntityId, MatchState, Mine, PlayerId, Trap, Turret};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Placement fails within this distance of any structure (inclusive).
pub const MIN_STRUCTURE_SPACING: f64 = 40.0;

/// Trap price.
pub const TRAP_COST: f64 = 100.0;
/// Trap damage at level 1.
pub const TRAP_DAMAGE: f64 = 30.0;
/// Trap trigger radius at level 1.
pub const TRAP_TRIGGER_RADIUS: f64 = 25.0;

/// Turret price.
pub const TURRET_COST: f64 = 250.0;
/// Turret health at level 1.
pub const TURRET_HEALTH: f64 = 300.0;
/// Turret damage at level 1.
pub const TURRET_DAMAGE: f64 = 15.0;
/// Turret range at level 1.
pub const TURRET_RANGE: f64 = 150.0;
/// Turret cooldown at level 1.
pub const TURRET_COOLDOWN_MS: u64 = 1000;

/// Mine price.
pub const MINE_COST: f64 = 150.0;
/// Mine damage at level 1.
pub const MINE_DAMAGE: f64 = 60.0;
/// Mine trigger radius.
pub const MINE_TRIGGER_RADIUS: f64 = 25.0;
/// Mine blast radius at level 1.
pub const MINE_EXPLOSION_RADIUS: f64 = 80.0;

/// Kind of placeable structure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StructureKind {
    /// Single-target, single-use
    Trap,
    /// Persistent, shoots
    Turret,
    /// Area, single-use
    Mine,
}

impl StructureKind {
    /// Placement price.
    pub fn cost(self) -> f64 {
        match self {
            StructureKind::Trap => TRAP_COST,
            StructureKind::Turret => TURRET_COST,
            StructureKind::Mine => MINE_COST,
        }
    }

    /// Price to raise a structure from `level` to `level + 1`.
    pub fn upgrade_cost(self, level: u8) -> f64 {
        let per_level = match self {
            StructureKind::Trap => 100.0,
            StructureKind::Turret => 200.0,
            StructureKind::Mine => 125.0,
        };
        per_level * f64::from(level)
    }

    /// Level cap.
    pub fn max_level(self) -> u8 {
        match self {
            StructureKind::Trap | StructureKind::Mine => 3,
            StructureKind::Turret => 5,
        }
    }
}

// =============================================================================
// UPGRADE RULES
// =============================================================================

impl Trap {
    fn upgrade(&mut self) {
        self.level += 1;
        self.damage *= 1.5;
        self.trigger_radius *= 1.2;
    }
}

impl Turret {
    fn upgrade(&mut self) {
        self.level += 1;
        self.damage *= 1.8;
        self.range *= 1.3;
        self.max_health *= 1.5;
        self.health = self.max_health;
        self.cooldown_ms = (self.cooldown_ms as f64 * 0.85).floor() as u64;
    }
}

impl Mine {
    fn upgrade(&mut self) {
        self.level += 1;
        self.damage *= 1.5;
        self.explosion_radius *= 1.2;
    }
}

// =============================================================================
// PLACEMENT
// =============================================================================

/// Place a structure at level 1 on the player's half.
///
/// Checks, in order: player, match state, zone, spacing, price.
pub fn place_structure(
    state: &mut MatchState,
    player: PlayerId,
    kind: StructureKind,
    position: Vec2,
) -> ActionResult<EntityId> {
    let slot = state.player(&player).ok_or(ActionError::UnknownPlayer)?.slot;
    if state.game_over {
        return Err(ActionError::MatchOver);
    }
    if !slot.owns(position) {
        return Err(ActionError::OutOfZone);
    }
    if structure_positions(state).any(|p| p.within(position, MIN_STRUCTURE_SPACING)) {
        return Err(ActionError::TooClose);
    }
    state.ledger.try_debit(&player, kind.cost())?;

    let id = state.next_id();
    match kind {
        StructureKind::Trap => state.traps.push(Trap {
            id,
            owner: player,
            position,
            level: 1,
            damage: TRAP_DAMAGE,
            trigger_radius: TRAP_TRIGGER_RADIUS,
        }),
        StructureKind::Turret => state.turrets.push(Turret {
            id,
            owner: player,
            position,
            level: 1,
            health: TURRET_HEALTH,
            max_health: TURRET_HEALTH,
            damage: TURRET_DAMAGE,
            range: TURRET_RANGE,
            cooldown_ms: TURRET_COOLDOWN_MS,
            last_attack_ms: None,
        }),
        StructureKind::Mine => state.mines.push(Mine {
            id,
            owner: player,
            position,
            level: 1,
            damage: MINE_DAMAGE,
            trigger_radius: MINE_TRIGGER_RADIUS,
            explosion_radius: MINE_EXPLOSION_RADIUS,
        }),
    }
    Ok(id)
}

fn structure_positions(state: &MatchState) -> impl Iterator<Item = Vec2> + '_ {
    state
        .traps
        .iter()
        .map(|t| t.position)
        .chain(state.turrets.iter().map(|t| t.position))
        .chain(state.mines.iter().map(|m| m.position))
}

/// Raise one of the player's structures by a level. Returns the new level.
pub fn upgrade_structure(
    state: &mut MatchState,
    player: PlayerId,
    kind: StructureKind,
    id: EntityId,
) -> ActionResult<u8> {
    if state.player(&player).is_none() {
        return Err(ActionError::UnknownPlayer);
    }
    if state.game_over {
        return Err(ActionError::MatchOver);
    }

    let level = match kind {
        StructureKind::Trap => {
            state.traps.iter().find(|t| t.id == id && t.owner == player).map(|t| t.level)
        }
        StructureKind::Turret => {
            state.turrets.iter().find(|t| t.id == id && t.owner == player).map(|t| t.level)
        }
        StructureKind::Mine => {
            state.mines.iter().find(|m| m.id == id && m.owner == player).map(|m| m.level)
        }
    }
    .ok_or(ActionError::StructureNotFound)?;

    if level >= kind.max_level() {
        return Err(ActionError::MaxLevel);
    }
    state.ledger.try_debit(&player, kind.upgrade_cost(level))?;

    match kind {
        StructureKind::Trap => {
            state.traps.iter_mut().filter(|t| t.id == id).for_each(Trap::upgrade)
        }
        StructureKind::Turret => {
            state.turrets.iter_mut().filter(|t| t.id == id).for_each(Turret::upgrade)
        }
        StructureKind::Mine => {
            state.mines.iter_mut().filter(|m| m.id == id).for_each(Mine::upgrade)
        }
    }
    Ok(level + 1)
}

// =============================================================================
// TICK STEPS
// =============================================================================

/// Spring every trap an enemy stands on. Traps are consumed either way.
pub fn process_traps(state: &mut MatchState) {
    let traps = std::mem::take(&mut state.traps);
    let mut armed = Vec::with_capacity(traps.len());

    for trap in traps {
        let victim = state
            .units
            .iter()
            .find(|u| {
                u.is_alive()
                    && u.owner != trap.owner
                    && u.position.within(trap.position, trap.trigger_radius)
            })
            .map(|u| u.id);
        let Some(victim) = victim else {
            armed.push(trap);
            continue;
        };

        // Trap and mine kills pay no reward
        let strike = Strike {
            amount: trap.damage,
            credit_to: None,
            reward_scale: 1.0,
            origin: trap.position,
            animation: AnimationKind::Trap,
        };
        combat::deliver(state, victim, strike, 0);
        state.push_event(GameEvent::structure_triggered(state.clock_ms, trap.id, trap.owner, 1));
    }

    state.traps = armed;
}

/// Detonate every mine an enemy steps on, hitting all enemies in the blast.
pub fn process_mines(state: &mut MatchState) {
    let mines = std::mem::take(&mut state.mines);
    let mut armed = Vec::with_capacity(mines.len());

    for mine in mines {
        let triggered = state
            .units
            .iter()
            .any(|u| {
                u.is_alive()
                    && u.owner != mine.owner
                    && u.position.within(mine.position, mine.trigger_radius)
            });
        if !triggered {
            armed.push(mine);
            continue;
        }

        let blast =
            combat::enemies_near(&state.units, mine.owner, mine.position, mine.explosion_radius);
        let victims: Vec<EntityId> = blast.into_iter().map(|i| state.units[i].id).collect();
        state.push_animation(AnimationKind::Explosion, mine.position, mine.position);
        for &victim in &victims {
            combat::apply_unit_damage(state, victim, mine.damage, None, 1.0);
        }
        state.push_event(GameEvent::structure_triggered(
            state.clock_ms,
            mine.id,
            mine.owner,
            victims.len() as u32,
        ));
    }

    state.mines = armed;
}

/// Turrets fire, then enemy units in reach batter them.
pub fn process_turrets(state: &mut MatchState) {
    turrets_fire(state);
    units_attack_turrets(state);

    let now = state.clock_ms;
    let (standing, destroyed): (Vec<Turret>, Vec<Turret>) =
        std::mem::take(&mut state.turrets).into_iter().partition(|t| t.health > 0.0);
    state.turrets = standing;
    for turret in destroyed {
        state.push_event(GameEvent::turret_destroyed(now, turret.id, turret.owner));
    }
}

fn turrets_fire(state: &mut MatchState) {
    let now = state.clock_ms;
    for t in 0..state.turrets.len() {
        let turret = &state.turrets[t];
        if !turret.ready(now) {
            continue;
        }
        let (owner, position, range, damage) =
            (turret.owner, turret.position, turret.range, turret.damage);

        let in_range = combat::enemies_near(&state.units, owner, position, range);
        let Some(&target) = in_range.first() else {
            continue;
        };
        let target_id = state.units[target].id;
        state.turrets[t].last_attack_ms = Some(now);

        let strike = Strike {
            amount: damage,
            credit_to: Some(owner),
            reward_scale: 1.0,
            origin: position,
            animation: AnimationKind::TurretShot,
        };
        combat::deliver(state, target_id, strike, 0);
    }
}

fn units_attack_turrets(state: &mut MatchState) {
    let now = state.clock_ms;
    for i in 0..state.units.len() {
        let (owner, position, range) = {
            let u = &state.units[i];
            if !u.is_alive() || !u.ready(now) {
                continue;
            }
            (u.owner, u.position, u.attack_range)
        };

        let target = state
            .turrets
            .iter()
            .enumerate()
            .filter(|(_, t)| {
                t.owner != owner && t.health > 0.0 && t.position.within(position, range)
            })
            .min_by(|(_, a), (_, b)| {
                a.position
                    .distance_squared(position)
                    .total_cmp(&b.position.distance_squared(position))
            })
            .map(|(idx, _)| idx);
        let Some(target) = target else {
            continue;
        };

        let damage = combat::modified_damage(state, i, None);
        let (kind, turret_pos) = {
            let u = &mut state.units[i];
            u.last_attack_ms = Some(now);
            (u.kind, state.turrets[target].position)
        };
        state.push_animation(kind.attack_animation(), position, turret_pos);

        let turret = &mut state.turrets[target];
        turret.health = (turret.health - damage).max(0.0);
    }
}

// =============================================================================
// TESTS
// =============================================================================
