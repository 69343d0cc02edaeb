//! Combat Resolution
//!
//! Unit targeting, movement and attacks, castle weapons, damage modifiers
//! and win detection.
//!
//! Units are never removed while a step runs: a kill only marks the victim
//! `dying` and queues its removal, so unit indices stay stable within a step.

use crate::core::vec2::Vec2;
use crate::game::economy::{kill_reward, CHAIN_REWARD_SCALE};
use crate::game::effects::Effect;
use crate::game::events::{EndReason, GameEvent};
use crate::game::state::{
    AnimationKind, EntityId, MatchState, PlayerId, Unit, UnitKind, ARENA_WIDTH, BASE_HALF_WIDTH,
};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Radius of the King's damage aura.
pub const KING_AURA_RADIUS: f64 = 80.0;

/// Damage multiplier for units inside an allied King's aura.
pub const KING_AURA_MULTIPLIER: f64 = 1.3;

/// Archer crit probability.
pub const ARCHER_CRIT_CHANCE: f64 = 0.15;

/// Archer crit multiplier.
pub const ARCHER_CRIT_MULTIPLIER: f64 = 2.0;

/// Multiplier on unit damage taken by Knights.
pub const KNIGHT_ARMOR: f64 = 0.8;

/// Per-hop damage falloff of wizard chain lightning.
pub const CHAIN_FALLOFF: f64 = 0.8;

/// Delay between successive chain hops.
pub const CHAIN_STAGGER_MS: u64 = 100;

/// How long a dead unit stays on the field.
pub const DEATH_HOLD_MS: u64 = 300;

/// Vertical reach of castle weapons.
pub const BASE_VERTICAL_REACH: f64 = 300.0;

/// Delay between ballista bolts.
pub const BALLISTA_STAGGER_MS: u64 = 150;

/// Trebuchet splash radius around the primary target.
pub const SPLASH_RADIUS: f64 = 60.0;

/// Fraction of trebuchet damage dealt by the splash.
pub const SPLASH_FRACTION: f64 = 0.5;

/// Arcane spire chain radius around the primary target.
pub const SPIRE_CHAIN_RADIUS: f64 = 120.0;

/// Extra targets of the arcane spire chain.
pub const SPIRE_CHAIN_TARGETS: usize = 3;

/// Fraction of spire damage dealt by each chain hop.
pub const SPIRE_CHAIN_FRACTION: f64 = 0.7;

// =============================================================================
// DAMAGE APPLICATION
// =============================================================================

/// Result of hitting a unit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DamageOutcome {
    /// Target was gone or already dying
    Missed,
    /// Target survived
    Hit,
    /// Target died; `reward` went to the credited player
    Killed {
        /// Resources credited
        reward: f64,
    },
}

/// One hit, delivered now or later.
#[derive(Clone, Copy, Debug)]
pub struct Strike {
    /// Damage after every modifier
    pub amount: f64,
    /// Who collects the kill reward
    pub credit_to: Option<PlayerId>,
    /// Multiplier on the kill reward
    pub reward_scale: f64,
    /// Where the animation starts
    pub origin: Vec2,
    /// Animation drawn when the hit lands
    pub animation: AnimationKind,
}

/// Damage a unit. Kills credit `credit_to` and queue the body's removal.
pub fn apply_unit_damage(
    state: &mut MatchState,
    target: EntityId,
    amount: f64,
    credit_to: Option<PlayerId>,
    reward_scale: f64,
) -> DamageOutcome {
    let now = state.clock_ms;
    let Some(unit) = state.units.iter_mut().find(|u| u.id == target && u.is_alive()) else {
        return DamageOutcome::Missed;
    };

    unit.health = (unit.health - amount.max(0.0)).max(0.0);
    if unit.health > 0.0 {
        return DamageOutcome::Hit;
    }

    unit.dying = true;
    let (unit_id, kind, owner) = (unit.id, unit.kind, unit.owner);

    let reward = kill_reward(Some(kind)) * reward_scale;
    if let Some(killer) = credit_to {
        state.ledger.credit(&killer, reward);
    }
    state.pending.schedule(now + DEATH_HOLD_MS, Effect::RemoveUnit { unit: unit_id });
    state.push_event(GameEvent::unit_killed(now, unit_id, kind, owner, credit_to, reward));

    DamageOutcome::Killed { reward }
}

/// Land a strike on a living unit now, or queue it `delay_ms` from now.
pub fn deliver(state: &mut MatchState, target: EntityId, strike: Strike, delay_ms: u64) {
    if delay_ms > 0 {
        state.pending.schedule(
            state.clock_ms + delay_ms,
            Effect::Damage {
                target,
                amount: strike.amount,
                credit_to: strike.credit_to,
                reward_scale: strike.reward_scale,
                origin: strike.origin,
                animation: strike.animation,
            },
        );
        return;
    }

    let Some(target_pos) = state
        .units
        .iter()
        .find(|u| u.id == target && u.is_alive())
        .map(|u| u.position)
    else {
        return;
    };
    state.push_animation(strike.animation, strike.origin, target_pos);
    apply_unit_damage(state, target, strike.amount, strike.credit_to, strike.reward_scale);
}

/// Apply one deferred effect that has come due.
pub fn apply_effect(state: &mut MatchState, effect: Effect) {
    match effect {
        Effect::Damage { target, amount, credit_to, reward_scale, origin, animation } => {
            let strike = Strike { amount, credit_to, reward_scale, origin, animation };
            deliver(state, target, strike, 0);
        }
        Effect::RemoveUnit { unit } => {
            state.units.retain(|u| u.id != unit);
        }
    }
}

/// Damage a castle. Returns true if this hit decided the match.
pub fn apply_base_damage(state: &mut MatchState, owner: PlayerId, amount: f64) -> bool {
    let Some(base) = state.bases.get_mut(&owner) else {
        state.report_invariant("damaged player has no base");
        return false;
    };

    base.health = (base.health - amount.max(0.0)).max(0.0);
    if base.health > 0.0 || state.game_over {
        return false;
    }

    let winner = state.opponent_of(&owner);
    state.end_match(winner, EndReason::BaseDestroyed);
    true
}

// =============================================================================
// MODIFIERS
// =============================================================================

/// Damage of `attacker` after aura, crit and (when the defender is a unit) armor.
///
/// Pushes an aura animation when an allied King boosts the attack.
pub fn modified_damage(state: &mut MatchState, attacker: usize, defender: Option<UnitKind>) -> f64 {
    let (attacker_id, owner, kind, position, mut damage) = {
        let u = &state.units[attacker];
        (u.id, u.owner, u.kind, u.position, u.damage)
    };

    let king = state
        .units
        .iter()
        .find(|u| {
            u.id != attacker_id
                && u.owner == owner
                && u.kind == UnitKind::King
                && u.is_alive()
                && u.position.within(position, KING_AURA_RADIUS)
        })
        .map(|u| u.position);
    if let Some(king_pos) = king {
        damage *= KING_AURA_MULTIPLIER;
        state.push_animation(AnimationKind::Aura, king_pos, position);
    }

    if kind == UnitKind::Archer && state.rng.chance(ARCHER_CRIT_CHANCE) {
        damage *= ARCHER_CRIT_MULTIPLIER;
    }

    if defender == Some(UnitKind::Knight) {
        damage *= KNIGHT_ARMOR;
    }

    damage
}

// =============================================================================
// TARGETING
// =============================================================================

/// Nearest living enemy in the same lane within `range`.
pub fn nearest_enemy_in_lane(
    units: &[Unit],
    owner: PlayerId,
    lane: u8,
    from: Vec2,
    range: f64,
) -> Option<usize> {
    nearest(units, from, |u| u.owner != owner && u.lane == lane && u.position.within(from, range))
}

/// Living enemies within `radius` of `center` (any lane), nearest first.
pub fn enemies_near(units: &[Unit], owner: PlayerId, center: Vec2, radius: f64) -> Vec<usize> {
    let mut found: Vec<usize> = units
        .iter()
        .enumerate()
        .filter(|(_, u)| u.is_alive() && u.owner != owner && u.position.within(center, radius))
        .map(|(i, _)| i)
        .collect();
    sort_by_distance(units, center, &mut found);
    found
}

fn nearest(units: &[Unit], from: Vec2, accept: impl Fn(&Unit) -> bool) -> Option<usize> {
    units
        .iter()
        .enumerate()
        .filter(|(_, u)| u.is_alive() && accept(u))
        .min_by(|(_, a), (_, b)| {
            a.position
                .distance_squared(from)
                .total_cmp(&b.position.distance_squared(from))
        })
        .map(|(i, _)| i)
}

fn sort_by_distance(units: &[Unit], from: Vec2, indices: &mut [usize]) {
    // Stable sort keeps collection order between equidistant units
    indices.sort_by(|&a, &b| {
        units[a]
            .position
            .distance_squared(from)
            .total_cmp(&units[b].position.distance_squared(from))
    });
}

// =============================================================================
// UNIT STEP
// =============================================================================

/// Move, target and attack with every living unit, in collection order.
pub fn process_units(state: &mut MatchState) {
    for i in 0..state.units.len() {
        if state.game_over {
            return;
        }
        if !state.units[i].is_alive() {
            continue;
        }
        step_unit(state, i);
    }
}

fn step_unit(state: &mut MatchState, i: usize) {
    let now = state.clock_ms;
    let (owner, lane, position, range, ready, speed) = {
        let u = &state.units[i];
        (u.owner, u.lane, u.position, u.attack_range, u.ready(now), u.speed)
    };

    if let Some(target) = nearest_enemy_in_lane(&state.units, owner, lane, position, range) {
        if ready {
            attack_unit(state, i, target);
        }
        return;
    }

    let Some(enemy) = state.opponent_of(&owner) else {
        return;
    };
    let Some(enemy_base) = state.bases.get(&enemy).map(|b| b.position) else {
        state.report_invariant("opponent has no base");
        return;
    };

    if position.horizontal_gap(enemy_base) <= range + BASE_HALF_WIDTH {
        if ready {
            let (damage, animation) = {
                let u = &mut state.units[i];
                u.last_attack_ms = Some(now);
                (u.damage, u.kind.attack_animation())
            };
            state.push_animation(animation, position, enemy_base);
            apply_base_damage(state, enemy, damage);
        }
        return;
    }

    let unit = &mut state.units[i];
    unit.position = position
        .step_toward_x(enemy_base.x, speed)
        .clamp_x(0.0, ARENA_WIDTH);
}

fn attack_unit(state: &mut MatchState, attacker: usize, target: usize) {
    let now = state.clock_ms;
    let defender_kind = state.units[target].kind;
    let target_id = state.units[target].id;

    let damage = modified_damage(state, attacker, Some(defender_kind));

    let (owner, kind, position, chain) = {
        let u = &mut state.units[attacker];
        u.last_attack_ms = Some(now);
        (u.owner, u.kind, u.position, u.chain_lightning())
    };

    let strike = Strike {
        amount: damage,
        credit_to: Some(owner),
        reward_scale: 1.0,
        origin: position,
        animation: kind.attack_animation(),
    };
    deliver(state, target_id, strike, 0);

    let Some(chain) = chain else {
        return;
    };
    let hops = chain.targets.saturating_sub(1) as usize;
    let base_damage = state.units[attacker].damage;
    let secondaries: Vec<EntityId> = enemies_near(&state.units, owner, position, chain.range)
        .into_iter()
        .map(|idx| state.units[idx].id)
        .filter(|id| *id != target_id)
        .take(hops)
        .collect();

    for (n, id) in secondaries.into_iter().enumerate() {
        let hop = n as u64 + 1;
        let strike = Strike {
            amount: base_damage * CHAIN_FALLOFF.powi(hop as i32),
            credit_to: Some(owner),
            reward_scale: CHAIN_REWARD_SCALE,
            origin: position,
            animation: AnimationKind::Lightning,
        };
        deliver(state, id, strike, CHAIN_STAGGER_MS * hop);
    }
}

// =============================================================================
// CASTLE STEP
// =============================================================================

/// Fire every castle whose cooldown has elapsed and that has a target.
pub fn process_bases(state: &mut MatchState) {
    let owners: Vec<PlayerId> = state.players.iter().map(|p| p.id).collect();
    for owner in owners {
        if let Some(base) = state.bases.get(&owner) {
            if base.ready(state.clock_ms) {
                fire_base(state, owner);
            }
        } else {
            state.report_invariant("seated player has no base");
        }
    }
}

fn fire_base(state: &mut MatchState, owner: PlayerId) {
    let Some(base) = state.bases.get(&owner).cloned() else {
        return;
    };

    let mut candidates: Vec<usize> = state
        .units
        .iter()
        .enumerate()
        .filter(|(_, u)| {
            u.is_alive()
                && u.owner != owner
                && u.position.horizontal_gap(base.position) <= base.range
                && u.position.vertical_gap(base.position) <= BASE_VERTICAL_REACH
        })
        .map(|(i, _)| i)
        .collect();
    if candidates.is_empty() {
        return;
    }
    sort_by_distance(&state.units, base.position, &mut candidates);

    if let Some(b) = state.bases.get_mut(&owner) {
        b.last_attack_ms = Some(state.clock_ms);
    }

    let strike = Strike {
        amount: base.damage,
        credit_to: Some(owner),
        reward_scale: 1.0,
        origin: base.position,
        animation: base.weapon.animation(),
    };

    if base.multi_hit > 1 {
        let targets: Vec<EntityId> = candidates
            .iter()
            .take(base.multi_hit as usize)
            .map(|&i| state.units[i].id)
            .collect();
        for (n, id) in targets.into_iter().enumerate() {
            deliver(state, id, strike, BALLISTA_STAGGER_MS * n as u64);
        }
        return;
    }

    let primary = candidates[0];
    let primary_id = state.units[primary].id;
    let primary_pos = state.units[primary].position;

    let splash: Vec<EntityId> = if base.aoe {
        enemies_near(&state.units, owner, primary_pos, SPLASH_RADIUS)
            .into_iter()
            .map(|i| state.units[i].id)
            .filter(|id| *id != primary_id)
            .collect()
    } else {
        Vec::new()
    };
    let chain: Vec<EntityId> = if base.lightning_chain {
        enemies_near(&state.units, owner, primary_pos, SPIRE_CHAIN_RADIUS)
            .into_iter()
            .map(|i| state.units[i].id)
            .filter(|id| *id != primary_id)
            .take(SPIRE_CHAIN_TARGETS)
            .collect()
    } else {
        Vec::new()
    };

    deliver(state, primary_id, strike, 0);

    for id in splash {
        let hit = Strike { amount: base.damage * SPLASH_FRACTION, origin: primary_pos, ..strike };
        deliver(state, id, hit, 0);
    }
    for (n, id) in chain.into_iter().enumerate() {
        let hit = Strike {
            amount: base.damage * SPIRE_CHAIN_FRACTION,
            origin: primary_pos,
            ..strike
        };
        deliver(state, id, hit, CHAIN_STAGGER_MS * (n as u64 + 1));
    }
}

// =============================================================================
// TESTS
// =============================================================================
