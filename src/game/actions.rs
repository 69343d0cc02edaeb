//! Player Actions
//!
//! Validation and application of every player intent. Each action either
//! succeeds completely or returns an [`ActionError`] with the state untouched.

use crate::core::vec2::Vec2;
use crate::game::economy::{
    castle_upgrade_cost, powerup_effect, PowerupEffect, GAMBLE_COST, GAMBLE_ODDS,
};
use crate::game::error::{ActionError, ActionResult};
use crate::game::events::{EndReason, GameEvent};
use crate::game::state::{
    EntityId, MatchState, PlayerId, Slot, Unit, UnitKind, WeaponKind, BASE_HEALTH,
    BASE_HEALTH_PER_LEVEL, LANE_COUNT, LANE_Y, MAX_BASE_LEVEL, SPAWN_OFFSET,
};
use crate::game::structures::{self, StructureKind};

// =============================================================================
// INTENTS
// =============================================================================

/// A decoded player request against one match.
#[derive(Clone, Debug, PartialEq)]
pub enum Intent {
    /// Buy and deploy a unit
    SpawnUnit { kind: UnitKind, lane: u8 },
    /// Change the highlighted lane
    SelectLane { lane: u8 },
    /// Buy and place a structure
    Place { kind: StructureKind, position: Vec2 },
    /// Raise a structure's level
    Upgrade { kind: StructureKind, id: EntityId },
    /// Raise the castle's level
    UpgradeCastle,
    /// Switch the castle weapon
    ChangeWeapon { weapon: WeaponKind },
    /// Buy a named powerup for a unit kind
    PurchasePowerup { kind: UnitKind, name: String, cost: f64 },
    /// Pay to roll for an instant win
    Gamble,
    /// Ask for a rematch
    RequestRematch,
    /// Restart the match immediately
    Reset,
}

/// What a successful intent produced.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Outcome {
    /// A unit with this id entered the field
    Spawned(EntityId),
    /// Lane now selected
    LaneSelected(u8),
    /// A structure with this id was placed
    Placed(EntityId),
    /// New level of the upgraded structure or castle
    Upgraded(u8),
    /// Newly equipped weapon
    WeaponChanged(WeaponKind),
    /// Powerup recorded
    PowerupPurchased,
    /// Gamble resolved
    Gamble {
        /// Did it pay off?
        won: bool,
    },
    /// Rematch request recorded
    Rematch(RematchStatus),
    /// Match restarted
    Reset,
}

/// Progress of a rematch vote.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RematchStatus {
    /// Waiting on the other player
    Waiting,
    /// Both asked; the match was reset
    Started,
}

impl Intent {
    /// Wire name echoed in acknowledgements.
    pub fn name(&self) -> &'static str {
        match self {
            Intent::SpawnUnit { .. } => "spawnUnit",
            Intent::SelectLane { .. } => "selectLane",
            Intent::Place { kind: StructureKind::Trap, .. } => "placeTrap",
            Intent::Place { kind: StructureKind::Turret, .. } => "placeTurret",
            Intent::Place { kind: StructureKind::Mine, .. } => "placeMine",
            Intent::Upgrade { kind: StructureKind::Trap, .. } => "upgradeTrap",
            Intent::Upgrade { kind: StructureKind::Turret, .. } => "upgradeTurret",
            Intent::Upgrade { kind: StructureKind::Mine, .. } => "upgradeMine",
            Intent::UpgradeCastle => "upgradeCastle",
            Intent::ChangeWeapon { .. } => "changeCastleWeapon",
            Intent::PurchasePowerup { .. } => "purchasePowerup",
            Intent::Gamble => "gamble",
            Intent::RequestRematch => "requestRematch",
            Intent::Reset => "reset",
        }
    }

    /// Apply this intent on behalf of `player`.
    pub fn apply(self, state: &mut MatchState, player: PlayerId) -> ActionResult<Outcome> {
        match self {
            Intent::SpawnUnit { kind, lane } => {
                spawn_unit(state, player, kind, lane).map(Outcome::Spawned)
            }
            Intent::SelectLane { lane } => {
                select_lane(state, player, lane).map(|_| Outcome::LaneSelected(lane))
            }
            Intent::Place { kind, position } => {
                structures::place_structure(state, player, kind, position).map(Outcome::Placed)
            }
            Intent::Upgrade { kind, id } => {
                structures::upgrade_structure(state, player, kind, id).map(Outcome::Upgraded)
            }
            Intent::UpgradeCastle => upgrade_castle(state, player).map(Outcome::Upgraded),
            Intent::ChangeWeapon { weapon } => {
                change_castle_weapon(state, player, weapon).map(|_| Outcome::WeaponChanged(weapon))
            }
            Intent::PurchasePowerup { kind, name, cost } => {
                purchase_powerup(state, player, kind, &name, cost)
                    .map(|_| Outcome::PowerupPurchased)
            }
            Intent::Gamble => gamble(state, player).map(|won| Outcome::Gamble { won }),
            Intent::RequestRematch => request_rematch(state, player).map(Outcome::Rematch),
            Intent::Reset => {
                seat_of(state, &player)?;
                state.reset();
                Ok(Outcome::Reset)
            }
        }
    }
}

fn seat_of(state: &MatchState, player: &PlayerId) -> ActionResult<Slot> {
    state.player(player).map(|p| p.slot).ok_or(ActionError::UnknownPlayer)
}

fn ensure_running(state: &MatchState) -> ActionResult<()> {
    if state.game_over {
        Err(ActionError::MatchOver)
    } else {
        Ok(())
    }
}

fn ensure_lane(lane: u8) -> ActionResult<()> {
    if lane < LANE_COUNT {
        Ok(())
    } else {
        Err(ActionError::InvalidLane(lane))
    }
}

// =============================================================================
// UNITS
// =============================================================================

/// Buy a unit and deploy it in front of the player's castle.
///
/// Purchased powerups for the kind are folded into its stats at spawn.
pub fn spawn_unit(
    state: &mut MatchState,
    player: PlayerId,
    kind: UnitKind,
    lane: u8,
) -> ActionResult<EntityId> {
    let slot = seat_of(state, &player)?;
    ensure_running(state)?;
    ensure_lane(lane)?;
    state.ledger.try_debit(&player, kind.cost())?;

    let home = slot.base_position();
    let position = Vec2::new(home.x + slot.forward() * SPAWN_OFFSET, LANE_Y[lane as usize]);
    let id = state.next_id();
    let mut unit = Unit::new(id, player, kind, lane, position);

    let effects: Vec<PowerupEffect> =
        state.powerups.for_unit(&player, kind).filter_map(powerup_effect).collect();
    for effect in effects {
        match effect {
            PowerupEffect::Health(m) => {
                unit.max_health *= m;
                unit.health = unit.max_health;
            }
            PowerupEffect::Damage(m) => unit.damage *= m,
            PowerupEffect::Speed(m) => unit.speed *= m,
            PowerupEffect::Range(m) => unit.attack_range *= m,
        }
    }

    state.units.push(unit);
    state.push_event(GameEvent::unit_spawned(state.clock_ms, player, id, kind, lane));
    Ok(id)
}

/// Record the player's highlighted lane.
pub fn select_lane(state: &mut MatchState, player: PlayerId, lane: u8) -> ActionResult<()> {
    seat_of(state, &player)?;
    ensure_lane(lane)?;
    state.selected_lanes.insert(player, lane);
    Ok(())
}

// =============================================================================
// CASTLE
// =============================================================================

/// Raise the castle one level: +500 max health, full heal, stats recomputed.
pub fn upgrade_castle(state: &mut MatchState, player: PlayerId) -> ActionResult<u8> {
    seat_of(state, &player)?;
    ensure_running(state)?;
    let level = state.bases.get(&player).ok_or(ActionError::UnknownPlayer)?.level;
    if level >= MAX_BASE_LEVEL {
        return Err(ActionError::MaxLevel);
    }
    state.ledger.try_debit(&player, castle_upgrade_cost(level))?;

    let new_level = level + 1;
    if let Some(base) = state.bases.get_mut(&player) {
        base.level = new_level;
        base.max_health = BASE_HEALTH + f64::from(new_level - 1) * BASE_HEALTH_PER_LEVEL;
        base.health = base.max_health;
        base.recompute_stats();
    }
    state.push_event(GameEvent::castle_upgraded(state.clock_ms, player, new_level));
    Ok(new_level)
}

/// Swap the castle weapon, paying its one-time fee.
pub fn change_castle_weapon(
    state: &mut MatchState,
    player: PlayerId,
    weapon: WeaponKind,
) -> ActionResult<()> {
    seat_of(state, &player)?;
    ensure_running(state)?;
    let base = state.bases.get(&player).ok_or(ActionError::UnknownPlayer)?;
    if base.weapon == weapon {
        return Err(ActionError::WeaponAlreadyEquipped);
    }
    let profile = weapon.profile();
    if base.level < profile.level_required {
        return Err(ActionError::LevelTooLow { required: profile.level_required });
    }
    state.ledger.try_debit(&player, profile.switch_fee)?;

    if let Some(base) = state.bases.get_mut(&player) {
        base.weapon = weapon;
        base.recompute_stats();
    }
    state.push_event(GameEvent::weapon_changed(state.clock_ms, player, weapon));
    Ok(())
}

// =============================================================================
// SHOP
// =============================================================================

/// Buy a named powerup for one unit kind at the client-quoted price.
pub fn purchase_powerup(
    state: &mut MatchState,
    player: PlayerId,
    kind: UnitKind,
    name: &str,
    cost: f64,
) -> ActionResult<()> {
    seat_of(state, &player)?;
    ensure_running(state)?;
    if state.powerups.has(&player, kind, name) {
        return Err(ActionError::AlreadyPurchased);
    }
    state.ledger.try_debit(&player, cost)?;
    state.powerups.insert(player, kind, name);
    Ok(())
}

/// Pay for a one-in-ten-thousand shot at winning outright.
pub fn gamble(state: &mut MatchState, player: PlayerId) -> ActionResult<bool> {
    seat_of(state, &player)?;
    ensure_running(state)?;
    state.ledger.try_debit(&player, GAMBLE_COST)?;

    if !state.rng.one_in(GAMBLE_ODDS) {
        return Ok(false);
    }
    state.push_event(GameEvent::gamble_won(state.clock_ms, player));
    state.end_match(Some(player), EndReason::Gamble);
    Ok(true)
}

// =============================================================================
// REMATCH
// =============================================================================

/// Register a rematch vote; the second distinct vote resets the match.
pub fn request_rematch(state: &mut MatchState, player: PlayerId) -> ActionResult<RematchStatus> {
    seat_of(state, &player)?;
    if !state.rematch_requests.insert(player) {
        return Err(ActionError::RematchAlreadyRequested);
    }

    let everyone_agreed = state.players.len() == 2
        && state.players.iter().all(|p| state.rematch_requests.contains(&p.id));
    if everyone_agreed {
        state.reset();
        Ok(RematchStatus::Started)
    } else {
        Ok(RematchStatus::Waiting)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rng::DeterministicRng;
    use crate::game::economy::STARTING_RESOURCES;
    use crate::game::events::GameEventData;

    fn arena() -> (MatchState, PlayerId, PlayerId) {
        let mut state = MatchState::new("actions", 5);
        let a = PlayerId::from_u128(1);
        let b = PlayerId::from_u128(2);
        state.add_player(a, "Ada").unwrap();
        state.add_player(b, "Bo").unwrap();
        (state, a, b)
    }

    #[test]
    fn test_king_spends_everything() {
        let (mut state, a, _) = arena();
        let id = spawn_unit(&mut state, a, UnitKind::King, 1).unwrap();
        assert_eq!(state.ledger.balance(&a), 0.0);

        let unit = state.units.iter().find(|u| u.id == id).unwrap();
        assert_eq!(unit.position, Vec2::new(110.0, 300.0));
        assert_eq!(unit.health, 400.0);
    }

    #[test]
    fn test_archer_then_knight_then_broke() {
        let (mut state, a, _) = arena();
        spawn_unit(&mut state, a, UnitKind::Archer, 0).unwrap();
        spawn_unit(&mut state, a, UnitKind::Knight, 2).unwrap();
        assert_eq!(state.ledger.balance(&a), 0.0);

        let err = spawn_unit(&mut state, a, UnitKind::Peasant, 0).unwrap_err();
        assert_eq!(err, ActionError::InsufficientResources { needed: 50.0, available: 0.0 });
        assert_eq!(state.units.len(), 2);
    }

    #[test]
    fn test_spawn_validation() {
        let (mut state, a, b) = arena();
        assert_eq!(
            spawn_unit(&mut state, a, UnitKind::Peasant, 3),
            Err(ActionError::InvalidLane(3))
        );
        assert_eq!(
            spawn_unit(&mut state, PlayerId::from_u128(7), UnitKind::Peasant, 0),
            Err(ActionError::UnknownPlayer)
        );

        // Right-side units appear left of their castle
        let id = spawn_unit(&mut state, b, UnitKind::Peasant, 2).unwrap();
        let unit = state.units.iter().find(|u| u.id == id).unwrap();
        assert_eq!(unit.position, Vec2::new(1090.0, 450.0));

        state.game_over = true;
        assert_eq!(spawn_unit(&mut state, a, UnitKind::Peasant, 0), Err(ActionError::MatchOver));
        assert_eq!(state.ledger.balance(&a), STARTING_RESOURCES);
    }

    #[test]
    fn test_powerups_apply_at_spawn() {
        let (mut state, a, _) = arena();
        purchase_powerup(&mut state, a, UnitKind::Peasant, "vitality", 100.0).unwrap();
        purchase_powerup(&mut state, a, UnitKind::Peasant, "lucky_charm", 100.0).unwrap();
        assert_eq!(
            purchase_powerup(&mut state, a, UnitKind::Peasant, "vitality", 0.0),
            Err(ActionError::AlreadyPurchased)
        );

        let id = spawn_unit(&mut state, a, UnitKind::Peasant, 0).unwrap();
        let unit = state.units.iter().find(|u| u.id == id).unwrap();
        assert_eq!(unit.max_health, 75.0);
        assert_eq!(unit.health, 75.0);
        assert_eq!(unit.damage, 8.0);

        let knight = spawn_unit(&mut state, a, UnitKind::Knight, 0).unwrap();
        let knight = state.units.iter().find(|u| u.id == knight).unwrap();
        assert_eq!(knight.max_health, 200.0);
    }

    #[test]
    fn test_duplicate_powerup_rejected_even_when_broke() {
        let (mut state, a, _) = arena();
        purchase_powerup(&mut state, a, UnitKind::Archer, "haste", 500.0).unwrap();
        assert_eq!(state.ledger.balance(&a), 0.0);
        assert_eq!(
            purchase_powerup(&mut state, a, UnitKind::Archer, "haste", 500.0),
            Err(ActionError::AlreadyPurchased)
        );
        assert_eq!(
            purchase_powerup(&mut state, a, UnitKind::Archer, "sharpness", -1.0),
            Err(ActionError::InvalidCost)
        );
    }

    #[test]
    fn test_castle_upgrade_path() {
        let (mut state, a, _) = arena();
        state.ledger.credit(&a, 10_000.0);
        state.bases.get_mut(&a).unwrap().health = 10.0;

        for expected in 2..=5 {
            assert_eq!(upgrade_castle(&mut state, a), Ok(expected));
            let base = &state.bases[&a];
            assert_eq!(base.max_health, 1000.0 + f64::from(expected - 1) * 500.0);
            assert_eq!(base.health, base.max_health);
        }
        assert_eq!(upgrade_castle(&mut state, a), Err(ActionError::MaxLevel));
        // 400 + 800 + 1200 + 1600
        assert_eq!(state.ledger.balance(&a), STARTING_RESOURCES + 10_000.0 - 4000.0);
        assert_eq!(state.bases[&a].damage, 60.0);
    }

    #[test]
    fn test_weapon_change_rules() {
        let (mut state, a, _) = arena();
        assert_eq!(
            change_castle_weapon(&mut state, a, WeaponKind::Bow),
            Err(ActionError::WeaponAlreadyEquipped)
        );
        assert_eq!(
            change_castle_weapon(&mut state, a, WeaponKind::Ballista),
            Err(ActionError::LevelTooLow { required: 2 })
        );

        upgrade_castle(&mut state, a).unwrap();
        assert_eq!(
            change_castle_weapon(&mut state, a, WeaponKind::Ballista),
            Err(ActionError::InsufficientResources { needed: 300.0, available: 100.0 })
        );

        state.ledger.credit(&a, 200.0);
        change_castle_weapon(&mut state, a, WeaponKind::Ballista).unwrap();
        let base = &state.bases[&a];
        assert_eq!(base.weapon, WeaponKind::Ballista);
        assert_eq!(base.multi_hit, 3);
        assert_eq!(base.cooldown_ms, 2000);
        assert_eq!(state.ledger.balance(&a), 0.0);
    }

    #[test]
    fn test_gamble_costs_and_rarely_wins() {
        let (mut state, a, _) = arena();
        assert!(matches!(
            gamble(&mut state, a),
            Err(ActionError::InsufficientResources { .. })
        ));

        state.ledger.credit(&a, 1000.0);
        let won = gamble(&mut state, a).unwrap();
        assert_eq!(state.ledger.balance(&a), STARTING_RESOURCES);
        assert_eq!(won, state.game_over);
        if won {
            assert_eq!(state.winner, Some(a));
        }
    }

    #[test]
    fn test_gamble_win_decides_match() {
        let seed = (0..).find(|&seed| DeterministicRng::new(seed).one_in(GAMBLE_ODDS)).unwrap();
        let mut state = MatchState::new("jackpot", seed);
        let a = PlayerId::from_u128(1);
        let b = PlayerId::from_u128(2);
        state.add_player(a, "Ada").unwrap();
        state.add_player(b, "Bo").unwrap();
        state.ledger.credit(&a, 1000.0);

        assert_eq!(Intent::Gamble.apply(&mut state, a), Ok(Outcome::Gamble { won: true }));
        assert!(state.game_over);
        assert_eq!(state.winner, Some(a));

        let events: Vec<GameEventData> = state.take_events().into_iter().map(|e| e.data).collect();
        assert_eq!(
            events,
            vec![
                GameEventData::GambleWon { player_id: a },
                GameEventData::MatchEnded { winner_id: Some(a), reason: EndReason::Gamble },
            ]
        );
        assert_eq!(gamble(&mut state, b), Err(ActionError::MatchOver));
    }

    #[test]
    fn test_rematch_needs_both_players() {
        let (mut state, a, b) = arena();
        spawn_unit(&mut state, a, UnitKind::Peasant, 0).unwrap();
        state.game_over = true;

        assert_eq!(request_rematch(&mut state, a), Ok(RematchStatus::Waiting));
        assert_eq!(request_rematch(&mut state, a), Err(ActionError::RematchAlreadyRequested));
        assert!(state.game_over);

        assert_eq!(request_rematch(&mut state, b), Ok(RematchStatus::Started));
        assert!(!state.game_over);
        assert!(state.units.is_empty());
        assert!(state.rematch_requests.is_empty());
        assert_eq!(state.ledger.balance(&a), STARTING_RESOURCES);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let (mut state, a, b) = arena();
        spawn_unit(&mut state, a, UnitKind::Knight, 0).unwrap();
        structures::place_structure(&mut state, b, StructureKind::Mine, Vec2::new(800.0, 150.0))
            .unwrap();
        upgrade_castle(&mut state, b).unwrap_err();

        let summary = |s: &MatchState| {
            (s.units.len(), s.mines.len(), s.ledger.balance(&a), s.bases[&b].level)
        };
        Intent::Reset.apply(&mut state, a).unwrap();
        let first = summary(&state);
        Intent::Reset.apply(&mut state, b).unwrap();
        let second = summary(&state);

        assert_eq!(first, (0, 0, STARTING_RESOURCES, 1));
        assert_eq!(first, second);
    }

    #[test]
    fn test_intent_names() {
        let place = Intent::Place { kind: StructureKind::Mine, position: Vec2::ZERO };
        assert_eq!(place.name(), "placeMine");
        assert_eq!(Intent::Upgrade { kind: StructureKind::Turret, id: 1 }.name(), "upgradeTurret");
        assert_eq!(Intent::ChangeWeapon { weapon: WeaponKind::Bow }.name(), "changeCastleWeapon");
    }
}
