//! End-to-end match scenarios driven through the public game API.

use std::time::Duration;

use lane_siege::core::vec2::Vec2;
use lane_siege::game::actions::Intent;
use lane_siege::game::combat::{apply_base_damage, apply_unit_damage, DamageOutcome};
use lane_siege::game::economy::STARTING_RESOURCES;
use lane_siege::game::error::ActionError;
use lane_siege::game::state::{Unit, LANE_Y};
use lane_siege::game::structures::{
    place_structure, process_traps, upgrade_structure, StructureKind,
};
use lane_siege::game::tick::{run_ticks, tick};
use lane_siege::game::{MatchState, Outcome, PlayerId, UnitKind, TICK_INTERVAL_MS};
use lane_siege::network::protocol::ServerMessage;
use lane_siege::network::session::MatchRegistry;
use tokio::sync::mpsc;

fn two_player_match() -> (MatchState, PlayerId, PlayerId) {
    let mut state = MatchState::new("scenario", 99);
    let a = PlayerId::from_u128(10);
    let b = PlayerId::from_u128(20);
    state.add_player(a, "Ada").unwrap();
    state.add_player(b, "Bo").unwrap();
    (state, a, b)
}

fn spawn(
    state: &mut MatchState,
    player: PlayerId,
    kind: UnitKind,
) -> Result<Outcome, ActionError> {
    Intent::SpawnUnit { kind, lane: 1 }.apply(state, player)
}

#[test]
fn test_spawn_economics() {
    let (mut state, a, b) = two_player_match();

    assert!(spawn(&mut state, a, UnitKind::King).is_ok());
    assert_eq!(state.ledger.balance(&a), 0.0);

    assert!(spawn(&mut state, b, UnitKind::Archer).is_ok());
    assert!(spawn(&mut state, b, UnitKind::Knight).is_ok());
    assert_eq!(state.ledger.balance(&b), 0.0);

    let err = spawn(&mut state, b, UnitKind::Peasant).unwrap_err();
    assert_eq!(err, ActionError::InsufficientResources { needed: 50.0, available: 0.0 });
    assert_eq!(state.units.len(), 3);

    // Income arrives with the first distribution
    run_ticks(&mut state, 7, TICK_INTERVAL_MS);
    assert!(spawn(&mut state, b, UnitKind::Peasant).is_err());
    state.ledger.credit(&b, 40.0);
    assert!(spawn(&mut state, b, UnitKind::Peasant).is_ok());
}

#[test]
fn test_trap_hit_then_kill_credits_killer() {
    let (mut state, a, b) = two_player_match();
    let spot = Vec2::new(500.0, LANE_Y[1]);
    let trap = place_structure(&mut state, a, StructureKind::Trap, spot).unwrap();
    assert_eq!(state.ledger.balance(&a), STARTING_RESOURCES - 100.0);

    let id = state.next_id();
    state.units.push(Unit::new(id, b, UnitKind::Peasant, 1, Vec2::new(505.0, LANE_Y[1])));

    process_traps(&mut state);
    assert_eq!(state.units[0].health, 30.0);
    assert!(state.traps.iter().all(|t| t.id != trap));

    let before_a = state.ledger.balance(&a);
    let before_b = state.ledger.balance(&b);
    let outcome = apply_unit_damage(&mut state, id, 30.0, Some(a), 1.0);
    assert_eq!(outcome, DamageOutcome::Killed { reward: 10.0 });
    assert_eq!(state.ledger.balance(&a), before_a + 10.0);
    assert_eq!(state.ledger.balance(&b), before_b);
    assert!(state.units[0].dying);
}

#[test]
fn test_placement_rules() {
    let (mut state, a, b) = two_player_match();
    state.ledger.credit(&a, 10_000.0);

    place_structure(&mut state, a, StructureKind::Mine, Vec2::new(300.0, 150.0)).unwrap();

    let turret = |state: &mut MatchState, player, x, y| {
        place_structure(state, player, StructureKind::Turret, Vec2::new(x, y))
    };

    assert_eq!(turret(&mut state, a, 330.0, 170.0), Err(ActionError::TooClose));
    assert_eq!(turret(&mut state, a, 340.0, 150.0), Err(ActionError::TooClose));
    assert_eq!(turret(&mut state, a, 900.0, 300.0), Err(ActionError::OutOfZone));

    // The right player cannot build on the left half
    assert_eq!(turret(&mut state, b, 300.0, 150.0), Err(ActionError::OutOfZone));

    assert!(turret(&mut state, a, 341.0, 150.0).is_ok());
    assert_eq!(state.turrets.len(), 1);
}

#[test]
fn test_structure_upgrades_only_go_up() {
    let (mut state, a, _) = two_player_match();
    state.ledger.credit(&a, 100_000.0);

    let spot = Vec2::new(200.0, 300.0);
    let turret = place_structure(&mut state, a, StructureKind::Turret, spot).unwrap();
    let mut last = (state.turrets[0].damage, state.turrets[0].range);
    for level in 2..=5 {
        let upgraded = upgrade_structure(&mut state, a, StructureKind::Turret, turret);
        assert_eq!(upgraded, Ok(level));
        let t = &state.turrets[0];
        assert!(t.damage > last.0 && t.range > last.1);
        assert_eq!(t.health, t.max_health);
        last = (t.damage, t.range);
    }
    let capped = upgrade_structure(&mut state, a, StructureKind::Turret, turret);
    assert_eq!(capped, Err(ActionError::MaxLevel));

    let spot = Vec2::new(200.0, 450.0);
    let mine = place_structure(&mut state, a, StructureKind::Mine, spot).unwrap();
    let mut damage = state.mines[0].damage;
    for level in 2..=3 {
        assert_eq!(upgrade_structure(&mut state, a, StructureKind::Mine, mine), Ok(level));
        assert!(state.mines[0].damage > damage);
        damage = state.mines[0].damage;
    }
}

#[test]
fn test_base_destruction_ends_match_immediately() {
    let (mut state, a, b) = two_player_match();
    state.bases.get_mut(&b).unwrap().health = 10.0;

    assert!(apply_base_damage(&mut state, b, 10.0));
    assert!(state.game_over);
    assert_eq!(state.winner, Some(a));
    assert_eq!(state.bases[&b].health, 0.0);

    // Further damage does not re-decide the match
    assert!(!apply_base_damage(&mut state, a, 10_000.0));
    assert_eq!(state.winner, Some(a));

    let clock = state.clock_ms;
    let result = tick(&mut state, TICK_INTERVAL_MS);
    assert!(result.match_ended);
    assert_eq!(state.clock_ms, clock);
}

#[test]
fn test_reset_after_a_played_match() {
    let (mut state, a, b) = two_player_match();
    state.ledger.credit(&a, 2_000.0);
    spawn(&mut state, a, UnitKind::Wizard).unwrap();
    spawn(&mut state, b, UnitKind::Knight).unwrap();
    place_structure(&mut state, a, StructureKind::Trap, Vec2::new(400.0, 450.0)).unwrap();
    Intent::UpgradeCastle.apply(&mut state, a).unwrap();
    run_ticks(&mut state, 60, TICK_INTERVAL_MS);

    for _ in 0..2 {
        assert_eq!(Intent::Reset.apply(&mut state, b), Ok(Outcome::Reset));
        for player in [a, b] {
            assert_eq!(state.ledger.balance(&player), STARTING_RESOURCES);
            let base = &state.bases[&player];
            assert_eq!(base.health, base.max_health);
            assert_eq!(base.level, 1);
        }
        assert!(state.units.is_empty());
        assert!(state.traps.is_empty() && state.turrets.is_empty() && state.mines.is_empty());
        assert!(state.animations.is_empty());
        assert!(state.pending.is_empty());
        assert_eq!(state.ledger.rate(), 10.0);
    }
}

#[tokio::test]
async fn test_registry_match_lifecycle() {
    let registry = MatchRegistry::new(Duration::from_millis(20));
    let a = PlayerId::random();
    let b = PlayerId::random();
    let (tx_a, mut rx_a) = mpsc::channel(256);
    let (tx_b, mut rx_b) = mpsc::channel(256);

    assert!(!registry.add_player("arena", a, "Ada", tx_a).await.unwrap().started);
    assert!(registry.add_player("arena", b, "Bo", tx_b).await.unwrap().started);

    registry
        .dispatch("arena", a, Intent::SpawnUnit { kind: UnitKind::Peasant, lane: 0 })
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let session = registry.get("arena").await.unwrap();
    {
        let s = session.read().await;
        assert!(s.state().clock_ms > 0);
        assert_eq!(s.state().units.len(), 1);
    }

    let mut saw_tick = false;
    while let Ok(msg) = rx_b.try_recv() {
        if let ServerMessage::StateUpdated { snapshot } = msg {
            saw_tick |= !snapshot.units.is_empty() && snapshot.units[0].x > 110.0;
        }
    }
    assert!(saw_tick);

    registry.remove_player("arena", b).await.unwrap();
    let mut left = false;
    while let Ok(msg) = rx_a.try_recv() {
        left |= msg == ServerMessage::PlayerLeft { slot: 1 };
    }
    assert!(left);
    assert!(!session.read().await.is_ticking());

    registry.remove_player("arena", a).await.unwrap();
    assert_eq!(registry.match_count().await, 0);
}
