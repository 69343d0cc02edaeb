//! Property tests over random intent sequences.

use proptest::prelude::*;

use lane_siege::core::vec2::Vec2;
use lane_siege::game::actions::Intent;
use lane_siege::game::structures::StructureKind;
use lane_siege::game::tick::tick;
use lane_siege::game::{MatchState, PlayerId, UnitKind, WeaponKind, TICK_INTERVAL_MS};

fn unit_kind() -> impl Strategy<Value = UnitKind> {
    prop::sample::select(UnitKind::ALL.to_vec())
}

fn structure_kind() -> impl Strategy<Value = StructureKind> {
    prop_oneof![
        Just(StructureKind::Trap),
        Just(StructureKind::Turret),
        Just(StructureKind::Mine),
    ]
}

fn intent() -> impl Strategy<Value = Intent> {
    prop_oneof![
        6 => (unit_kind(), 0u8..4).prop_map(|(kind, lane)| Intent::SpawnUnit { kind, lane }),
        2 => (structure_kind(), 0.0f64..1200.0, 0.0f64..600.0)
            .prop_map(|(kind, x, y)| Intent::Place { kind, position: Vec2::new(x, y) }),
        1 => (structure_kind(), 1u64..40).prop_map(|(kind, id)| Intent::Upgrade { kind, id }),
        1 => Just(Intent::UpgradeCastle),
        1 => prop::sample::select(WeaponKind::ALL.to_vec())
            .prop_map(|weapon| Intent::ChangeWeapon { weapon }),
        1 => (unit_kind(), -50.0f64..300.0).prop_map(|(kind, cost)| Intent::PurchasePowerup {
            kind,
            name: "sharpness".into(),
            cost,
        }),
        1 => Just(Intent::Gamble),
    ]
}

/// One step of a scripted match: an intent from one side, then a number of ticks.
fn step() -> impl Strategy<Value = (bool, Intent, u8)> {
    (any::<bool>(), intent(), 0u8..6)
}

fn check_invariants(state: &MatchState) -> Result<(), TestCaseError> {
    for (player, balance) in state.ledger.balances() {
        prop_assert!(*balance >= 0.0, "{} has negative balance {}", player, balance);
    }
    for unit in &state.units {
        prop_assert!(unit.health >= 0.0 && unit.health <= unit.max_health);
        prop_assert!(unit.position.is_finite());
    }
    for base in state.bases.values() {
        prop_assert!(base.health >= 0.0 && base.health <= base.max_health);
    }
    for turret in &state.turrets {
        prop_assert!(turret.health >= 0.0 && turret.health <= turret.max_health);
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_balances_and_health_stay_in_bounds(
        seed in any::<u64>(),
        script in prop::collection::vec(step(), 1..80),
    ) {
        let mut state = MatchState::new("prop", seed);
        let a = PlayerId::from_u128(1);
        let b = PlayerId::from_u128(2);
        state.add_player(a, "Ada").unwrap();
        state.add_player(b, "Bo").unwrap();
        state.ledger.credit(&a, 3_000.0);
        state.ledger.credit(&b, 3_000.0);

        for (left, intent, ticks) in script {
            let player = if left { a } else { b };
            let before = state.ledger.balance(&player);
            if intent.apply(&mut state, player).is_err() {
                prop_assert_eq!(state.ledger.balance(&player), before);
            }
            check_invariants(&state)?;

            for _ in 0..ticks {
                tick(&mut state, TICK_INTERVAL_MS);
                check_invariants(&state)?;
            }
        }
    }

    #[test]
    fn test_same_seed_same_match(
        seed in any::<u64>(),
        script in prop::collection::vec(step(), 1..40),
    ) {
        let run = |script: &[(bool, Intent, u8)]| {
            let mut state = MatchState::new("replay", seed);
            let a = PlayerId::from_u128(1);
            let b = PlayerId::from_u128(2);
            state.add_player(a, "Ada").unwrap();
            state.add_player(b, "Bo").unwrap();
            for (left, intent, ticks) in script {
                let player = if *left { a } else { b };
                let _ = intent.clone().apply(&mut state, player);
                for _ in 0..*ticks {
                    tick(&mut state, TICK_INTERVAL_MS);
                }
            }
            state
        };

        let first = run(&script);
        let second = run(&script);
        prop_assert_eq!(first.clock_ms, second.clock_ms);
        prop_assert_eq!(first.ledger.balances(), second.ledger.balances());
        prop_assert_eq!(first.units.len(), second.units.len());
        prop_assert_eq!(first.winner, second.winner);
        prop_assert_eq!(first.rng.state(), second.rng.state());
    }
}
