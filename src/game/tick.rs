//! Authoritative Simulation Tick
//!
//! The fixed per-tick pipeline. Deterministic given the match seed and the
//! sequence of intents applied between ticks.

use crate::game::combat;
use crate::game::events::GameEvent;
use crate::game::state::{MatchState, PlayerId};
use crate::game::structures;

/// Default logical time advanced by one tick.
pub const TICK_INTERVAL_MS: u64 = 150;

/// Result of a tick.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Events generated this tick
    pub events: Vec<GameEvent>,
    /// Whether the match is over after this tick
    pub match_ended: bool,
    /// Winner (if match ended with winner)
    pub winner: Option<PlayerId>,
}

/// Run one simulation tick, advancing the match clock by `dt_ms`.
///
/// # Order
///
/// 1. expire animations, then apply due deferred effects
/// 2. traps
/// 3. mines
/// 4. turret fire, then turret destruction
/// 5. rate ramp and distribution
/// 6. units
/// 7. castles
///
/// A step that decides the match skips every later step. The caller builds
/// and broadcasts the snapshot afterwards.
pub fn tick(state: &mut MatchState, dt_ms: u64) -> TickResult {
    let mut result = TickResult::default();

    if state.game_over {
        result.match_ended = true;
        result.winner = state.winner;
        return result;
    }

    // 0. Advance match clock
    state.clock_ms += dt_ms;

    let steps: [fn(&mut MatchState); 7] = [
        // 1. Animations and deferred effects
        resolve_due_effects,
        // 2. Trap collisions
        structures::process_traps,
        // 3. Mine collisions
        structures::process_mines,
        // 4. Turret attacks and destruction
        structures::process_turrets,
        // 5. Economy
        advance_economy,
        // 6. Unit movement and combat
        combat::process_units,
        // 7. Castle attacks
        combat::process_bases,
    ];

    for step in steps {
        step(state);
        if state.game_over {
            break;
        }
    }

    result.match_ended = state.game_over;
    result.winner = state.winner;
    result.events = state.take_events();
    result
}

fn resolve_due_effects(state: &mut MatchState) {
    state.expire_animations();
    for effect in state.pending.drain_due(state.clock_ms) {
        combat::apply_effect(state, effect);
        if state.game_over {
            return;
        }
    }
}

fn advance_economy(state: &mut MatchState) {
    if let Some(rate) = state.ledger.advance(state.clock_ms) {
        state.push_event(GameEvent::rate_increased(state.clock_ms, rate));
    }
}

/// Run up to `count` ticks back to back, stopping early when the match ends.
///
/// Returns every event generated.
pub fn run_ticks(state: &mut MatchState, count: u32, dt_ms: u64) -> Vec<GameEvent> {
    let mut all_events = Vec::new();
    for _ in 0..count {
        let result = tick(state, dt_ms);
        all_events.extend(result.events);
        if result.match_ended {
            break;
        }
    }
    all_events
}
