//! Economy
//!
//! Player balances, the shared generation rate and its ramp, kill rewards,
//! price tables and the per-player powerup registry.

use std::collections::{BTreeMap, BTreeSet};

use crate::game::error::{ActionError, ActionResult};
use crate::game::state::{PlayerId, UnitKind};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Balance every player starts (and restarts) with.
pub const STARTING_RESOURCES: f64 = 500.0;

/// Generation rate at match start.
pub const INITIAL_RATE: f64 = 10.0;

/// Rate increase per ramp step.
pub const RATE_STEP: f64 = 0.5;

/// Match time between ramp steps.
pub const RATE_INTERVAL_MS: u64 = 2000;

/// Match time between distributions.
pub const DISTRIBUTION_INTERVAL_MS: u64 = 1000;

/// Price of a gamble.
pub const GAMBLE_COST: f64 = 1000.0;

/// A gamble wins one time in this many.
pub const GAMBLE_ODDS: u32 = 10_000;

/// Kill reward for a source without a unit kind.
pub const FALLBACK_REWARD: f64 = 20.0;

/// Reward scale for secondary chain hits.
pub const CHAIN_REWARD_SCALE: f64 = 0.5;

/// Price to raise a castle from `level` to `level + 1`.
#[inline]
pub fn castle_upgrade_cost(level: u8) -> f64 {
    f64::from(level) * 400.0
}

/// Resources paid for killing a unit of `kind`.
#[inline]
pub fn kill_reward(kind: Option<UnitKind>) -> f64 {
    kind.map_or(FALLBACK_REWARD, |k| k.stats().reward)
}

// =============================================================================
// LEDGER
// =============================================================================

/// Balances plus the shared generation rate.
///
/// Balances never go negative: `try_debit` refuses instead.
#[derive(Clone, Debug)]
pub struct Ledger {
    balances: BTreeMap<PlayerId, f64>,
    rate: f64,
    last_rate_increase_ms: u64,
    last_distribution_ms: u64,
}

impl Ledger {
    /// Create an empty ledger with its ramp anchored at `now_ms`.
    pub fn new(now_ms: u64) -> Self {
        Self {
            balances: BTreeMap::new(),
            rate: INITIAL_RATE,
            last_rate_increase_ms: now_ms,
            last_distribution_ms: now_ms,
        }
    }

    /// Give a player the starting balance.
    pub fn open_account(&mut self, player: PlayerId) {
        self.balances.insert(player, STARTING_RESOURCES);
    }

    /// Drop a player's balance.
    pub fn close_account(&mut self, player: &PlayerId) {
        self.balances.remove(player);
    }

    /// Current balance (0 for unknown players).
    pub fn balance(&self, player: &PlayerId) -> f64 {
        self.balances.get(player).copied().unwrap_or(0.0)
    }

    /// Every balance, in player id order.
    pub fn balances(&self) -> &BTreeMap<PlayerId, f64> {
        &self.balances
    }

    /// Current generation rate per second.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Add resources. Unknown players and non-positive amounts are ignored.
    pub fn credit(&mut self, player: &PlayerId, amount: f64) {
        if amount.is_nan() || amount <= 0.0 {
            return;
        }
        if let Some(balance) = self.balances.get_mut(player) {
            *balance += amount;
        }
    }

    /// Deduct `cost` if the player can afford it.
    pub fn try_debit(&mut self, player: &PlayerId, cost: f64) -> ActionResult<()> {
        if !cost.is_finite() || cost < 0.0 {
            return Err(ActionError::InvalidCost);
        }
        let balance = self.balances.get_mut(player).ok_or(ActionError::UnknownPlayer)?;
        if *balance < cost {
            return Err(ActionError::InsufficientResources { needed: cost, available: *balance });
        }
        *balance -= cost;
        Ok(())
    }

    /// Run every ramp step and distribution due by `now_ms`, oldest first.
    ///
    /// A ramp step and a distribution due at the same instant ramp first.
    /// Returns the latest rate when it ramped during this call.
    pub fn advance(&mut self, now_ms: u64) -> Option<f64> {
        let mut ramped = None;
        loop {
            let next_ramp = self.last_rate_increase_ms + RATE_INTERVAL_MS;
            let next_distribution = self.last_distribution_ms + DISTRIBUTION_INTERVAL_MS;

            if next_ramp <= now_ms && next_ramp <= next_distribution {
                self.rate += RATE_STEP;
                // Anchored: one step per 2 s of match time
                self.last_rate_increase_ms = next_ramp;
                ramped = Some(self.rate);
            } else if next_distribution <= now_ms {
                let rate = self.rate;
                for balance in self.balances.values_mut() {
                    *balance += rate;
                }
                self.last_distribution_ms = next_distribution;
            } else {
                return ramped;
            }
        }
    }

    /// Restore the starting rate and restart the ramp at `now_ms`.
    ///
    /// Accounts are dropped; the caller reopens one per seated player.
    pub fn reset(&mut self, now_ms: u64) {
        self.balances.clear();
        self.rate = INITIAL_RATE;
        self.last_rate_increase_ms = now_ms;
        self.last_distribution_ms = now_ms;
    }
}

// =============================================================================
// POWERUPS
// =============================================================================

/// Named stat bonus applied to units at spawn.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PowerupEffect {
    /// Max health multiplier
    Health(f64),
    /// Damage multiplier
    Damage(f64),
    /// Speed multiplier
    Speed(f64),
    /// Attack range multiplier
    Range(f64),
}

/// Stat effect of a powerup name, if it has one.
pub fn powerup_effect(name: &str) -> Option<PowerupEffect> {
    match name {
        "vitality" => Some(PowerupEffect::Health(1.25)),
        "sharpness" => Some(PowerupEffect::Damage(1.2)),
        "haste" => Some(PowerupEffect::Speed(1.2)),
        "eagle_eye" => Some(PowerupEffect::Range(1.15)),
        _ => None,
    }
}

/// Purchased powerups per player per unit kind.
///
/// Append-only for the life of a match.
#[derive(Clone, Debug, Default)]
pub struct PowerupRegistry {
    owned: BTreeMap<PlayerId, BTreeMap<UnitKind, BTreeSet<String>>>,
}

impl PowerupRegistry {
    /// Check if a player already owns a powerup for a kind.
    pub fn has(&self, player: &PlayerId, kind: UnitKind, name: &str) -> bool {
        self.owned
            .get(player)
            .and_then(|kinds| kinds.get(&kind))
            .is_some_and(|names| names.contains(name))
    }

    /// Record a purchase. Returns false if it was already owned.
    pub fn insert(&mut self, player: PlayerId, kind: UnitKind, name: impl Into<String>) -> bool {
        self.owned
            .entry(player)
            .or_default()
            .entry(kind)
            .or_default()
            .insert(name.into())
    }

    /// Names a player owns for a kind.
    pub fn for_unit(&self, player: &PlayerId, kind: UnitKind) -> impl Iterator<Item = &str> {
        self.owned
            .get(player)
            .and_then(|kinds| kinds.get(&kind))
            .into_iter()
            .flat_map(|names| names.iter().map(String::as_str))
    }

    /// Everything, for the snapshot.
    pub fn all(&self) -> &BTreeMap<PlayerId, BTreeMap<UnitKind, BTreeSet<String>>> {
        &self.owned
    }

    /// Forget one player's purchases.
    pub fn remove_player(&mut self, player: &PlayerId) {
        self.owned.remove(player);
    }

    /// Forget every purchase.
    pub fn clear(&mut self) {
        self.owned.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger_with(player: PlayerId) -> Ledger {
        let mut ledger = Ledger::new(0);
        ledger.open_account(player);
        ledger
    }

    #[test]
    fn test_debit_refuses_overdraft() {
        let p = PlayerId::from_u128(1);
        let mut ledger = ledger_with(p);

        assert!(ledger.try_debit(&p, 350.0).is_ok());
        assert_eq!(ledger.balance(&p), 150.0);

        let err = ledger.try_debit(&p, 200.0).unwrap_err();
        assert_eq!(err, ActionError::InsufficientResources { needed: 200.0, available: 150.0 });
        assert_eq!(ledger.balance(&p), 150.0);

        assert!(ledger.try_debit(&p, 150.0).is_ok());
        assert_eq!(ledger.balance(&p), 0.0);
    }

    #[test]
    fn test_debit_rejects_bad_cost() {
        let p = PlayerId::from_u128(1);
        let mut ledger = ledger_with(p);
        assert_eq!(ledger.try_debit(&p, -5.0), Err(ActionError::InvalidCost));
        assert_eq!(ledger.try_debit(&p, f64::NAN), Err(ActionError::InvalidCost));
        assert_eq!(ledger.try_debit(&PlayerId::from_u128(2), 1.0), Err(ActionError::UnknownPlayer));
    }

    #[test]
    fn test_ramp_and_distribution() {
        let p = PlayerId::from_u128(1);
        let mut ledger = ledger_with(p);

        let mut now = 0;
        let mut ramps = Vec::new();
        for _ in 0..27 {
            now += 150;
            if let Some(rate) = ledger.advance(now) {
                ramps.push(rate);
            }
        }
        // 4050 ms elapsed: two ramp steps
        assert_eq!(ramps, vec![10.5, 11.0]);
        assert_eq!(ledger.rate(), 11.0);
        assert!(ledger.balance(&p) > STARTING_RESOURCES);
    }

    #[test]
    fn test_long_ticks_catch_up() {
        let p = PlayerId::from_u128(1);
        let mut coarse = ledger_with(p);
        let mut fine = ledger_with(p);

        for step in 1..=20 {
            coarse.advance(step * 3000);
        }
        for step in 1..=600 {
            fine.advance(step * 100);
        }

        // 60 s of match time: 30 ramp steps and 60 distributions
        assert_eq!(coarse.rate(), 25.0);
        assert_eq!(coarse.balance(&p), 1550.0);
        assert_eq!(fine.rate(), coarse.rate());
        assert_eq!(fine.balance(&p), coarse.balance(&p));
    }

    #[test]
    fn test_credit_ignores_junk() {
        let p = PlayerId::from_u128(1);
        let mut ledger = ledger_with(p);
        ledger.credit(&p, -10.0);
        ledger.credit(&p, f64::NAN);
        ledger.credit(&PlayerId::from_u128(3), 10.0);
        assert_eq!(ledger.balance(&p), STARTING_RESOURCES);
        ledger.credit(&p, 10.0);
        assert_eq!(ledger.balance(&p), 510.0);
    }

    #[test]
    fn test_reset_restores_rate() {
        let p = PlayerId::from_u128(1);
        let mut ledger = ledger_with(p);
        ledger.advance(2000);
        assert_eq!(ledger.rate(), 10.5);
        ledger.reset(2000);
        assert_eq!(ledger.rate(), INITIAL_RATE);
        assert_eq!(ledger.balance(&p), 0.0);
        assert_eq!(ledger.advance(3999), None);
        assert_eq!(ledger.advance(4000), Some(10.5));
    }

    #[test]
    fn test_price_tables() {
        assert_eq!(castle_upgrade_cost(1), 400.0);
        assert_eq!(castle_upgrade_cost(4), 1600.0);
        assert_eq!(kill_reward(Some(UnitKind::King)), 150.0);
        assert_eq!(kill_reward(None), FALLBACK_REWARD);
    }

    #[test]
    fn test_powerup_registry() {
        let p = PlayerId::from_u128(1);
        let mut registry = PowerupRegistry::default();
        assert!(registry.insert(p, UnitKind::Knight, "vitality"));
        assert!(!registry.insert(p, UnitKind::Knight, "vitality"));
        assert!(registry.has(&p, UnitKind::Knight, "vitality"));
        assert!(!registry.has(&p, UnitKind::Archer, "vitality"));

        registry.insert(p, UnitKind::Knight, "lucky_charm");
        let names: Vec<&str> = registry.for_unit(&p, UnitKind::Knight).collect();
        assert_eq!(names, vec!["lucky_charm", "vitality"]);
        assert_eq!(powerup_effect("lucky_charm"), None);
        assert_eq!(powerup_effect("haste"), Some(PowerupEffect::Speed(1.2)));
    }
}
