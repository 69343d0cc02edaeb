//! Deferred Effects
//!
//! Staggered chain hits, multi-hit bolts and death removals are queued here
//! against the match clock and applied at the start of the first tick whose
//! clock has reached them. Ordering is `(due_ms, seq)`, so two effects due
//! at the same instant apply in the order they were scheduled.

use crate::core::vec2::Vec2;
use crate::game::state::{AnimationKind, EntityId, PlayerId};

/// What a deferred effect does when it comes due.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    /// Damage a unit if it is still alive.
    Damage {
        /// Victim
        target: EntityId,
        /// Damage after every modifier
        amount: f64,
        /// Who collects the kill reward
        credit_to: Option<PlayerId>,
        /// Multiplier on the kill reward
        reward_scale: f64,
        /// Where the hit's animation starts
        origin: Vec2,
        /// Animation drawn when the hit lands
        animation: AnimationKind,
    },
    /// Take a dead unit off the field.
    RemoveUnit {
        /// Unit to remove
        unit: EntityId,
    },
}

/// A queued effect.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingEffect {
    /// Match clock at which it applies
    pub due_ms: u64,
    /// Scheduling order tie-breaker
    pub seq: u64,
    /// What to do
    pub effect: Effect,
}

/// Queue of deferred effects for one match.
#[derive(Clone, Debug, Default)]
pub struct PendingEffects {
    queue: Vec<PendingEffect>,
    next_seq: u64,
}

impl PendingEffects {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an effect for `due_ms`.
    pub fn schedule(&mut self, due_ms: u64, effect: Effect) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(PendingEffect { due_ms, seq, effect });
    }

    /// Remove and return every effect due at or before `now_ms`, in order.
    pub fn drain_due(&mut self, now_ms: u64) -> Vec<Effect> {
        let (mut due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.queue)
            .into_iter()
            .partition(|p| p.due_ms <= now_ms);
        self.queue = waiting;
        due.sort_by_key(|p| (p.due_ms, p.seq));
        due.into_iter().map(|p| p.effect).collect()
    }

    /// Drop everything (game over, reset, teardown).
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    /// Number of queued effects.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Check if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drop queued hits whose kill reward would go to `player`.
    pub fn cancel_credited_to(&mut self, player: &PlayerId) {
        self.queue.retain(|p| match &p.effect {
            Effect::Damage { credit_to, .. } => credit_to.as_ref() != Some(player),
            Effect::RemoveUnit { .. } => true,
        });
    }
}
