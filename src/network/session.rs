//! Match Session Management
//!
//! Wraps one match's state together with its subscribers and its recurring
//! tick task. The registry creates, looks up and destroys sessions keyed by
//! the caller-supplied match id.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, RwLock};
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::core::rng::derive_match_seed;
use crate::game::actions::{Intent, Outcome, RematchStatus};
use crate::game::error::{ActionError, ActionResult};
use crate::game::events::GameEvent;
use crate::game::snapshot::MatchSnapshot;
use crate::game::state::{MatchState, PlayerId, Slot};
use crate::game::tick::{tick, TickResult, TICK_INTERVAL_MS};
use crate::network::protocol::ServerMessage;

/// Handle to a session shared between the registry, the gateway and the tick task.
pub type SharedSession = Arc<RwLock<MatchSession>>;

/// Outbound channel to one connected player.
pub type Subscriber = mpsc::Sender<ServerMessage>;

/// Result of a successful join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinOutcome {
    /// Seat assigned to the player.
    pub slot: Slot,
    /// Whether this join started the tick loop.
    pub started: bool,
}

/// One live match.
pub struct MatchSession {
    /// Match identifier.
    pub id: String,
    /// Simulation state.
    state: MatchState,
    /// Seated players' outbound channels.
    subscribers: BTreeMap<PlayerId, Subscriber>,
    /// Recurring tick task, while running.
    tick_task: Option<JoinHandle<()>>,
    /// Bumped on every spawn so a finished loop only clears its own handle.
    tick_generation: u64,
    /// Period of the tick task and logical time advanced per tick.
    tick_interval: Duration,
    /// Creation time.
    created_at: DateTime<Utc>,
}

impl MatchSession {
    /// Create a session whose seed mixes the match id with the creation time.
    pub fn new(id: impl Into<String>, tick_interval: Duration) -> Self {
        let id = id.into();
        let now = Utc::now();
        let entropy = (now.timestamp_millis() as u64).rotate_left(20)
            ^ u64::from(now.timestamp_subsec_nanos());
        let seed = derive_match_seed(&id, entropy);
        Self::with_seed_at(id, seed, tick_interval, now)
    }

    /// Create a session with an explicit RNG seed.
    pub fn with_seed(id: impl Into<String>, seed: u64, tick_interval: Duration) -> Self {
        Self::with_seed_at(id.into(), seed, tick_interval, Utc::now())
    }

    fn with_seed_at(
        id: String,
        seed: u64,
        tick_interval: Duration,
        created_at: DateTime<Utc>,
    ) -> Self {
        let mut state = MatchState::new(id.clone(), seed);
        state.epoch_ms = created_at.timestamp_millis();

        Self {
            id,
            state,
            subscribers: BTreeMap::new(),
            tick_task: None,
            tick_generation: 0,
            tick_interval,
            created_at,
        }
    }

    /// Read-only view of the simulation.
    pub fn state(&self) -> &MatchState {
        &self.state
    }

    /// When the session was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Seated player count.
    pub fn player_count(&self) -> usize {
        self.state.players.len()
    }

    /// Seat a player and subscribe them to broadcasts.
    ///
    /// The new subscriber receives `joined` first, then everyone receives
    /// the updated snapshot.
    pub fn add_player(
        &mut self,
        player_id: PlayerId,
        name: &str,
        subscriber: Subscriber,
    ) -> ActionResult<Slot> {
        let slot = self.state.add_player(player_id, name)?;
        self.subscribers.insert(player_id, subscriber);

        self.send_to(&player_id, ServerMessage::joined(slot.index(), self.snapshot()));
        self.broadcast_state();
        Ok(slot)
    }

    /// Unseat a player. Returns the vacated slot.
    pub fn remove_player(&mut self, player_id: &PlayerId) -> Option<Slot> {
        self.subscribers.remove(player_id);
        let slot = self.state.remove_player(player_id)?;

        if !self.subscribers.is_empty() {
            self.broadcast(ServerMessage::PlayerLeft { slot: slot.index() });
            self.broadcast_state();
        }
        Some(slot)
    }

    /// Whether the tick loop should be running.
    pub fn should_tick(&self) -> bool {
        self.state.is_live()
    }

    /// Whether a tick task is currently alive.
    ///
    /// A loop that exits on its own clears its handle before it releases the
    /// session lock, so this never reports a loop that is about to finish.
    pub fn is_ticking(&self) -> bool {
        self.tick_task.is_some()
    }

    /// Abort the tick task, if any.
    pub fn stop_tick_loop(&mut self) {
        if let Some(task) = self.tick_task.take() {
            task.abort();
            debug!(match_id = %self.id, "tick loop stopped");
        }
    }

    /// Start or stop the tick task so that it runs exactly while the match is live.
    pub fn sync_tick_loop(&mut self, handle: &SharedSession) -> bool {
        if !self.should_tick() {
            self.stop_tick_loop();
            return false;
        }
        if self.is_ticking() {
            return false;
        }
        self.tick_generation += 1;
        let task = spawn_tick_loop(handle.clone(), self.tick_interval, self.tick_generation);
        self.tick_task = Some(task);
        info!(
            match_id = %self.id,
            interval_ms = self.tick_interval.as_millis() as u64,
            "tick loop started"
        );
        true
    }

    /// Called by a tick loop, under the session lock, as it exits.
    fn tick_loop_exited(&mut self, generation: u64) {
        if self.tick_generation == generation {
            self.tick_task = None;
            debug!(match_id = %self.id, "tick loop finished");
        }
    }

    /// Run one tick and broadcast the resulting snapshot.
    pub fn run_tick(&mut self) -> TickResult {
        let dt_ms = (self.tick_interval.as_millis() as u64).max(1);
        let result = tick(&mut self.state, dt_ms);

        for event in &result.events {
            self.log_event(event);
        }
        if result.match_ended {
            info!(
                match_id = %self.id,
                winner = %result.winner.map(|w| w.short()).unwrap_or_default(),
                clock_ms = self.state.clock_ms,
                "match decided"
            );
        }

        self.broadcast_state();
        result
    }

    /// Apply one player intent.
    ///
    /// On success the new snapshot is broadcast, followed by any outcome
    /// notification. Rejections leave the state and the subscribers untouched.
    #[instrument(skip(self, intent), fields(match_id = %self.id, player = %player_id.short()))]
    pub fn apply_intent(&mut self, player_id: PlayerId, intent: Intent) -> ActionResult<Outcome> {
        if self.state.player(&player_id).is_none() {
            return Err(ActionError::UnknownPlayer);
        }

        let action = intent.name();
        let outcome = match intent.apply(&mut self.state, player_id) {
            Ok(outcome) => outcome,
            Err(err) => {
                debug!(action, %err, "intent rejected");
                return Err(err);
            }
        };
        debug!(action, ?outcome, "intent applied");

        for event in self.state.take_events() {
            self.log_event(&event);
        }

        self.broadcast_state();

        let name = self.state.player_name(&player_id).to_string();
        match outcome {
            Outcome::Gamble { won: true } => {
                info!("gamble won");
                self.broadcast(ServerMessage::GambleWon {
                    message: format!("{} hit the jackpot and wins the match!", name),
                    winner_name: name,
                });
            }
            Outcome::Rematch(RematchStatus::Waiting) => {
                self.broadcast(ServerMessage::RematchRequested {
                    requester_name: name,
                    player_id,
                });
            }
            Outcome::Rematch(RematchStatus::Started) => {
                info!("rematch started");
                self.broadcast(ServerMessage::RematchStarted);
            }
            _ => {}
        }

        Ok(outcome)
    }

    /// Capture the current snapshot.
    pub fn snapshot(&self) -> MatchSnapshot {
        MatchSnapshot::capture(&self.state)
    }

    fn log_event(&self, event: &GameEvent) {
        debug!(
            match_id = %self.id,
            at_ms = event.at_ms,
            player = %event.player_id.map(|p| p.short()).unwrap_or_default(),
            event = ?event.data,
            "game event"
        );
    }

    fn broadcast_state(&self) {
        self.broadcast(ServerMessage::state(self.snapshot()));
    }

    /// Send a message to every subscriber without waiting.
    pub fn broadcast(&self, message: ServerMessage) {
        for player_id in self.subscribers.keys() {
            self.send_to(player_id, message.clone());
        }
    }

    /// Send a message to one subscriber without waiting.
    pub fn send_to(&self, player_id: &PlayerId, message: ServerMessage) {
        let Some(subscriber) = self.subscribers.get(player_id) else {
            return;
        };
        match subscriber.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(
                    match_id = %self.id,
                    player = %player_id.short(),
                    "subscriber lagging, message dropped"
                );
            }
            Err(TrySendError::Closed(_)) => {
                debug!(match_id = %self.id, player = %player_id.short(), "subscriber gone");
            }
        }
    }
}

impl Drop for MatchSession {
    fn drop(&mut self) {
        self.stop_tick_loop();
    }
}

/// Spawn the recurring tick task for a session.
///
/// The task exits on its own once the match stops being live.
fn spawn_tick_loop(session: SharedSession, period: Duration, generation: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let mut s = session.write().await;
            if !s.should_tick() || s.run_tick().match_ended {
                s.tick_loop_exited(generation);
                break;
            }
        }
    })
}

// =============================================================================
// MATCH REGISTRY
// =============================================================================

/// All live matches, keyed by match id.
pub struct MatchRegistry {
    /// Live sessions.
    matches: RwLock<BTreeMap<String, SharedSession>>,
    /// Tick period for new sessions.
    tick_interval: Duration,
    /// Accepting joins.
    open: AtomicBool,
}

impl MatchRegistry {
    /// Create an open registry.
    pub fn new(tick_interval: Duration) -> Self {
        Self {
            matches: RwLock::new(BTreeMap::new()),
            tick_interval,
            open: AtomicBool::new(true),
        }
    }

    /// Accept joins again after `close`.
    pub fn open(&self) {
        self.open.store(true, Ordering::SeqCst);
    }

    /// Whether joins are accepted.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Stop every tick loop and drop every session.
    pub async fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
        let mut matches = self.matches.write().await;
        for session in matches.values() {
            session.write().await.stop_tick_loop();
        }
        let count = matches.len();
        matches.clear();
        info!(count, "registry closed");
    }

    /// Look up a match, creating it when absent.
    pub async fn create_or_get(&self, match_id: &str) -> ActionResult<SharedSession> {
        if !self.is_open() {
            return Err(ActionError::UnknownMatch);
        }
        let mut matches = self.matches.write().await;
        Ok(Self::entry(&mut matches, match_id, self.tick_interval))
    }

    fn entry(
        matches: &mut BTreeMap<String, SharedSession>,
        match_id: &str,
        tick_interval: Duration,
    ) -> SharedSession {
        matches
            .entry(match_id.to_string())
            .or_insert_with(|| {
                info!(match_id, "match created");
                Arc::new(RwLock::new(MatchSession::new(match_id, tick_interval)))
            })
            .clone()
    }

    /// Look up a match.
    pub async fn get(&self, match_id: &str) -> Option<SharedSession> {
        self.matches.read().await.get(match_id).cloned()
    }

    /// Seat a player, creating the match on first join.
    ///
    /// Holds the map lock throughout so a concurrent leave cannot destroy
    /// the match mid-join.
    #[instrument(skip(self, name, subscriber), fields(player = %player_id.short()))]
    pub async fn add_player(
        &self,
        match_id: &str,
        player_id: PlayerId,
        name: &str,
        subscriber: Subscriber,
    ) -> ActionResult<JoinOutcome> {
        if !self.is_open() {
            return Err(ActionError::UnknownMatch);
        }
        let mut matches = self.matches.write().await;
        let handle = Self::entry(&mut matches, match_id, self.tick_interval);
        let mut session = handle.write().await;

        let slot = match session.add_player(player_id, name, subscriber) {
            Ok(slot) => slot,
            Err(err) => {
                debug!(%err, "join refused");
                if session.player_count() == 0 {
                    drop(session);
                    matches.remove(match_id);
                }
                return Err(err);
            }
        };

        let started = session.sync_tick_loop(&handle);
        info!(?slot, name, "player joined");
        Ok(JoinOutcome { slot, started })
    }

    /// Unseat a player; destroys the match once empty.
    #[instrument(skip(self), fields(player = %player_id.short()))]
    pub async fn remove_player(&self, match_id: &str, player_id: PlayerId) -> ActionResult<Slot> {
        let mut matches = self.matches.write().await;
        let handle = matches.get(match_id).cloned().ok_or(ActionError::UnknownMatch)?;
        let mut session = handle.write().await;

        if session.state().player(&player_id).is_none() {
            return Err(ActionError::UnknownPlayer);
        }

        session.stop_tick_loop();
        let slot = session.remove_player(&player_id).ok_or(ActionError::UnknownPlayer)?;
        info!(?slot, "player left");

        if session.player_count() == 0 {
            drop(session);
            matches.remove(match_id);
            info!(match_id, "match destroyed");
        } else {
            session.sync_tick_loop(&handle);
        }
        Ok(slot)
    }

    /// Apply one intent under the session lock.
    pub async fn dispatch(
        &self,
        match_id: &str,
        player_id: PlayerId,
        intent: Intent,
    ) -> ActionResult<Outcome> {
        let handle = self.get(match_id).await.ok_or(ActionError::UnknownMatch)?;
        let mut session = handle.write().await;

        let outcome = session.apply_intent(player_id, intent)?;
        session.sync_tick_loop(&handle);
        Ok(outcome)
    }

    /// Live match count.
    pub async fn match_count(&self) -> usize {
        self.matches.read().await.len()
    }
}

impl Default for MatchRegistry {
    fn default() -> Self {
        Self::new(Duration::from_millis(TICK_INTERVAL_MS))
    }
}
