//! WebSocket Game Server
//!
//! Async WebSocket gateway. Parses client frames, routes them to the match
//! registry and streams notifications back to each connection.

use std::collections::{BTreeMap, BTreeSet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock, broadcast};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn, error, debug, instrument};

use crate::game::error::ActionError;
use crate::game::state::PlayerId;
use crate::game::tick::TICK_INTERVAL_MS;
use crate::network::protocol::{ClientMessage, ServerMessage, ErrorCode};
use crate::network::session::MatchRegistry;

/// Environment variable overriding the bind address.
pub const ENV_BIND: &str = "LANE_SIEGE_BIND";
/// Environment variable overriding the connection limit.
pub const ENV_MAX_CONNECTIONS: &str = "LANE_SIEGE_MAX_CONNECTIONS";
/// Environment variable overriding the tick period in milliseconds.
pub const ENV_TICK_MS: &str = "LANE_SIEGE_TICK_MS";

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Tick period for every match.
    pub tick_interval: Duration,
    /// Outbound queue depth per connection.
    pub channel_capacity: usize,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 1000,
            tick_interval: Duration::from_millis(TICK_INTERVAL_MS),
            channel_capacity: 64,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `LANE_SIEGE_*` environment variables.
    pub fn from_env() -> Result<Self, GameServerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, GameServerError> {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_BIND) {
            config.bind_addr = value
                .parse()
                .map_err(|_| invalid(ENV_BIND, &value, "a socket address"))?;
        }
        if let Some(value) = lookup(ENV_MAX_CONNECTIONS) {
            config.max_connections = value
                .parse()
                .map_err(|_| invalid(ENV_MAX_CONNECTIONS, &value, "a count"))?;
        }
        if let Some(value) = lookup(ENV_TICK_MS) {
            let ms: u64 = value
                .parse()
                .ok()
                .filter(|ms| *ms > 0)
                .ok_or_else(|| invalid(ENV_TICK_MS, &value, "a positive integer"))?;
            config.tick_interval = Duration::from_millis(ms);
        }

        Ok(config)
    }
}

fn invalid(key: &str, value: &str, expected: &str) -> GameServerError {
    GameServerError::Config(format!("{}={} is not {}", key, value, expected))
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Connected client state.
struct ConnectedClient {
    /// Server-assigned player identity.
    player_id: PlayerId,
    /// Matches this connection is seated in.
    matches: BTreeSet<String>,
    /// Connection time.
    connected_at: Instant,
}

type Clients = Arc<RwLock<BTreeMap<SocketAddr, ConnectedClient>>>;

/// The game server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// Live matches.
    registry: Arc<MatchRegistry>,
    /// Connected clients.
    clients: Clients,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a new game server.
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            registry: Arc::new(MatchRegistry::new(config.tick_interval)),
            config,
            clients: Arc::new(RwLock::new(BTreeMap::new())),
            shutdown_tx,
        }
    }

    /// Match registry shared with every connection.
    pub fn registry(&self) -> Arc<MatchRegistry> {
        self.registry.clone()
    }

    /// Run the server until `shutdown` is called.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Accept connections on an already bound listener.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GameServerError> {
        info!(
            addr = %listener.local_addr()?,
            version = %self.config.version,
            tick_ms = self.config.tick_interval.as_millis() as u64,
            "Game server listening"
        );

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        self.registry.open();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let clients_count = self.clients.read().await.len();
                            if clients_count >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                Self::reject_connection(stream, addr);
                                continue;
                            }

                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        self.registry.close().await;
        Ok(())
    }

    /// Tell a client over the connection limit why, then close it.
    fn reject_connection(stream: TcpStream, addr: SocketAddr) {
        tokio::spawn(async move {
            let mut ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    debug!("WebSocket handshake failed for rejected {}: {}", addr, e);
                    return;
                }
            };

            let overloaded =
                ServerMessage::error(ErrorCode::ServerOverloaded, "Connection limit reached");
            match overloaded.to_json() {
                Ok(text) => {
                    if let Err(e) = ws_stream.send(Message::Text(text)).await {
                        debug!("Could not notify rejected {}: {}", addr, e);
                    }
                }
                Err(e) => error!("Failed to serialize message: {}", e),
            }
            let _ = ws_stream.close(None).await;
        });
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let clients = self.clients.clone();
        let registry = self.registry.clone();
        let capacity = self.config.channel_capacity;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(capacity);

            let player_id = PlayerId::random();
            clients.write().await.insert(addr, ConnectedClient {
                player_id,
                matches: BTreeSet::new(),
                connected_at: Instant::now(),
            });
            debug!(player = %player_id.short(), "{} identified", addr);

            // Spawn message sender task
            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
            });

            // Handle incoming messages
            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                let client_msg = match ClientMessage::from_json(&text) {
                                    Ok(m) => m,
                                    Err(e) => {
                                        debug!("Invalid message from {}: {}", addr, e);
                                        reply(&msg_tx, ServerMessage::error(
                                            ErrorCode::InvalidMessage,
                                            "Invalid message format",
                                        ));
                                        continue;
                                    }
                                };

                                Self::handle_client_message(
                                    addr,
                                    player_id,
                                    client_msg,
                                    &clients,
                                    &registry,
                                    &msg_tx,
                                ).await;
                            }
                            Some(Ok(Message::Binary(_))) => {
                                reply(&msg_tx, ServerMessage::error(
                                    ErrorCode::InvalidMessage,
                                    "Binary frames are not supported",
                                ));
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Client {} disconnected", addr);
                                break;
                            }
                            Some(Err(e)) => {
                                error!("WebSocket error for {}: {}", addr, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }

            // Cleanup
            sender_task.abort();

            // A dropped connection leaves every match it joined
            let client = clients.write().await.remove(&addr);
            if let Some(client) = client {
                for match_id in &client.matches {
                    if let Err(e) = registry.remove_player(match_id, client.player_id).await {
                        debug!(%match_id, "leave on disconnect skipped: {}", e);
                    }
                }
                info!(
                    "Client {} cleaned up after {:?}",
                    addr,
                    client.connected_at.elapsed()
                );
            }
        });
    }

    /// Handle a client message.
    async fn handle_client_message(
        addr: SocketAddr,
        player_id: PlayerId,
        msg: ClientMessage,
        clients: &Clients,
        registry: &Arc<MatchRegistry>,
        tx: &mpsc::Sender<ServerMessage>,
    ) {
        match msg {
            ClientMessage::Join { match_id, player_name } => {
                match registry.add_player(&match_id, player_id, &player_name, tx.clone()).await {
                    Ok(_) => {
                        if let Some(client) = clients.write().await.get_mut(&addr) {
                            client.matches.insert(match_id);
                        }
                    }
                    Err(e) => reply(tx, ServerMessage::join_refused(&e)),
                }
            }
            ClientMessage::Leave { match_id } => {
                if let Some(client) = clients.write().await.get_mut(&addr) {
                    client.matches.remove(&match_id);
                }
                if let Err(e) = registry.remove_player(&match_id, player_id).await {
                    reply(tx, routing_error(&e));
                }
            }
            other => {
                let match_id = other.match_id().to_string();
                let Some(intent) = other.into_intent() else {
                    return;
                };
                let action = intent.name();

                match registry.dispatch(&match_id, player_id, intent).await {
                    Ok(_) => reply(tx, ServerMessage::ack(action, Ok(()))),
                    Err(e) => match ErrorCode::for_routing(&e) {
                        Some(code) => reply(tx, ServerMessage::error(code, e.to_string())),
                        None => reply(tx, ServerMessage::ack(action, Err(&e))),
                    },
                }
            }
        }
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get active connection count.
    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Get live match count.
    pub async fn match_count(&self) -> usize {
        self.registry.match_count().await
    }
}

fn routing_error(err: &ActionError) -> ServerMessage {
    let code = ErrorCode::for_routing(err).unwrap_or(ErrorCode::InternalError);
    ServerMessage::error(code, err.to_string())
}

/// Queue a direct reply without waiting on a slow client.
fn reply(tx: &mpsc::Sender<ServerMessage>, message: ServerMessage) {
    if tx.try_send(message).is_err() {
        warn!("Reply dropped, client queue full or closed");
    }
}
