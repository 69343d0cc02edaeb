//! Lane Siege Game Server
//!
//! Binds the WebSocket gateway and serves matches until Ctrl-C.

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lane_siege::{GameServer, ServerConfig, VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = ServerConfig::from_env().context("reading server configuration")?;
    info!("Lane Siege Server v{}", VERSION);
    info!(
        "Bind: {}, max connections: {}, tick: {} ms",
        config.bind_addr,
        config.max_connections,
        config.tick_interval.as_millis()
    );

    let server = GameServer::new(config);

    tokio::select! {
        result = server.run() => {
            result.context("game server stopped")?;
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("listening for ctrl-c")?;
            info!("Ctrl-C received, closing matches");
            server.shutdown();
            server.registry().close().await;
        }
    }

    Ok(())
}
