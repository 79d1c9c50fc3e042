//! framewire - framed binary message server
//!
//! Accepts TCP connections and answers framewire requests until Ctrl+C.

use framewire_protocol::MessageRegistry;
use framewire_server::{Config, Dispatcher, Server, ServerConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // File from FRAMEWIRE_CONFIG if set, then env overrides
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to load config: {}", e);
            return Err(e.into());
        }
    };

    MessageRegistry::standard().install()?;

    tracing::info!("Starting framewire server");
    tracing::info!("  Bind address: {}", config.network.bind_addr);
    tracing::info!("  Serializer: {}", config.protocol.serializer);
    tracing::info!("  Max payload: {} bytes", config.protocol.max_payload_bytes);
    tracing::info!("  Max connections: {}", config.network.max_connections);

    let server = Server::new(ServerConfig::from(&config), Dispatcher::standard());

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal, stopping server...");
            server.shutdown();
        }
    }

    tracing::info!("Server stopped");
    Ok(())
}
