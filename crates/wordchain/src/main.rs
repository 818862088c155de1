//! `wordchain-server`: runs the WebSocket server with settings from the
//! environment.
//!
//! - `WORDCHAIN_ADDR`: bind address (falls back to `0.0.0.0:$PORT`, then
//!   `0.0.0.0:8080`)
//! - `WORDCHAIN_MAX_PLAYERS`, `WORDCHAIN_INITIAL_HAND`: game rules
//! - `RUST_LOG`: log filter, `info` by default

use tracing_subscriber::EnvFilter;
use wordchain::WordchainServer;
use wordchain_room::GameConfig;
use wordchain_session::SessionConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let addr = std::env::var("WORDCHAIN_ADDR").unwrap_or_else(|_| {
        let port = std::env::var("PORT").unwrap_or_else(|_| "8080".to_string());
        format!("0.0.0.0:{port}")
    });

    let defaults = GameConfig::default();
    let game = GameConfig {
        max_players: env_usize("WORDCHAIN_MAX_PLAYERS", defaults.max_players),
        initial_hand: env_usize("WORDCHAIN_INITIAL_HAND", defaults.initial_hand),
        ..defaults
    };
    let session_config = SessionConfig {
        game,
        ..SessionConfig::default()
    };

    let server = WordchainServer::builder()
        .bind(&addr)
        .session_config(session_config)
        .build()
        .await?;

    server.run().await?;
    Ok(())
}

fn env_usize(key: &str, default: usize) -> usize {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) if value > 0 => value,
            _ => {
                tracing::warn!(key, value = %raw, default, "ignoring invalid setting");
                default
            }
        },
        Err(_) => default,
    }
}
