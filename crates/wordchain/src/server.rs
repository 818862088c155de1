//! `WordchainServer` builder and server loop.
//!
//! This is the entry point for running a wordchain server. It ties
//! together all the layers: transport → protocol → session → room.

use std::net::SocketAddr;
use std::sync::Arc;

use wordchain_protocol::{Codec, JsonCodec};
use wordchain_session::{SessionConfig, SessionManager};
use wordchain_transport::{FrameConfig, Transport, TransportError, WebSocketTransport};

use crate::WordchainError;
use crate::handler::handle_connection;

/// Shared server state passed to each connection handler task.
///
/// The session manager does its own per-room locking, so the state itself
/// needs no outer lock.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) sessions: SessionManager,
    pub(crate) codec: C,
}

/// Builder for configuring and starting a wordchain server.
///
/// # Example
///
/// ```rust,no_run
/// # async fn start() -> Result<(), wordchain::WordchainError> {
/// use wordchain::WordchainServer;
///
/// let server = WordchainServer::builder()
///     .bind("0.0.0.0:8080")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct WordchainServerBuilder {
    bind_addr: String,
    session_config: SessionConfig,
    frame_config: FrameConfig,
}

impl WordchainServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            session_config: SessionConfig::default(),
            frame_config: FrameConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the session configuration (sweep interval and game rules).
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Sets the upgrade endpoint and inbound frame limits.
    pub fn frame_config(mut self, config: FrameConfig) -> Self {
        self.frame_config = config;
        self
    }

    /// Binds the listener and builds the server.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build(self) -> Result<WordchainServer<JsonCodec>, WordchainError> {
        let transport = WebSocketTransport::bind(&self.bind_addr, self.frame_config).await?;

        let state = Arc::new(ServerState {
            sessions: SessionManager::new(self.session_config),
            codec: JsonCodec,
        });

        Ok(WordchainServer { transport, state })
    }
}

impl Default for WordchainServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound wordchain server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct WordchainServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl WordchainServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> WordchainServerBuilder {
        WordchainServerBuilder::new()
    }
}

impl<C: Codec> WordchainServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    /// Runs the accept loop and the expiry sweep.
    ///
    /// Every upgraded connection gets its own handler task. Returns once
    /// the transport stops producing connections.
    pub async fn run(mut self) -> Result<(), WordchainError> {
        tracing::info!(addr = %self.local_addr(), "wordchain server running");

        let sweeper = tokio::spawn(sweep_loop(Arc::clone(&self.state)));

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(TransportError::Shutdown) => break,
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }

        sweeper.abort();
        tracing::info!("wordchain server stopped");
        Ok(())
    }
}

async fn sweep_loop<C: Codec>(state: Arc<ServerState<C>>) {
    let mut ticker = tokio::time::interval(state.sessions.config().sweep_interval);
    // The first tick completes immediately.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let removed = state.sessions.sweep_expired();
        if removed > 0 {
            tracing::debug!(removed, rooms = state.sessions.room_count(), "expiry sweep");
        }
    }
}
