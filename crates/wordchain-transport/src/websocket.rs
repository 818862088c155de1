//! WebSocket transport built directly on Tokio streams.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use crate::frame::{self, CLOSE_FRAME, DEFAULT_MAX_PAYLOAD, Frame, FrameDecoder};
use crate::{Connection, ConnectionId, Transport, TransportError, handshake};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Upgraded connections waiting for [`Transport::accept`].
const ACCEPT_QUEUE: usize = 64;

/// Settings for the upgrade handshake and inbound framing.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Request path that may be upgraded. Anything else gets a 404.
    pub endpoint: String,

    /// Largest inbound payload accepted, in bytes.
    pub max_payload: usize,

    /// How long a client has to finish the upgrade request.
    pub handshake_timeout: Duration,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            endpoint: "/ws".to_string(),
            max_payload: DEFAULT_MAX_PAYLOAD,
            handshake_timeout: Duration::from_secs(5),
        }
    }
}

/// A WebSocket [`Transport`] that listens for incoming TCP connections.
///
/// Each accepted stream is upgraded on its own task, so one slow client
/// cannot hold up the others. Finished upgrades are queued for
/// [`accept`](Transport::accept).
pub struct WebSocketTransport {
    local_addr: SocketAddr,
    incoming: mpsc::Receiver<WebSocketConnection>,
    acceptor: JoinHandle<()>,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    pub async fn bind(addr: &str, config: FrameConfig) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        let local_addr = listener
            .local_addr()
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(%local_addr, endpoint = %config.endpoint, "WebSocket transport listening");

        let (tx, rx) = mpsc::channel(ACCEPT_QUEUE);
        let acceptor = tokio::spawn(accept_loop(listener, Arc::new(config), tx));

        Ok(Self {
            local_addr,
            incoming: rx,
            acceptor,
        })
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        self.incoming.recv().await.ok_or(TransportError::Shutdown)
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        self.acceptor.abort();
        Ok(())
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.acceptor.abort();
    }
}

async fn accept_loop(
    listener: TcpListener,
    config: Arc<FrameConfig>,
    tx: mpsc::Sender<WebSocketConnection>,
) {
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!(error = %e, "accept failed");
                tokio::time::sleep(Duration::from_millis(50)).await;
                continue;
            }
        };
        if tx.is_closed() {
            break;
        }

        let tx = tx.clone();
        let config = Arc::clone(&config);
        tokio::spawn(async move {
            let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
            let upgrade = WebSocketConnection::upgrade(stream, id, &config);
            match tokio::time::timeout(config.handshake_timeout, upgrade).await {
                Ok(Ok(conn)) => {
                    tracing::debug!(%id, %addr, "accepted WebSocket connection");
                    let _ = tx.send(conn).await;
                }
                Ok(Err(e)) => tracing::debug!(%addr, error = %e, "upgrade failed"),
                Err(_) => tracing::debug!(%addr, "upgrade timed out"),
            }
        });
    }
}

struct Reader<S> {
    half: ReadHalf<S>,
    decoder: FrameDecoder,
}

/// A single upgraded connection.
///
/// Reads and writes go through separate halves, so a task blocked in
/// [`recv`](Connection::recv) never delays a broadcast being written.
pub struct WebSocketConnection<S = TcpStream> {
    id: ConnectionId,
    reader: Mutex<Reader<S>>,
    writer: Mutex<WriteHalf<S>>,
    closed: AtomicBool,
}

impl<S> WebSocketConnection<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    /// Performs the server handshake on `stream` and wraps it.
    ///
    /// # Errors
    /// Any [`TransportError`] from [`handshake::server_handshake`].
    pub async fn upgrade(
        mut stream: S,
        id: ConnectionId,
        config: &FrameConfig,
    ) -> Result<Self, TransportError> {
        let leftover = handshake::server_handshake(&mut stream, &config.endpoint).await?;

        let mut decoder = FrameDecoder::new(config.max_payload);
        decoder.extend(&leftover);
        let (read, write) = tokio::io::split(stream);

        Ok(Self {
            id,
            reader: Mutex::new(Reader {
                half: read,
                decoder,
            }),
            writer: Mutex::new(write),
            closed: AtomicBool::new(false),
        })
    }
}

impl<S> Connection for WebSocketConnection<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    type Error = TransportError;

    async fn send(&self, text: &str) -> Result<(), Self::Error> {
        if self.is_closed() {
            return Err(TransportError::ConnectionClosed("send after close".into()));
        }
        let bytes = frame::encode_text(text);
        let mut writer = self.writer.lock().await;
        writer.write_all(&bytes).await.map_err(|e| {
            self.closed.store(true, Ordering::Release);
            TransportError::SendFailed(e)
        })
    }

    async fn recv(&self) -> Result<Option<String>, Self::Error> {
        let mut reader = self.reader.lock().await;
        loop {
            if self.is_closed() {
                return Ok(None);
            }
            match reader.decoder.next_frame() {
                Ok(Some(Frame::Text(text))) => return Ok(Some(text)),
                Ok(Some(Frame::Close)) => {
                    tracing::debug!(id = %self.id, "peer sent close frame");
                    let _ = self.close().await;
                    return Ok(None);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(id = %self.id, error = %e, "closing on framing error");
                    let _ = self.close().await;
                    return Err(e);
                }
            }

            let mut chunk = [0u8; 4096];
            let n = reader.half.read(&mut chunk).await.map_err(|e| {
                self.closed.store(true, Ordering::Release);
                TransportError::ReceiveFailed(e)
            })?;
            if n == 0 {
                self.closed.store(true, Ordering::Release);
                return Ok(None);
            }
            reader.decoder.extend(&chunk[..n]);
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let mut writer = self.writer.lock().await;
        writer
            .write_all(&CLOSE_FRAME)
            .await
            .map_err(TransportError::SendFailed)?;
        writer.shutdown().await.map_err(TransportError::SendFailed)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
