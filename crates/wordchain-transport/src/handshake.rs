//! Server side of the HTTP upgrade handshake.
//!
//! The client opens with a plain HTTP/1.1 request. If it targets the game
//! endpoint and carries a `Sec-WebSocket-Key`, we answer `101 Switching
//! Protocols` with the derived accept token and the stream switches to
//! binary framing. Anything else gets an error status and the stream is
//! dropped.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use sha1::{Digest, Sha1};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::TransportError;

/// Fixed GUID appended to the client key before hashing.
pub const WEBSOCKET_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Upper bound on the request head. Larger heads are rejected.
pub const MAX_HEAD_BYTES: usize = 8 * 1024;

/// The parts of an upgrade request this server cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeRequest {
    /// Request path with any query string removed.
    pub path: String,
    /// Value of the `Sec-WebSocket-Key` header, if present.
    pub key: Option<String>,
}

/// Computes `base64(SHA-1(key ‖ GUID))`.
pub fn accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WEBSOCKET_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Parses the request line and headers of an HTTP request head.
///
/// `head` is everything before the blank line. Header names are matched
/// case-insensitively.
///
/// # Errors
/// [`TransportError::Handshake`] if the head is not UTF-8 or has no
/// request line.
pub fn parse_request_head(head: &[u8]) -> Result<UpgradeRequest, TransportError> {
    let text = std::str::from_utf8(head).map_err(|_| bad_request("request head is not UTF-8"))?;
    let mut lines = text.split("\r\n");

    let request_line = lines
        .next()
        .filter(|line| !line.is_empty())
        .ok_or_else(|| bad_request("missing request line"))?;
    let mut parts = request_line.split_whitespace();
    let _method = parts.next();
    let target = parts
        .next()
        .ok_or_else(|| bad_request("missing request target"))?;
    let path = target.split('?').next().unwrap_or(target).to_string();

    let key = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("sec-websocket-key"))
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty());

    Ok(UpgradeRequest { path, key })
}

/// Runs the server half of the handshake on `stream`.
///
/// On success returns any bytes the client sent after the request head;
/// they already belong to the framing layer.
///
/// # Errors
/// - [`TransportError::Handshake`]: wrong path (404), missing key (400),
///   oversized or malformed head (400). The status line has already been
///   written back.
/// - [`TransportError::ReceiveFailed`] / [`TransportError::SendFailed`]:
///   socket I/O failed.
/// - [`TransportError::ConnectionClosed`]: the peer hung up mid-request.
pub async fn server_handshake<S>(
    stream: &mut S,
    endpoint: &str,
) -> Result<Vec<u8>, TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = Vec::with_capacity(1024);
    let head_end = loop {
        if let Some(pos) = find_head_end(&buf) {
            break pos;
        }
        if buf.len() > MAX_HEAD_BYTES {
            return reject(stream, "400 Bad Request", "request head too large").await;
        }
        let mut chunk = [0u8; 1024];
        let n = stream
            .read(&mut chunk)
            .await
            .map_err(TransportError::ReceiveFailed)?;
        if n == 0 {
            return Err(TransportError::ConnectionClosed(
                "peer closed during handshake".into(),
            ));
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let request = match parse_request_head(&buf[..head_end]) {
        Ok(request) => request,
        Err(_) => return reject(stream, "400 Bad Request", "malformed request head").await,
    };

    if request.path != endpoint {
        return reject(
            stream,
            "404 Not Found",
            &format!("no upgrade endpoint at {}", request.path),
        )
        .await;
    }
    let Some(key) = request.key else {
        return reject(stream, "400 Bad Request", "missing Sec-WebSocket-Key").await;
    };

    let response = format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {}\r\n\
         \r\n",
        accept_key(&key)
    );
    stream
        .write_all(response.as_bytes())
        .await
        .map_err(TransportError::SendFailed)?;

    Ok(buf.split_off(head_end + 4))
}

/// Position of the `\r\n\r\n` that ends the head, if it has arrived.
fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

async fn reject<S, T>(
    stream: &mut S,
    status: &'static str,
    reason: &str,
) -> Result<T, TransportError>
where
    S: AsyncWrite + Unpin,
{
    let response = format!("HTTP/1.1 {status}\r\n\r\n");
    // The stream is dropped right after, so a failed write changes nothing.
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
    tracing::debug!(status, reason, "upgrade rejected");
    Err(TransportError::Handshake {
        status,
        reason: reason.to_string(),
    })
}

fn bad_request(reason: &str) -> TransportError {
    TransportError::Handshake {
        status: "400 Bad Request",
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_key_matches_published_example() {
        // Sample nonce and accept value from RFC 6455 §1.3.
        assert_eq!(
            accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }

    #[test]
    fn test_parse_request_head_extracts_path_and_key() {
        let head = b"GET /ws?v=2 HTTP/1.1\r\nHost: localhost\r\nsec-websocket-key:  abc== \r\nUpgrade: websocket";
        let req = parse_request_head(head).unwrap();

        assert_eq!(req.path, "/ws");
        assert_eq!(req.key.as_deref(), Some("abc=="));
    }

    #[test]
    fn test_parse_request_head_without_key() {
        let req = parse_request_head(b"GET /ws HTTP/1.1\r\nHost: x").unwrap();
        assert_eq!(req.key, None);
    }

    #[test]
    fn test_parse_request_head_empty_is_error() {
        assert!(parse_request_head(b"").is_err());
    }

    #[tokio::test]
    async fn test_server_handshake_switches_protocols_and_keeps_leftover() {
        let (mut client, mut server) = tokio::io::duplex(4096);

        client
            .write_all(
                b"GET /ws HTTP/1.1\r\nHost: a\r\nSec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n\x81\x00",
            )
            .await
            .unwrap();

        let leftover = server_handshake(&mut server, "/ws").await.unwrap();
        assert_eq!(leftover, vec![0x81, 0x00]);

        let mut response = vec![0u8; 256];
        let n = client.read(&mut response).await.unwrap();
        let response = String::from_utf8_lossy(&response[..n]);
        assert!(response.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
        assert!(response.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n"));
    }

    #[tokio::test]
    async fn test_server_handshake_wrong_path_is_404() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        client
            .write_all(b"GET /index.html HTTP/1.1\r\nSec-WebSocket-Key: k\r\n\r\n")
            .await
            .unwrap();

        let result = server_handshake(&mut server, "/ws").await;
        assert!(matches!(
            result,
            Err(TransportError::Handshake { status: "404 Not Found", .. })
        ));

        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        assert!(response.starts_with(b"HTTP/1.1 404 Not Found"));
    }

    #[tokio::test]
    async fn test_server_handshake_missing_key_is_400() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        client
            .write_all(b"GET /ws HTTP/1.1\r\nHost: a\r\n\r\n")
            .await
            .unwrap();

        let result = server_handshake(&mut server, "/ws").await;
        assert!(matches!(
            result,
            Err(TransportError::Handshake { status: "400 Bad Request", .. })
        ));
    }

    #[tokio::test]
    async fn test_server_handshake_request_split_across_writes() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        let task = tokio::spawn(async move {
            server_handshake(&mut server, "/ws").await
        });

        client.write_all(b"GET /ws HTTP/1.1\r\nSec-Web").await.unwrap();
        tokio::task::yield_now().await;
        client.write_all(b"Socket-Key: abc\r\n\r").await.unwrap();
        tokio::task::yield_now().await;
        client.write_all(b"\n").await.unwrap();

        let leftover = task.await.unwrap().unwrap();
        assert!(leftover.is_empty());
    }
}
