//! Frame codec: the binary layer that carries text messages after the
//! upgrade handshake.
//!
//! Inbound frames are decoded incrementally. The socket may hand us half a
//! frame, or five frames at once, so [`FrameDecoder`] owns a buffer that
//! survives across reads and only yields a [`Frame`] once every byte of it
//! (header, extended length, mask key, payload) has arrived.
//!
//! ```text
//!  byte 0          byte 1          (2 or 8 bytes)   (4 bytes)   payload
//! ┌─┬───┬───────┐ ┌─┬───────────┐ ┌──────────────┐ ┌─────────┐ ┌───────
//! │F│RSV│opcode │ │M│ len code  │ │ extended len │ │ mask key│ │ ...
//! └─┴───┴───────┘ └─┴───────────┘ └──────────────┘ └─────────┘ └───────
//! ```
//!
//! Outbound frames are always single, unmasked text frames.

use crate::TransportError;

/// Opcode for a text frame.
pub const OPCODE_TEXT: u8 = 0x1;

/// Opcode for a close frame.
pub const OPCODE_CLOSE: u8 = 0x8;

/// A minimal close frame: FIN + close opcode, empty payload.
pub const CLOSE_FRAME: [u8; 2] = [0x88, 0x00];

/// Largest length a 64-bit length field may declare (2^53 − 1).
pub const MAX_SAFE_LENGTH: u64 = (1 << 53) - 1;

/// Default cap on a single inbound payload.
pub const DEFAULT_MAX_PAYLOAD: usize = 1024 * 1024;

/// A fully received inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A complete text message.
    Text(String),
    /// The peer asked to close the channel.
    Close,
}

/// Incremental decoder for inbound frames.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    max_payload: usize,
    closed: bool,
}

impl FrameDecoder {
    /// Creates a decoder that rejects payloads larger than `max_payload`.
    pub fn new(max_payload: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_payload,
            closed: false,
        }
    }

    /// Appends bytes read from the stream.
    ///
    /// Bytes arriving after a close frame are dropped.
    pub fn extend(&mut self, data: &[u8]) {
        if !self.closed {
            self.buf.extend_from_slice(data);
        }
    }

    /// Number of bytes waiting for a complete frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Tries to pull the next complete frame out of the buffer.
    ///
    /// Returns `Ok(None)` when more bytes are needed. After a
    /// [`Frame::Close`] the buffer is discarded and every later call
    /// returns `Ok(None)`.
    ///
    /// # Errors
    /// [`TransportError::Protocol`] for an unsupported opcode, a length
    /// beyond [`MAX_SAFE_LENGTH`] or the configured cap, or a text
    /// payload that is not UTF-8.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, TransportError> {
        if self.closed || self.buf.len() < 2 {
            return Ok(None);
        }

        let opcode = self.buf[0] & 0x0f;
        let masked = self.buf[1] & 0x80 != 0;
        let code = self.buf[1] & 0x7f;

        let (len, mut offset) = match code {
            126 => {
                if self.buf.len() < 4 {
                    return Ok(None);
                }
                (u64::from(u16::from_be_bytes([self.buf[2], self.buf[3]])), 4)
            }
            127 => {
                if self.buf.len() < 10 {
                    return Ok(None);
                }
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&self.buf[2..10]);
                let n = u64::from_be_bytes(raw);
                if n > MAX_SAFE_LENGTH {
                    return Err(TransportError::Protocol(format!(
                        "frame length {n} exceeds safe integer range"
                    )));
                }
                (n, 10)
            }
            n => (u64::from(n), 2),
        };

        let len = usize::try_from(len)
            .ok()
            .filter(|len| *len <= self.max_payload)
            .ok_or_else(|| {
                TransportError::Protocol(format!(
                    "frame length {len} exceeds limit of {} bytes",
                    self.max_payload
                ))
            })?;

        let mask_len = if masked { 4 } else { 0 };
        if self.buf.len() < offset + mask_len + len {
            return Ok(None);
        }

        let mut mask = [0u8; 4];
        if masked {
            mask.copy_from_slice(&self.buf[offset..offset + 4]);
            offset += 4;
        }

        let mut payload: Vec<u8> = self.buf[offset..offset + len].to_vec();
        if masked {
            for (i, byte) in payload.iter_mut().enumerate() {
                *byte ^= mask[i % 4];
            }
        }
        self.buf.drain(..offset + len);

        match opcode {
            OPCODE_TEXT => {
                let text = String::from_utf8(payload).map_err(|_| {
                    TransportError::Protocol("text frame is not valid UTF-8".into())
                })?;
                Ok(Some(Frame::Text(text)))
            }
            OPCODE_CLOSE => {
                self.closed = true;
                self.buf.clear();
                Ok(Some(Frame::Close))
            }
            other => Err(TransportError::Protocol(format!(
                "unsupported opcode {other:#x}"
            ))),
        }
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAYLOAD)
    }
}

/// Encodes `payload` as one unmasked text frame with FIN set.
pub fn encode_text(payload: &str) -> Vec<u8> {
    let bytes = payload.as_bytes();
    let len = bytes.len();
    let mut out = Vec::with_capacity(len + 10);
    out.push(0x80 | OPCODE_TEXT);
    if len < 126 {
        out.push(len as u8);
    } else if len < 65_536 {
        out.push(126);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        out.push(127);
        out.extend_from_slice(&(len as u64).to_be_bytes());
    }
    out.extend_from_slice(bytes);
    out
}
