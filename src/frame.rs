//! # Frame
//!
//! WebSocket frames as defined in [RFC 6455 Section 5.2](https://datatracker.ietf.org/doc/html/rfc6455#section-5.2).
//! Each frame is one atomic unit of the wire protocol, carrying the payload
//! plus protocol-level metadata.
//!
//! ### Frame Binary Format
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |         (16 or 64 bits)       |
//! |N|V|V|V|       |S|             |                               |
//! | |1|2|3|       |K|             |                               |
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |        Extended payload length continued, if payload len == 127|
//! +---------------------------------------------------------------+
//! |                               |   Masking-key, if MASK set to 1|
//! +-------------------------------+-------------------------------+
//! |     Masking-key (continued)       |          Payload Data      |
//! +-----------------------------------+ - - - - - - - - - - - - - -+
//! ```
//!
//! This crate is a pure client: outgoing frames are always masked and always
//! final (no fragmentation), while incoming frames are expected unmasked.
//! Unrecognized opcode nibbles are preserved as [`OpCode::Unsupported`] so
//! readers can skip frames they do not understand instead of failing.

use std::borrow::Cow;

use bytes::BytesMut;

/// WebSocket operation code identifying the semantic meaning of a frame.
///
/// The numeric values are defined in [RFC 6455, Section 11.8](https://datatracker.ietf.org/doc/html/rfc6455#section-11.8):
/// - Continuation = 0x0
/// - Text = 0x1
/// - Binary = 0x2
/// - Close = 0x8
/// - Ping = 0x9
/// - Pong = 0xA
///
/// The reserved ranges 0x3-0x7 and 0xB-0xF map to [`OpCode::Unsupported`]
/// rather than a parse error; a chat client has no use for them beyond
/// skipping the frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OpCode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
    /// An opcode nibble outside the set RFC 6455 defines.
    Unsupported(u8),
}

impl OpCode {
    /// Returns `true` if the `OpCode` represents a control frame
    /// (`Close`, `Ping`, or `Pong`).
    pub fn is_control(&self) -> bool {
        matches!(*self, OpCode::Close | OpCode::Ping | OpCode::Pong)
    }

    /// Returns `true` for the data opcodes a response can be built from.
    pub fn is_data(&self) -> bool {
        matches!(*self, OpCode::Text | OpCode::Binary)
    }
}

impl From<u8> for OpCode {
    /// Interprets the opcode nibble from a frame header. Unknown values land
    /// in `Unsupported` so decoding never fails on them.
    fn from(value: u8) -> Self {
        match value {
            0x0 => Self::Continuation,
            0x1 => Self::Text,
            0x2 => Self::Binary,
            0x8 => Self::Close,
            0x9 => Self::Ping,
            0xA => Self::Pong,
            other => Self::Unsupported(other),
        }
    }
}

impl From<OpCode> for u8 {
    /// Converts an `OpCode` into its corresponding byte representation.
    fn from(val: OpCode) -> Self {
        match val {
            OpCode::Continuation => 0x0,
            OpCode::Text => 0x1,
            OpCode::Binary => 0x2,
            OpCode::Close => 0x8,
            OpCode::Ping => 0x9,
            OpCode::Pong => 0xA,
            OpCode::Unsupported(other) => other,
        }
    }
}

/// Largest possible frame header: 2 base bytes, 8 extended-length bytes,
/// 4 mask-key bytes.
pub(crate) const MAX_HEAD_SIZE: usize = 14;

/// A WebSocket frame: header metadata plus payload.
///
/// # Fields
/// - `fin`: Final fragment flag. Always `true` for frames this client sends.
/// - `opcode`: Defines the frame type (text, binary, control, unsupported).
/// - `mask`: Optional 32-bit XOR masking key; mandatory on the wire for
///   client-originated frames.
/// - `payload`: Frame payload data.
#[derive(Debug)]
pub struct Frame {
    /// Indicates if this is the final frame in a message.
    pub fin: bool,
    /// The opcode of the frame, defining its type.
    pub opcode: OpCode,
    /// The masking key for the frame, if any.
    mask: Option<[u8; 4]>,
    /// The payload of the frame, containing the actual data.
    pub payload: BytesMut,
}

impl Frame {
    /// Creates a new WebSocket `Frame`.
    ///
    /// # Parameters
    /// - `fin`: Indicates if this frame is the final fragment in a message.
    /// - `opcode`: The operation code of the frame.
    /// - `mask`: Optional 4-byte masking key for client-to-server frames.
    /// - `payload`: The frame payload data.
    pub fn new(
        fin: bool,
        opcode: OpCode,
        mask: Option<[u8; 4]>,
        payload: impl Into<BytesMut>,
    ) -> Self {
        Self {
            fin,
            opcode,
            mask,
            payload: payload.into(),
        }
    }

    /// Creates a final text frame. The mask key is generated when the frame
    /// is encoded for the wire.
    pub fn text(payload: impl AsRef<[u8]>) -> Self {
        Self::new(true, OpCode::Text, None, BytesMut::from(payload.as_ref()))
    }

    /// Creates a final binary frame.
    pub fn binary(payload: impl AsRef<[u8]>) -> Self {
        Self::new(true, OpCode::Binary, None, BytesMut::from(payload.as_ref()))
    }

    /// Decodes the payload as UTF-8 text, replacing invalid sequences with
    /// U+FFFD. Never fails; chat services occasionally emit broken encodings
    /// and a replacement character beats losing the whole response.
    pub fn text_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }

    /// Returns whether the frame carries a masking key.
    #[inline(always)]
    pub(crate) fn is_masked(&self) -> bool {
        self.mask.is_some()
    }

    /// Masks the payload using a masking key.
    ///
    /// If no masking key is set, a fresh random key is generated and applied.
    /// Uniqueness per frame is all the protocol asks of the key; it has no
    /// security value.
    pub(crate) fn mask(&mut self) {
        let payload = &mut self.payload;
        if let Some(mask) = self.mask {
            crate::mask::apply_mask(payload, mask);
        } else {
            let mask: [u8; 4] = rand::random();
            crate::mask::apply_mask(payload, mask);
            self.mask = Some(mask);
        }
    }

    /// Unmasks the payload, reversing any masking applied with the stored key.
    pub(crate) fn unmask(&mut self) {
        if let Some(mask) = self.mask.take() {
            let payload = &mut self.payload;
            crate::mask::apply_mask(payload, mask);
        }
    }

    /// Formats the frame header into `head` and returns its size in bytes.
    ///
    /// The payload length field uses the threshold encoding: lengths below
    /// 126 inline, below 65536 a 16-bit extension, otherwise a 64-bit
    /// extension.
    ///
    /// # Panics
    /// Panics if `head` is smaller than [`MAX_HEAD_SIZE`].
    pub(crate) fn fmt_head(&self, head: &mut [u8]) -> usize {
        head[0] = (self.fin as u8) << 7 | u8::from(self.opcode);

        let len = self.payload.len();
        let size = if len < 126 {
            head[1] = len as u8;
            2
        } else if len < 65536 {
            head[1] = 126;
            head[2..4].copy_from_slice(&(len as u16).to_be_bytes());
            4
        } else {
            head[1] = 127;
            head[2..10].copy_from_slice(&(len as u64).to_be_bytes());
            10
        };

        if let Some(mask) = self.mask {
            head[1] |= 0x80;
            head[size..size + 4].copy_from_slice(&mask);
            size + 4
        } else {
            size
        }
    }
}
