//! Frame codec: conversion between [`Frame`] values and their wire bytes.
//!
//! The [`Decoder`] parses incoming frames in stages (base header, extended
//! length plus mask key, payload) and returns `Ok(None)` whenever the buffer
//! holds fewer bytes than the frame requires. Paired with
//! [`tokio_util::codec::Framed`], that means a frame split across multiple
//! reads is buffered and retried, never dropped. The [`Encoder`] serializes
//! outgoing frames, masking every one with a fresh random key as RFC 6455
//! requires of clients.

use bytes::{Buf, BytesMut};
use tokio_util::codec;

use crate::{
    frame::{Frame, OpCode, MAX_HEAD_SIZE},
    ClientError,
};

/// The maximum allowed payload size for reading, set to 1 MiB.
///
/// Frames with a payload size larger than this limit will be rejected to
/// ensure memory safety and prevent excessively large messages from
/// impacting performance.
pub const MAX_PAYLOAD_READ: usize = 1024 * 1024;

/// Represents the reading state of a WebSocket frame.
enum ReadState {
    /// Currently reading the header of the frame.
    Header(Header),
    /// Currently reading the payload of the frame.
    Payload(HeaderAndMask),
}

/// Represents the initial header fields of a WebSocket frame.
struct Header {
    /// Indicates if this is the final fragment in a message.
    fin: bool,
    /// Indicates if the frame is masked.
    masked: bool,
    /// The operation code of the frame.
    opcode: OpCode,
    /// Size of the extended length field, if applicable.
    extra: usize,
    /// Encoded length of the payload.
    length_code: u8,
    /// Total size of the remaining header in bytes.
    header_size: usize,
}

/// Contains header and mask data after decoding the bytes before the payload.
struct HeaderAndMask {
    /// Decoded header fields.
    header: Header,
    /// Optional masking key for decoding the payload.
    mask: Option<[u8; 4]>,
    /// Length of the payload, in bytes.
    payload_len: usize,
}

/// A combined codec providing both encoding and decoding of WebSocket frames,
/// for use with Tokio's framed streams.
pub struct Codec {
    decoder: Decoder,
    encoder: Encoder,
}

impl Codec {
    /// Creates a client codec with the given incoming-payload cap.
    pub fn new(max_payload_read: usize) -> Self {
        Self {
            decoder: Decoder::new(max_payload_read),
            encoder: Encoder,
        }
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::new(MAX_PAYLOAD_READ)
    }
}

impl codec::Decoder for Codec {
    type Item = <Decoder as codec::Decoder>::Item;
    type Error = <Decoder as codec::Decoder>::Error;

    #[inline]
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.decoder.decode(src)
    }
}

impl codec::Encoder<Frame> for Codec {
    type Error = <Encoder as codec::Encoder<Frame>>::Error;

    #[inline]
    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.encoder.encode(item, dst)
    }
}

/// A decoder for WebSocket frames, handling state transitions.
///
/// `Decoder` manages frame parsing, tracking the maximum allowed payload size
/// and the current state. The state changes as each part of the frame
/// (header and payload) is processed.
pub struct Decoder {
    /// Current reading state (header or payload).
    state: Option<ReadState>,
    /// Maximum allowed size for the frame payload.
    max_payload_size: usize,
}

impl Decoder {
    /// Creates a new `Decoder` with a specified maximum payload size.
    pub fn new(max_payload_size: usize) -> Self {
        Self {
            state: None,
            max_payload_size,
        }
    }
}

impl codec::Decoder for Decoder {
    type Item = Frame;
    type Error = ClientError;

    /// Decodes WebSocket frames from a `BytesMut` buffer, managing header and
    /// payload parsing.
    ///
    /// Parsing proceeds in stages, with state maintained across calls so a
    /// frame arriving split over several reads is assembled rather than
    /// discarded. RSV bits are ignored: this client never negotiates
    /// extensions, and a lenient read is more useful against loose chat
    /// servers than a protocol failure. Masked server frames are unmasked
    /// on arrival.
    ///
    /// # Returns
    /// - `Ok(Some(Frame))`: a fully decoded frame.
    /// - `Ok(None)`: more data is needed to complete the frame.
    /// - `Err(ClientError::FrameTooLarge)`: the declared payload exceeds
    ///   the configured cap.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.state.take() {
                None => {
                    // Check if enough data is available for the basic header
                    if src.remaining() < 2 {
                        return Ok(None);
                    }

                    // Parse initial header bytes
                    let fin = src[0] & 0b10000000 != 0;
                    let opcode = OpCode::from(src[0] & 0b00001111);
                    let masked = src[1] & 0b10000000 != 0;
                    let length_code = src[1] & 0x7F;

                    // Determine additional header length
                    let extra = match length_code {
                        126 => 2,
                        127 => 8,
                        _ => 0,
                    };
                    let header_size = extra + masked as usize * 4;
                    src.advance(2);

                    self.state = Some(ReadState::Header(Header {
                        fin,
                        masked,
                        opcode,
                        length_code,
                        extra,
                        header_size,
                    }));
                }
                Some(ReadState::Header(header)) => {
                    // Check if enough data is available for the full header
                    if src.remaining() < header.header_size {
                        self.state = Some(ReadState::Header(header));
                        return Ok(None);
                    }

                    // Parse payload length based on the `extra` field size
                    let payload_len: usize = match header.extra {
                        0 => usize::from(header.length_code),
                        2 => src.get_u16() as usize,
                        8 => match usize::try_from(src.get_u64()) {
                            Ok(length) => length,
                            Err(_) => return Err(ClientError::FrameTooLarge(usize::MAX)),
                        },
                        _ => unreachable!(),
                    };

                    // Parse the optional mask key if `masked` is true
                    let mask = if header.masked {
                        Some(src.get_u32().to_be_bytes())
                    } else {
                        None
                    };

                    if payload_len > self.max_payload_size {
                        return Err(ClientError::FrameTooLarge(payload_len));
                    }

                    self.state = Some(ReadState::Payload(HeaderAndMask {
                        header,
                        mask,
                        payload_len,
                    }));
                }
                Some(ReadState::Payload(header_and_mask)) => {
                    // Check if enough data is available for the full payload
                    if src.remaining() < header_and_mask.payload_len {
                        self.state = Some(ReadState::Payload(header_and_mask));
                        return Ok(None);
                    }

                    let header = header_and_mask.header;
                    let mask = header_and_mask.mask;
                    let payload_len = header_and_mask.payload_len;

                    let payload = src.split_to(payload_len);
                    let mut frame = Frame::new(header.fin, header.opcode, mask, payload);
                    // Servers should not mask, but if one does, honor it.
                    frame.unmask();

                    break Ok(Some(frame));
                }
            }
        }
    }
}

/// WebSocket frame encoder serializing [`Frame`] instances into a buffer.
///
/// Every encoded frame is masked: this codec only ever speaks as a client,
/// and RFC 6455 requires client-originated frames to carry a mask key. A
/// frame without a key gets a fresh random one at encode time.
pub struct Encoder;

impl codec::Encoder<Frame> for Encoder {
    type Error = ClientError;

    fn encode(&mut self, mut frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        frame.mask();

        let mut header = [0; MAX_HEAD_SIZE];
        let size = frame.fmt_head(&mut header[..]);

        dst.extend_from_slice(&header[..size]);
        dst.extend_from_slice(&frame.payload);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::codec::{Decoder as _, Encoder as _};

    fn encode_bytes(frame: Frame) -> BytesMut {
        let mut dst = BytesMut::new();
        Encoder.encode(frame, &mut dst).unwrap();
        dst
    }

    fn decode_one(buf: &mut BytesMut) -> Option<Frame> {
        Decoder::new(MAX_PAYLOAD_READ).decode(buf).unwrap()
    }

    #[test]
    fn test_round_trip_text() {
        let mut wire = encode_bytes(Frame::text("round trip"));
        let frame = decode_one(&mut wire).expect("complete frame");

        assert!(frame.fin);
        assert_eq!(frame.opcode, OpCode::Text);
        // Decoder unmasks, so the payload comes back unchanged
        assert_eq!(&frame.payload[..], b"round trip");
        assert!(wire.is_empty());
    }

    #[test]
    fn test_round_trip_length_boundaries() {
        // Each boundary selects a different length-field encoding
        for len in [0usize, 1, 125, 126, 65535, 65536] {
            let payload: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            let mut wire = encode_bytes(Frame::binary(&payload));

            let frame = decode_one(&mut wire).expect("complete frame");
            assert_eq!(frame.payload.len(), len, "length {len}");
            assert_eq!(&frame.payload[..], &payload[..], "length {len}");
        }
    }

    #[test]
    fn test_encoded_frame_is_masked() {
        let wire = encode_bytes(Frame::text("masked"));

        // MASK bit must be set on every client frame
        assert_eq!(wire[1] & 0x80, 0x80);
        // Applying the transmitted key recovers the cleartext
        let mask = [wire[2], wire[3], wire[4], wire[5]];
        let unmasked: Vec<u8> = wire[6..]
            .iter()
            .enumerate()
            .map(|(i, b)| b ^ mask[i % 4])
            .collect();
        assert_eq!(&unmasked[..], b"masked");
    }

    #[test]
    fn test_incomplete_header_returns_none() {
        let mut decoder = Decoder::new(MAX_PAYLOAD_READ);

        let mut buf = BytesMut::from(&[0x81u8][..]);
        assert!(decoder.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_split_frame_is_buffered() {
        // An unmasked server text frame "Hello" delivered one byte at a time
        let wire: &[u8] = &[0x81, 0x05, b'H', b'e', b'l', b'l', b'o'];
        let mut decoder = Decoder::new(MAX_PAYLOAD_READ);
        let mut buf = BytesMut::new();

        for (i, byte) in wire.iter().enumerate() {
            buf.extend_from_slice(&[*byte]);
            let res = decoder.decode(&mut buf).unwrap();
            if i + 1 < wire.len() {
                assert!(res.is_none(), "byte {i} should not complete the frame");
            } else {
                let frame = res.expect("final byte completes the frame");
                assert_eq!(frame.text_lossy(), "Hello");
            }
        }
    }

    #[test]
    fn test_two_frames_in_one_buffer() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0x81, 0x02, b'h', b'i']);
        buf.extend_from_slice(&[0x81, 0x03, b'y', b'o', b'u']);

        let mut decoder = Decoder::new(MAX_PAYLOAD_READ);
        let first = decoder.decode(&mut buf).unwrap().expect("first frame");
        assert_eq!(first.text_lossy(), "hi");

        let second = decoder.decode(&mut buf).unwrap().expect("second frame");
        assert_eq!(second.text_lossy(), "you");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_unsupported_opcode_is_surfaced() {
        // Opcode 0x5 is reserved; it decodes, it does not error
        let mut buf = BytesMut::from(&[0x85u8, 0x01, 0xFF][..]);
        let frame = decode_one(&mut buf).expect("complete frame");
        assert_eq!(frame.opcode, OpCode::Unsupported(0x5));
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut decoder = Decoder::new(16);

        // Declared length 17 exceeds the 16-byte cap
        let mut buf = BytesMut::from(&[0x82u8, 17][..]);
        match decoder.decode(&mut buf) {
            Err(ClientError::FrameTooLarge(len)) => assert_eq!(len, 17),
            other => panic!("expected FrameTooLarge, got {other:?}"),
        }
    }

    #[test]
    fn test_masked_server_frame_unmasked() {
        // A (non-conforming) masked frame from the peer is still readable
        let mask = [0x0Fu8, 0xF0, 0xAA, 0x55];
        let mut payload = *b"ok!";
        for (i, byte) in payload.iter_mut().enumerate() {
            *byte ^= mask[i % 4];
        }

        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0x81, 0x80 | 3]);
        buf.extend_from_slice(&mask);
        buf.extend_from_slice(&payload);

        let frame = decode_one(&mut buf).expect("complete frame");
        assert_eq!(frame.text_lossy(), "ok!");
    }
}
