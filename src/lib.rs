//! # chatwire
//! A minimal WebSocket client engine for chat-style streaming services.
//!
//! `chatwire` implements the client side of a pragmatic RFC 6455 subset: the
//! HTTP/1.1 upgrade handshake, masked frame encoding and staged frame decoding
//! over a raw byte stream, and assembly of a logical response out of one or
//! more frames under timing heuristics. It is aimed at chat endpoints (LLM
//! services in particular) that stream a "typing" liveness token before the
//! substantive answer: the engine filters that noise, caps response length,
//! and degrades gracefully to a partial or empty response when the deadline
//! elapses instead of hanging.
//!
//! What it deliberately does *not* do: ping/pong bookkeeping, close-frame
//! semantics, fragmented-message reassembly, or extension negotiation.
//! Control and unrecognized frames are decoded and skipped. Reconnection
//! policy belongs to the caller; every error surfaces immediately.
//!
//! # Features
//! - `logging`: Enables debug logging for connection negotiation and frame
//!   processing using the `log` crate.
//!
//! # Client Example
//! ```no_run
//! use chatwire::{ClientSession, Endpoint, SessionOptions};
//!
//! async fn ask() -> chatwire::Result<String> {
//!     let endpoint = Endpoint::parse("wss://chat.example.com/api/ws")?;
//!     let options = SessionOptions::default()
//!         .with_typing_indicator("typing")
//!         .with_response_timeout(std::time::Duration::from_secs(20));
//!
//!     let mut session = ClientSession::new(endpoint, options);
//!     session.connect().await?;
//!     let reply = session.send_and_receive("Hello there").await?;
//!     session.close().await;
//!     Ok(reply)
//! }
//! ```
//!
//! # Memory Safety
//! - Incoming frame payloads are capped (configurable, default 1 MiB)
//! - Split frames are buffered and retried, never dropped
//! - Text payloads are decoded as lossy UTF-8 and never panic

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod assembler;
pub mod auth;
pub mod codec;
pub mod endpoint;
pub mod frame;
mod handshake;
mod mask;
pub mod session;
mod stream;

pub use assembler::{AssemblerState, Assembly, ResponseAssembler};
pub use auth::AuthScheme;
pub use endpoint::Endpoint;
pub use frame::{Frame, OpCode};
pub use session::{ClientSession, SessionOptions};
pub use stream::MaybeTlsStream;

use thiserror::Error;

/// A result type for client operations, using `ClientError` as the error type.
///
/// This type alias simplifies function signatures within the crate by providing
/// a standard result type for operations that may return a `ClientError`.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Represents errors that can occur while talking to a chat endpoint.
///
/// The variants map onto the stages of a request cycle: establishing the
/// transport, negotiating the upgrade, framing bytes on the wire, and waiting
/// for the peer. Response-deadline expiry inside a request is *not* an error;
/// the session degrades to a partial or empty response instead (see
/// [`ClientSession::send_and_receive`](session::ClientSession::send_and_receive)).
#[derive(Error, Debug)]
pub enum ClientError {
    /// The TCP or TLS connection could not be established.
    #[error("connection failed: {0}")]
    Connection(#[source] std::io::Error),

    /// The connection attempt did not complete within the configured
    /// connect timeout.
    #[error("connection timed out")]
    ConnectTimeout,

    /// The server answered the upgrade request with something other than
    /// `101 Switching Protocols`. Carries a truncated snippet of the raw
    /// response for diagnostics.
    #[error("handshake rejected: {snippet:?}")]
    Handshake {
        /// First bytes of the server response, lossily decoded and truncated.
        snippet: String,
    },

    /// The server closed the stream, or sent no bytes, before the handshake
    /// response was complete.
    #[error("connection closed during handshake")]
    HandshakeClosed,

    /// A received frame declared a payload larger than the configured cap.
    #[error("frame of {0} bytes exceeds the payload limit")]
    FrameTooLarge(usize),

    /// The peer closed the connection mid-read with no usable response.
    #[error("connection closed by peer")]
    TransportClosed,

    /// The URL scheme is not `ws` or `wss`.
    #[error("invalid url scheme {0:?}, expected ws or wss")]
    InvalidScheme(String),

    /// The URL has no usable host.
    #[error("url has no host")]
    MissingHost,

    /// The URL names port 0, which is not addressable.
    #[error("port 0 is not addressable")]
    InvalidPort,

    /// The hostname is not a valid DNS name for TLS (`wss` endpoints only).
    #[error("invalid dns name for tls: {0:?}")]
    InvalidDnsName(String),

    /// Wraps errors from URL parsing.
    #[error(transparent)]
    UrlParseError(#[from] url::ParseError),

    /// Wraps standard I/O errors that occur on an established connection,
    /// such as connection resets.
    #[error(transparent)]
    IoError(#[from] std::io::Error),
}
