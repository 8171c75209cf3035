//! Client session: connection lifecycle plus the send/receive cycle.
//!
//! A [`ClientSession`] owns at most one live connection and drives one
//! request at a time: the message is fully sent and its response fully
//! assembled (or timed out) before the next request may begin. Sessions are
//! not reentrant; callers that need concurrent requests use independent
//! sessions, each with its own handshake.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, Instant};
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::TlsConnector;
use tokio_util::codec::{Framed, FramedParts};

use crate::{
    assembler::{Assembly, ResponseAssembler},
    auth::AuthScheme,
    codec::{Codec, MAX_PAYLOAD_READ},
    endpoint::Endpoint,
    frame::Frame,
    handshake,
    stream::{tls_connector, MaybeTlsStream},
    ClientError, Result,
};

/// Upper bound on a single read wait. Bounding each read keeps the deadline
/// check responsive and puts a lid on how long a quiet gap after partial
/// content is allowed to last.
const POLL_READ: Duration = Duration::from_secs(2);

/// Configuration for a [`ClientSession`].
///
/// The defaults suit interactive chat endpoints: wait up to 20 seconds for a
/// response, treat any payload containing `"typing"` as liveness noise, and
/// hold out for the post-typing answer.
#[derive(Clone)]
pub struct SessionOptions {
    /// Time allowed for TCP connect, TLS setup, and the upgrade handshake
    /// combined.
    pub connect_timeout: Duration,

    /// Deadline for assembling one logical response.
    pub response_timeout: Duration,

    /// Accumulated response length beyond which assembly completes.
    pub max_response_length: usize,

    /// Maximum allowed payload size for a single incoming frame, in bytes.
    pub max_payload_read: usize,

    /// Payloads containing any of these substrings are typing-indicator
    /// noise: absorbed, never part of the response.
    pub typing_indicators: Vec<String>,

    /// When `true`, wait for typing to end and return the next substantive
    /// payload. When `false`, the first non-empty payload is the response.
    pub respond_after_typing: bool,

    /// How the `Authorization` header is built, if at all.
    pub auth: AuthScheme,

    /// Extra headers sent verbatim with the upgrade request.
    pub headers: Vec<(String, String)>,

    /// Custom TLS connector for `wss` endpoints; defaults to the webpki
    /// root store. Useful for endpoints behind a private CA.
    pub connector: Option<TlsConnector>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            response_timeout: Duration::from_secs(20),
            max_response_length: 10_000,
            max_payload_read: MAX_PAYLOAD_READ,
            typing_indicators: vec!["typing".to_owned()],
            respond_after_typing: true,
            auth: AuthScheme::None,
            headers: Vec::new(),
            connector: None,
        }
    }
}

impl SessionOptions {
    /// Sets the combined connect/handshake timeout.
    pub fn with_connect_timeout(self, connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            ..self
        }
    }

    /// Sets the per-request response deadline.
    pub fn with_response_timeout(self, response_timeout: Duration) -> Self {
        Self {
            response_timeout,
            ..self
        }
    }

    /// Sets the accumulated-response length cap.
    pub fn with_max_response_length(self, max_response_length: usize) -> Self {
        Self {
            max_response_length,
            ..self
        }
    }

    /// Sets the maximum allowed payload size for incoming frames.
    pub fn with_max_payload_read(self, size: usize) -> Self {
        Self {
            max_payload_read: size,
            ..self
        }
    }

    /// Replaces the typing-indicator token list with a single token.
    pub fn with_typing_indicator(self, indicator: impl Into<String>) -> Self {
        Self {
            typing_indicators: vec![indicator.into()],
            ..self
        }
    }

    /// Replaces the typing-indicator token list.
    pub fn with_typing_indicators(self, indicators: Vec<String>) -> Self {
        Self {
            typing_indicators: indicators,
            ..self
        }
    }

    /// Returns the first non-empty payload immediately instead of waiting
    /// on typing semantics.
    pub fn respond_immediately(self) -> Self {
        Self {
            respond_after_typing: false,
            ..self
        }
    }

    /// Sets the authentication scheme for the handshake.
    pub fn with_auth(self, auth: AuthScheme) -> Self {
        Self { auth, ..self }
    }

    /// Appends a custom header to the upgrade request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets a custom TLS connector for `wss` endpoints.
    pub fn with_connector(self, connector: TlsConnector) -> Self {
        Self {
            connector: Some(connector),
            ..self
        }
    }
}

/// How one exchange concluded.
enum Exchange {
    /// The assembler decided the response was complete.
    Complete(String),
    /// The deadline elapsed or the peer went quiet; the text is whatever
    /// was collected, possibly empty. The connection is in an ambiguous
    /// protocol state and must not be reused.
    Degraded(String),
}

/// A WebSocket client session holding at most one live connection.
///
/// The connection is established by [`connect`](Self::connect) or lazily by
/// the explicit reconnect step inside
/// [`send_and_receive`](Self::send_and_receive). Any transport or protocol
/// error, and any deadline expiry, discards the connection so the next call
/// starts from a clean handshake; partial frames cannot be safely
/// resynchronized.
pub struct ClientSession {
    endpoint: Endpoint,
    options: SessionOptions,
    conn: Option<Framed<MaybeTlsStream, Codec>>,
}

impl ClientSession {
    /// Creates a session for the endpoint. No I/O happens until
    /// [`connect`](Self::connect) or [`send_and_receive`](Self::send_and_receive).
    pub fn new(endpoint: Endpoint, options: SessionOptions) -> Self {
        Self {
            endpoint,
            options,
            conn: None,
        }
    }

    /// Whether a connection is currently open.
    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Establishes the connection and performs the upgrade handshake.
    ///
    /// A no-op when a connection is already open. Does not retry: transport
    /// and handshake failures propagate to the caller, and a failed attempt
    /// leaves no open connection behind.
    pub async fn connect(&mut self) -> Result<()> {
        self.ensure_connected().await?;
        Ok(())
    }

    /// Sends `message` as a text frame and assembles the logical response.
    ///
    /// Returns the response text; an empty string means the deadline elapsed
    /// with nothing usable received (a soft failure, not an error). Any
    /// transport-level error discards the connection and propagates, so the
    /// next call re-establishes it.
    pub async fn send_and_receive(&mut self, message: &str) -> Result<String> {
        self.ensure_connected().await?;

        match self.exchange(message).await {
            Ok(Exchange::Complete(text)) => Ok(text),
            Ok(Exchange::Degraded(text)) => {
                self.conn = None;
                Ok(text)
            }
            Err(err) => {
                self.conn = None;
                Err(err)
            }
        }
    }

    /// Closes the underlying stream if open. Safe to call repeatedly; never
    /// errors.
    pub async fn close(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            let _ = futures::SinkExt::<Frame>::close(&mut conn).await;
        }
    }

    /// The explicit reconnect step: opens the connection when none is live.
    async fn ensure_connected(&mut self) -> Result<&mut Framed<MaybeTlsStream, Codec>> {
        if self.conn.is_none() {
            let conn = match timeout(self.options.connect_timeout, self.open()).await {
                Ok(conn) => conn?,
                Err(_) => return Err(ClientError::ConnectTimeout),
            };

            #[cfg(feature = "logging")]
            log::debug!("connected to {}", self.endpoint.address());

            self.conn = Some(conn);
        }

        let Some(conn) = self.conn.as_mut() else {
            unreachable!()
        };
        Ok(conn)
    }

    /// Dials the endpoint, wraps TLS when required, and negotiates the
    /// upgrade. Residual bytes read past the handshake seed the frame
    /// decoder.
    async fn open(&self) -> Result<Framed<MaybeTlsStream, Codec>> {
        let tcp_stream = TcpStream::connect(self.endpoint.address())
            .await
            .map_err(ClientError::Connection)?;
        let _ = tcp_stream.set_nodelay(true);

        let mut stream = if self.endpoint.secure {
            let connector = self
                .options
                .connector
                .clone()
                .unwrap_or_else(tls_connector);
            let domain = ServerName::try_from(self.endpoint.host.clone())
                .map_err(|_| ClientError::InvalidDnsName(self.endpoint.host.clone()))?;

            let tls = connector
                .connect(domain, tcp_stream)
                .await
                .map_err(ClientError::Connection)?;
            MaybeTlsStream::Tls(Box::new(tls))
        } else {
            MaybeTlsStream::Plain(tcp_stream)
        };

        let residual =
            handshake::negotiate(&mut stream, &self.endpoint, &self.handshake_headers()).await?;

        let codec = Codec::new(self.options.max_payload_read);
        let mut parts = FramedParts::new::<Frame>(stream, codec);
        parts.read_buf = residual;

        Ok(Framed::from_parts(parts))
    }

    /// Authorization first, then the caller's custom headers, all opaque to
    /// the handshake.
    fn handshake_headers(&self) -> Vec<(String, String)> {
        let mut headers = Vec::with_capacity(self.options.headers.len() + 1);
        if let Some(value) = self.options.auth.header_value() {
            headers.push(("Authorization".to_owned(), value));
        }
        headers.extend(self.options.headers.iter().cloned());
        headers
    }

    /// One request cycle: write the frame, then read frames into the
    /// assembler until it completes or the deadline elapses.
    async fn exchange(&mut self, message: &str) -> Result<Exchange> {
        let Some(conn) = self.conn.as_mut() else {
            unreachable!()
        };

        conn.send(Frame::text(message)).await?;

        #[cfg(feature = "logging")]
        log::debug!("sent {} bytes, awaiting response", message.len());

        let mut assembler = ResponseAssembler::new(
            self.options.typing_indicators.clone(),
            self.options.respond_after_typing,
            self.options.max_response_length,
        );
        let deadline = Instant::now() + self.options.response_timeout;

        loop {
            let now = Instant::now();
            if now >= deadline {
                #[cfg(feature = "logging")]
                log::debug!("response deadline elapsed");
                return Ok(Exchange::Degraded(assembler.timed_out()));
            }
            let wait = (deadline - now).min(POLL_READ);

            let frame = match timeout(wait, conn.next()).await {
                // One bounded-read window passed in silence. With content
                // already collected the answer is taken as finished, the
                // same way the deadline would take it.
                Err(_) if assembler.has_content() => {
                    return Ok(Exchange::Degraded(assembler.timed_out()));
                }
                Err(_) => continue,
                Ok(None) => {
                    // Peer closed mid-read. Partial content degrades
                    // gracefully; silence is a hard error.
                    if assembler.has_content() {
                        #[cfg(feature = "logging")]
                        log::debug!("peer closed with partial response");
                        return Ok(Exchange::Degraded(assembler.timed_out()));
                    }
                    return Err(ClientError::TransportClosed);
                }
                Ok(Some(Err(err))) => return Err(err),
                Ok(Some(Ok(frame))) => frame,
            };

            // Control and unrecognized frames carry no response content.
            if !frame.opcode.is_data() {
                #[cfg(feature = "logging")]
                log::debug!("skipping {:?} frame", frame.opcode);
                continue;
            }

            let text = frame.text_lossy().into_owned();

            #[cfg(feature = "logging")]
            log::debug!("received {} byte payload", text.len());

            if let Assembly::Complete(response) = assembler.observe(&text) {
                return Ok(Exchange::Complete(response));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = SessionOptions::default();
        assert_eq!(options.connect_timeout, Duration::from_secs(10));
        assert_eq!(options.response_timeout, Duration::from_secs(20));
        assert_eq!(options.max_response_length, 10_000);
        assert_eq!(options.typing_indicators, vec!["typing".to_owned()]);
        assert!(options.respond_after_typing);
        assert!(options.headers.is_empty());
    }

    #[test]
    fn test_options_builders() {
        let options = SessionOptions::default()
            .with_response_timeout(Duration::from_millis(500))
            .with_typing_indicators(vec!["typing on".into(), "typing off".into()])
            .respond_immediately()
            .with_header("X-Client", "chatwire");

        assert_eq!(options.response_timeout, Duration::from_millis(500));
        assert_eq!(options.typing_indicators.len(), 2);
        assert!(!options.respond_after_typing);
        assert_eq!(
            options.headers,
            vec![("X-Client".to_owned(), "chatwire".to_owned())]
        );
    }

    #[test]
    fn test_new_session_has_no_connection() {
        let endpoint = Endpoint::parse("ws://localhost:9/never").unwrap();
        let session = ClientSession::new(endpoint, SessionOptions::default());
        assert!(!session.is_connected());
    }
}
