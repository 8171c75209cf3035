//! HTTP/1.1 upgrade handshake, written against the raw byte stream.
//!
//! The negotiator sends a GET request with the mandatory upgrade headers and
//! accepts any response whose status line announces `101 Switching
//! Protocols`. It deliberately does not check `Sec-WebSocket-Accept`: the
//! chat services this crate targets are addressed directly, not through
//! caching intermediaries, and several of them get the echo wrong. One
//! failed attempt is terminal for that connection attempt; there is no
//! retry here.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{endpoint::Endpoint, ClientError, Result};

/// Upper bound on the handshake response that will be read. A header block
/// that does not fit is treated as a failed handshake.
const MAX_RESPONSE: usize = 8 * 1024;

/// Snippet length carried in a handshake error, for diagnostics.
const SNIPPET_LEN: usize = 256;

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Performs the client side of the upgrade handshake on a freshly connected
/// stream.
///
/// `headers` are written verbatim after the mandatory upgrade headers: the
/// authorization value and any user-supplied custom headers.
///
/// On success, returns any bytes that arrived after the response header
/// terminator. Servers often start streaming frames immediately behind the
/// `101`, and those bytes must seed the frame decoder rather than be lost.
pub(crate) async fn negotiate<S>(
    stream: &mut S,
    endpoint: &Endpoint,
    headers: &[(String, String)],
) -> Result<BytesMut>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = build_request(endpoint, headers);
    stream.write_all(request.as_bytes()).await?;
    stream.flush().await?;

    let mut response = BytesMut::with_capacity(1024);
    loop {
        if let Some(header_end) = find_terminator(&response) {
            let head = &response[..header_end];
            if !contains_switching_protocols(head) {
                return Err(reject(head));
            }

            #[cfg(feature = "logging")]
            log::debug!(
                "handshake accepted by {} ({} residual bytes)",
                endpoint.host,
                response.len() - header_end - HEADER_TERMINATOR.len()
            );

            let mut residual = response;
            let _ = residual.split_to(header_end + HEADER_TERMINATOR.len());
            return Ok(residual);
        }

        if response.len() >= MAX_RESPONSE {
            return Err(reject(&response));
        }

        let read = stream.read_buf(&mut response).await?;
        if read == 0 {
            if response.is_empty() {
                return Err(ClientError::HandshakeClosed);
            }
            // Peer closed after a partial response; report what it said.
            return Err(reject(&response));
        }
    }
}

/// Builds the HTTP/1.1 upgrade request for the endpoint.
fn build_request(endpoint: &Endpoint, headers: &[(String, String)]) -> String {
    let mut request = String::with_capacity(256);
    request.push_str("GET ");
    request.push_str(&endpoint.request_target());
    request.push_str(" HTTP/1.1\r\nHost: ");
    request.push_str(&endpoint.host_header());
    request.push_str("\r\n");
    request.push_str("Upgrade: websocket\r\n");
    request.push_str("Connection: Upgrade\r\n");
    request.push_str("Sec-WebSocket-Key: ");
    request.push_str(&generate_key());
    request.push_str("\r\n");
    request.push_str("Sec-WebSocket-Version: 13\r\n");

    for (name, value) in headers {
        request.push_str(name);
        request.push_str(": ");
        request.push_str(value);
        request.push_str("\r\n");
    }

    request.push_str("\r\n");
    request
}

/// Generates a fresh base64-encoded 16-byte `Sec-WebSocket-Key`.
fn generate_key() -> String {
    use base64::prelude::*;
    let input: [u8; 16] = rand::random();
    BASE64_STANDARD.encode(input)
}

fn find_terminator(buf: &[u8]) -> Option<usize> {
    buf.windows(HEADER_TERMINATOR.len())
        .position(|window| window == HEADER_TERMINATOR)
}

fn contains_switching_protocols(head: &[u8]) -> bool {
    head.windows(b"101 Switching Protocols".len())
        .any(|window| window == b"101 Switching Protocols")
}

fn reject(raw: &[u8]) -> ClientError {
    let snippet: String = String::from_utf8_lossy(raw)
        .chars()
        .take(SNIPPET_LEN)
        .collect();

    #[cfg(feature = "logging")]
    log::debug!("handshake rejected: {snippet:?}");

    ClientError::Handshake { snippet }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::prelude::*;

    fn endpoint() -> Endpoint {
        Endpoint::parse("ws://localhost:9001/chat?room=1").unwrap()
    }

    #[test]
    fn test_generate_key_is_16_bytes_base64() {
        let key = generate_key();
        let decoded = BASE64_STANDARD.decode(&key).unwrap();
        assert_eq!(decoded.len(), 16);
    }

    #[test]
    fn test_request_contains_mandatory_headers() {
        let headers = vec![("Authorization".to_owned(), "Bearer tok".to_owned())];
        let request = build_request(&endpoint(), &headers);

        assert!(request.starts_with("GET /chat?room=1 HTTP/1.1\r\n"));
        assert!(request.contains("Host: localhost:9001\r\n"));
        assert!(request.contains("Upgrade: websocket\r\n"));
        assert!(request.contains("Connection: Upgrade\r\n"));
        assert!(request.contains("Sec-WebSocket-Key: "));
        assert!(request.contains("Sec-WebSocket-Version: 13\r\n"));
        assert!(request.contains("Authorization: Bearer tok\r\n"));
        assert!(request.ends_with("\r\n\r\n"));
    }

    #[tokio::test]
    async fn test_negotiate_accepts_101() {
        let (mut client, mut server) = tokio::io::duplex(16 * 1024);
        server
            .write_all(b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\r\n")
            .await
            .unwrap();

        let residual = negotiate(&mut client, &endpoint(), &[]).await.unwrap();
        assert!(residual.is_empty());
    }

    #[tokio::test]
    async fn test_negotiate_preserves_residual_bytes() {
        let (mut client, mut server) = tokio::io::duplex(16 * 1024);
        // A text frame riding directly behind the 101
        server
            .write_all(b"HTTP/1.1 101 Switching Protocols\r\n\r\n\x81\x02hi")
            .await
            .unwrap();

        let residual = negotiate(&mut client, &endpoint(), &[]).await.unwrap();
        assert_eq!(&residual[..], b"\x81\x02hi");
    }

    #[tokio::test]
    async fn test_negotiate_rejects_non_101() {
        let (mut client, mut server) = tokio::io::duplex(16 * 1024);
        server
            .write_all(b"HTTP/1.1 403 Forbidden\r\nContent-Length: 0\r\n\r\n")
            .await
            .unwrap();

        match negotiate(&mut client, &endpoint(), &[]).await {
            Err(ClientError::Handshake { snippet }) => {
                assert!(snippet.contains("403 Forbidden"));
            }
            other => panic!("expected Handshake error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_negotiate_peer_closed_without_response() {
        let (mut client, server) = tokio::io::duplex(16 * 1024);
        drop(server);

        match negotiate(&mut client, &endpoint(), &[]).await {
            Err(ClientError::HandshakeClosed) => {}
            other => panic!("expected HandshakeClosed, got {other:?}"),
        }
    }
}
