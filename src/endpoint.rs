//! Endpoint addressing: where the client connects and what it asks for.

use url::Url;

use crate::{ClientError, Result};

/// A parsed `ws://` or `wss://` endpoint.
///
/// Parsed once at construction and immutable thereafter; the session clones
/// nothing out of it at request time. Default ports (80 for `ws`, 443 for
/// `wss`) are filled in when the URL omits one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Hostname or IP literal.
    pub host: String,
    /// TCP port, 1-65535.
    pub port: u16,
    /// Request path, `/` when the URL has none.
    pub path: String,
    /// Raw query string, without the leading `?`.
    pub query: Option<String>,
    /// Whether the connection uses TLS (`wss`).
    pub secure: bool,
}

impl Endpoint {
    /// Parses a WebSocket URL into an `Endpoint`.
    ///
    /// # Errors
    /// - [`ClientError::InvalidScheme`] for anything other than `ws`/`wss`
    /// - [`ClientError::MissingHost`] when the URL carries no host
    /// - [`ClientError::InvalidPort`] when the URL names port 0
    /// - [`ClientError::UrlParseError`] when the URL is not a URL at all
    pub fn parse(input: &str) -> Result<Self> {
        let url = Url::parse(input)?;

        let secure = match url.scheme() {
            "ws" => false,
            "wss" => true,
            other => return Err(ClientError::InvalidScheme(other.to_owned())),
        };

        let host = url
            .host_str()
            .map(str::to_owned)
            .ok_or(ClientError::MissingHost)?;

        let port = match url.port() {
            Some(0) => return Err(ClientError::InvalidPort),
            Some(port) => port,
            None => {
                if secure {
                    443
                } else {
                    80
                }
            }
        };

        let path = match url.path() {
            "" => "/".to_owned(),
            path => path.to_owned(),
        };

        Ok(Self {
            host,
            port,
            path,
            query: url.query().map(str::to_owned),
            secure,
        })
    }

    /// The `Host` header value: `host` when the port is the scheme default,
    /// `host:port` otherwise.
    pub fn host_header(&self) -> String {
        let default_port = if self.secure { 443 } else { 80 };
        if self.port == default_port {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// The request target for the upgrade request line: path plus query.
    pub fn request_target(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{}", self.path, query),
            None => self.path.clone(),
        }
    }

    /// The `host:port` pair handed to the TCP connector.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain() {
        let ep = Endpoint::parse("ws://localhost:3000/chat").unwrap();
        assert_eq!(ep.host, "localhost");
        assert_eq!(ep.port, 3000);
        assert_eq!(ep.path, "/chat");
        assert_eq!(ep.query, None);
        assert!(!ep.secure);
    }

    #[test]
    fn test_parse_secure_default_port() {
        let ep = Endpoint::parse("wss://chat.example.com/api/ws?v=2").unwrap();
        assert_eq!(ep.port, 443);
        assert!(ep.secure);
        assert_eq!(ep.query.as_deref(), Some("v=2"));
        assert_eq!(ep.request_target(), "/api/ws?v=2");
    }

    #[test]
    fn test_parse_empty_path() {
        let ep = Endpoint::parse("ws://example.com").unwrap();
        assert_eq!(ep.path, "/");
        assert_eq!(ep.request_target(), "/");
        assert_eq!(ep.port, 80);
    }

    #[test]
    fn test_rejects_http_scheme() {
        match Endpoint::parse("http://example.com/") {
            Err(ClientError::InvalidScheme(scheme)) => assert_eq!(scheme, "http"),
            other => panic!("expected InvalidScheme, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_port_zero() {
        match Endpoint::parse("ws://example.com:0/chat") {
            Err(ClientError::InvalidPort) => {}
            other => panic!("expected InvalidPort, got {other:?}"),
        }
    }

    #[test]
    fn test_host_header_omits_default_port() {
        let ep = Endpoint::parse("wss://example.com/ws").unwrap();
        assert_eq!(ep.host_header(), "example.com");

        let ep = Endpoint::parse("ws://example.com:8080/ws").unwrap();
        assert_eq!(ep.host_header(), "example.com:8080");
    }
}
