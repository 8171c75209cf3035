//! Authentication header construction.
//!
//! Chat services usually authenticate the upgrade request itself, via an
//! `Authorization` header. The schemes here cover the common cases; the rest
//! of the crate treats the produced value as an opaque header string to
//! include verbatim in the handshake.

use base64::prelude::*;

/// How the `Authorization` header for the handshake is built.
#[derive(Debug, Clone, Default)]
pub enum AuthScheme {
    /// No authentication header.
    #[default]
    None,
    /// HTTP Basic: `Basic base64(username:password)`.
    Basic {
        username: String,
        password: String,
    },
    /// Bearer token: `Bearer <token>`. When `token` is `None` the value is
    /// read from the environment variable named by `env_var` at header-build
    /// time, so a rotated key is picked up on the next connect.
    Bearer {
        token: Option<String>,
        env_var: Option<String>,
    },
}

impl AuthScheme {
    /// Convenience constructor for a bearer token read from the environment.
    pub fn bearer_from_env(var: impl Into<String>) -> Self {
        Self::Bearer {
            token: None,
            env_var: Some(var.into()),
        }
    }

    /// Produces the `Authorization` header value, or `None` when the scheme
    /// is [`AuthScheme::None`] or a bearer token cannot be resolved.
    pub fn header_value(&self) -> Option<String> {
        match self {
            Self::None => None,
            Self::Basic { username, password } => {
                let credentials = BASE64_STANDARD.encode(format!("{username}:{password}"));
                Some(format!("Basic {credentials}"))
            }
            Self::Bearer { token, env_var } => {
                let token = token.clone().or_else(|| {
                    env_var.as_deref().and_then(|var| std::env::var(var).ok())
                })?;
                Some(format!("Bearer {token}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_produces_no_header() {
        assert_eq!(AuthScheme::None.header_value(), None);
    }

    #[test]
    fn test_basic_encodes_credentials() {
        let scheme = AuthScheme::Basic {
            username: "user".into(),
            password: "pass".into(),
        };
        // base64("user:pass")
        assert_eq!(scheme.header_value().unwrap(), "Basic dXNlcjpwYXNz");
    }

    #[test]
    fn test_bearer_literal_token() {
        let scheme = AuthScheme::Bearer {
            token: Some("tok-123".into()),
            env_var: None,
        };
        assert_eq!(scheme.header_value().unwrap(), "Bearer tok-123");
    }

    #[test]
    fn test_bearer_env_fallback() {
        std::env::set_var("CHATWIRE_TEST_API_KEY", "from-env");
        let scheme = AuthScheme::bearer_from_env("CHATWIRE_TEST_API_KEY");
        assert_eq!(scheme.header_value().unwrap(), "Bearer from-env");
        std::env::remove_var("CHATWIRE_TEST_API_KEY");
    }

    #[test]
    fn test_bearer_unresolvable_is_none() {
        let scheme = AuthScheme::bearer_from_env("CHATWIRE_TEST_MISSING_KEY");
        assert_eq!(scheme.header_value(), None);
    }
}
