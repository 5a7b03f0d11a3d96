//! Configuration consumed by the routing layer.
//!
//! recall does not read files. The process owner loads these types from
//! whatever serde format it likes and hands them over inside
//! [`AppState`](crate::AppState). Every section is `#[serde(default)]`, so a
//! partial document is fine.

use std::fmt;

use serde::Deserialize;

use crate::router::DEFAULT_BODY_LIMIT;

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
}

/// Listener settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port bound on `0.0.0.0`.
    pub port: u16,

    /// Resolve the client address from `True-Client-IP` / `X-Real-IP` /
    /// `X-Forwarded-For`. Turn off when not deployed behind a proxy you control.
    pub trust_proxy_headers: bool,

    /// Largest request body read for a matched route; larger ones get `413`.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8000, trust_proxy_headers: true, max_body_bytes: DEFAULT_BODY_LIMIT }
    }
}

/// Authentication gate settings.
///
/// The gate is assembled once: flipping `required` on a running app has no
/// effect until the app is rebuilt.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub required: bool,

    /// HS256 signing secret for bearer tokens.
    pub secret: String,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("required", &self.required)
            .field("secret", &if self.secret.is_empty() { "" } else { "<redacted>" })
            .finish()
    }
}
