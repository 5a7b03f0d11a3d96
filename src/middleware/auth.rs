//! Bearer-token authentication gate.
//!
//! Two stages, always used together and only when authentication is
//! required:
//!
//! - [`JwtVerifier`] looks for a token, checks it and attaches its claims to
//!   the request. It never rejects anything.
//! - [`Authenticator`] rejects every request that arrives without verified
//!   claims.
//!
//! Callers cannot tell a missing token from a malformed, mis-signed or
//! expired one: all of them get the same bare `401`.

use http::StatusCode;
use http::header::{AUTHORIZATION, COOKIE};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use tracing::debug;

use super::{Middleware, Next};
use crate::handler::BoxFuture;
use crate::request::{Claims, Request};
use crate::response::Response;

const TOKEN_COOKIE: &str = "jwt";

/// Token-verification stage (HS256).
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    /// Verifies HS256 signatures with `secret`. `exp` and `nbf` are checked
    /// when the token carries them, with no leeway; neither is mandatory.
    pub fn hs256(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_nbf = true;
        validation.validate_aud = false;
        validation.leeway = 0;
        Self { key: DecodingKey::from_secret(secret), validation }
    }

    fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(token, &self.key, &self.validation).map(|data| data.claims)
    }
}

impl Middleware for JwtVerifier {
    fn name(&self) -> &'static str { "jwt_verifier" }

    fn handle<'a>(&'a self, mut req: Request, next: Next<'a>) -> BoxFuture<'a> {
        Box::pin(async move {
            if let Some(token) = token_from_request(&req) {
                match self.verify(token) {
                    Ok(claims) => req.ctx.claims = Some(claims),
                    Err(e) => debug!(path = %req.path(), "bearer token rejected: {e}"),
                }
            }
            next.run(req).await
        })
    }
}

/// Enforcement stage: no verified claims, no entry.
#[derive(Clone, Copy, Debug, Default)]
pub struct Authenticator;

impl Middleware for Authenticator {
    fn name(&self) -> &'static str { "authenticator" }

    fn handle<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a> {
        if req.claims().is_none() {
            return Box::pin(async {
                Response::builder()
                    .status(StatusCode::UNAUTHORIZED)
                    .header("www-authenticate", "Bearer")
                    .text("Unauthorized")
            });
        }
        next.run(req)
    }
}

/// `Authorization: Bearer <token>` first, then the `jwt` cookie.
fn token_from_request(req: &Request) -> Option<&str> {
    let from_header = req.header(AUTHORIZATION.as_str()).and_then(|value| {
        let (scheme, token) = value.split_once(' ')?;
        scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
    });

    from_header.filter(|t| !t.is_empty()).or_else(|| {
        req.headers()
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == TOKEN_COOKIE)
            .map(|(_, token)| token)
            .filter(|t| !t.is_empty())
    })
}
