//! Incoming HTTP request type.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use bytes::Bytes;
use http::HeaderMap;
use http::request::Parts;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Body;

/// Error type of a streaming request body.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Claims of a verified bearer token, kept as the raw JSON object.
pub type Claims = serde_json::Map<String, serde_json::Value>;

/// Per-request state filled in by the middleware chain.
///
/// Lives and dies with one [`Request`]; nothing here is shared between
/// requests.
#[derive(Debug, Default)]
pub(crate) struct Context {
    pub(crate) request_id: Option<String>,
    pub(crate) client_ip: Option<IpAddr>,
    pub(crate) claims: Option<Claims>,
}

/// Request body: still on the wire, or read into memory.
pub(crate) enum Payload {
    Streaming(UnsyncBoxBody<Bytes, BoxError>),
    Buffered(Bytes),
}

impl Payload {
    pub(crate) fn streaming<B>(body: B) -> Self
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        Self::Streaming(body.map_err(Into::into).boxed_unsync())
    }
}

/// Why a body could not be buffered.
#[derive(Debug)]
pub(crate) enum BodyError {
    TooLarge,
    Read(BoxError),
}

// Names the collect future with a concrete `Send` bound so callers' async
// blocks don't have to prove `Limited`'s higher-ranked `Into` bound themselves.
fn collect_limited(
    body: UnsyncBoxBody<Bytes, BoxError>,
    limit: usize,
) -> impl std::future::Future<Output = Result<http_body_util::Collected<Bytes>, BoxError>> + Send {
    Limited::new(body, limit).collect()
}

/// An incoming HTTP request.
///
/// The body is not read while the middleware chain runs. The router buffers
/// it once a handler has matched, so a request rejected earlier never waits
/// on its payload.
pub struct Request {
    pub(crate) head: Parts,
    pub(crate) body: Payload,
    pub(crate) params: HashMap<String, String>,
    pub(crate) remote_addr: SocketAddr,
    pub(crate) ctx: Context,
}

impl Request {
    pub(crate) fn new(head: Parts, body: Payload, remote_addr: SocketAddr) -> Self {
        Self { head, body, params: HashMap::new(), remote_addr, ctx: Context::default() }
    }

    /// Reads the body into memory, failing past `limit` bytes.
    pub(crate) async fn buffer(&mut self, limit: usize) -> Result<(), BodyError> {
        let body = match std::mem::replace(&mut self.body, Payload::Buffered(Bytes::new())) {
            Payload::Streaming(body) => body,
            buffered @ Payload::Buffered(_) => {
                self.body = buffered;
                return Ok(());
            }
        };

        let collected = collect_limited(body, limit).await.map_err(|e| {
            if e.is::<LengthLimitError>() { BodyError::TooLarge } else { BodyError::Read(e) }
        })?;
        self.body = Payload::Buffered(collected.to_bytes());
        Ok(())
    }

    pub fn method(&self) -> &http::Method { &self.head.method }
    pub fn path(&self) -> &str { self.head.uri.path() }
    pub fn headers(&self) -> &HeaderMap { &self.head.headers }

    /// The request body. Empty until the router has buffered it, which
    /// happens before any handler runs.
    pub fn body(&self) -> &[u8] {
        match &self.body {
            Payload::Buffered(bytes) => bytes,
            Payload::Streaming(_) => &[],
        }
    }

    /// Peer address of the TCP connection.
    pub fn remote_addr(&self) -> SocketAddr { self.remote_addr }

    /// Case-insensitive header lookup. Values that are not visible ASCII
    /// read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/sessions/{sessionId}`, `req.param("sessionId")` on
    /// `/sessions/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// The session identifier segment, verbatim.
    pub fn session_id(&self) -> Option<&str> {
        self.param(crate::routes::SESSION_ID)
    }

    /// Correlation id assigned by the request-id stage.
    pub fn request_id(&self) -> Option<&str> {
        self.ctx.request_id.as_deref()
    }

    /// Originating client address: the proxy-supplied one when resolved,
    /// otherwise the peer address.
    pub fn client_ip(&self) -> IpAddr {
        self.ctx.client_ip.unwrap_or_else(|| self.remote_addr.ip())
    }

    /// Claims of the verified bearer token, if any.
    pub fn claims(&self) -> Option<&Claims> {
        self.ctx.claims.as_ref()
    }
}
