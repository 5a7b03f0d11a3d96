//! Assembly of the middleware chain and the API route tree.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Body;
use tracing::info;

use crate::error::Error;
use crate::middleware::{
    AccessLog, AccessSink, Authenticator, Heartbeat, JwtVerifier, Pipeline, RealIp, Recoverer,
    RequestId,
};
use crate::request::{BoxError, Payload, Request};
use crate::router::Router;
use crate::state::{AppState, Resources};

/// Name of the session path parameter.
pub const SESSION_ID: &str = "sessionId";

/// Liveness check path, answered ahead of authentication.
pub const HEALTH_PATH: &str = "/healthz";

/// The assembled application: middleware chain in front of the route tree.
///
/// Built once; immutable afterwards. Share it behind an `Arc`.
pub struct App {
    pipeline: Pipeline,
    router: Router,
}

impl App {
    /// Assembles the chain and the route tree from `state`.
    ///
    /// The gate is decided here, from `auth.required`, and stays that way
    /// for the lifetime of the `App`.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] when authentication is required but no signing
    /// secret is configured.
    pub fn new<R: Resources>(
        state: Arc<AppState<R>>,
        access: Arc<dyn AccessSink>,
    ) -> Result<Self, Error> {
        let server = &state.config.server;
        let auth = &state.config.auth;

        if auth.required {
            if auth.secret.is_empty() {
                return Err(Error::Config(
                    "auth.secret must be set when auth.required is true".into(),
                ));
            }
            info!("JWT authentication required");
        }

        let pipeline = Pipeline::builder()
            .stage(AccessLog::new(access))
            .stage(Recoverer)
            .stage(RequestId)
            .stage(RealIp::new(server.trust_proxy_headers))
            .stage(Heartbeat::new(HEALTH_PATH))
            .stage_if(auth.required, || JwtVerifier::hs256(auth.secret.as_bytes()))
            .stage_if(auth.required, || Authenticator)
            .build();

        let router = route_tree(&state).body_limit(server.max_body_bytes);
        Ok(Self { pipeline, router })
    }

    /// Stage names in execution order.
    pub fn stages(&self) -> Vec<&'static str> {
        self.pipeline.names()
    }

    /// Serves one request end to end.
    ///
    /// The body is handed over unread. The router reads it only after every
    /// stage has passed the request on and a route has matched, so a request
    /// the gate rejects is answered without waiting for its payload.
    pub async fn call<B>(
        &self,
        req: http::Request<B>,
        remote_addr: SocketAddr,
    ) -> http::Response<Full<Bytes>>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let (head, body) = req.into_parts();
        let req = Request::new(head, Payload::streaming(body), remote_addr);
        self.pipeline.run(&self.router, req).await.into_inner()
    }
}

/// `/api/v1/sessions/{sessionId}` and its memory and search sub-resources.
fn route_tree<R: Resources>(state: &Arc<AppState<R>>) -> Router {
    Router::new().route("/api/v1", |r| {
        r.route("/sessions/{sessionId}", |r| {
            r
                // Session
                .get("/", R::get_session(Arc::clone(state)))
                .post("/", R::post_session(Arc::clone(state)))
                // Memory
                .route("/memory", |r| {
                    r.get("/", R::get_memory(Arc::clone(state)))
                        .post("/", R::post_memory(Arc::clone(state)))
                        .delete("/", R::delete_memory(Arc::clone(state)))
                })
                // Search
                .route("/search", |r| r.post("/", R::search_memory(Arc::clone(state))))
        })
    })
}
