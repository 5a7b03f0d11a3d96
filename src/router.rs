//! Radix-tree request router.
//!
//! One tree per HTTP method, O(path-length) lookup. Static segments win over
//! `{param}` segments, so the most specific pattern always matches. A path
//! that exists under another method answers `405` with an `allow` header;
//! anything else is a `404`.

use std::collections::HashMap;
use std::sync::Arc;

use http::StatusCode;
use matchit::Router as MatchitRouter;
use tracing::{debug, warn};

use crate::handler::{BoxFuture, BoxedHandler, Handler};
use crate::method::Method;
use crate::request::{BodyError, Request};
use crate::response::Response;

/// Largest request body a handler is given unless
/// [`Router::body_limit`] says otherwise.
pub const DEFAULT_BODY_LIMIT: usize = 4 * 1024 * 1024;

/// The route tree.
///
/// Build it once at startup. Each registration returns `self` so calls
/// chain naturally; [`Router::route`] opens a nested scope under a prefix.
pub struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
    // Registration order, kept so a scope can be replayed under its prefix.
    table: Vec<(Method, String, BoxedHandler)>,
    body_limit: usize,
}

pub(crate) enum Lookup {
    Found(BoxedHandler, HashMap<String, String>),
    MethodNotAllowed(Vec<Method>),
    NotFound,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new(), table: Vec::new(), body_limit: DEFAULT_BODY_LIMIT }
    }

    /// Caps the body read for a matched route. Larger bodies answer `413`.
    pub fn body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    /// Register a handler for a method + path pair. Returns `self` for chaining.
    ///
    /// Path parameters use `{name}` syntax — `req.param("name")` retrieves them.
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid pattern or conflicts with a route
    /// already registered for `method`.
    pub fn on(self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.add(method, path, handler.into_boxed_handler())
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::Get, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::Post, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::Put, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::Delete, path, handler)
    }

    /// Mounts the routes built by `build` under `prefix`.
    ///
    /// A sub-route of `"/"` maps to the prefix itself:
    ///
    /// ```rust
    /// # use recall::{Request, Response, Router};
    /// # async fn list(_: Request) -> Response { Response::text("") }
    /// // GET /api/v1/sessions/{sessionId}/memory
    /// Router::new().route("/api/v1/sessions/{sessionId}", |r| {
    ///     r.route("/memory", |r| r.get("/", list))
    /// });
    /// ```
    pub fn route(mut self, prefix: &str, build: impl FnOnce(Router) -> Router) -> Self {
        for (method, path, handler) in build(Router::new()).table {
            self = self.add(method, &join(prefix, &path), handler);
        }
        self
    }

    fn add(mut self, method: Method, path: &str, handler: BoxedHandler) -> Self {
        let path = join("", path);
        self.routes
            .entry(method)
            .or_default()
            .insert(path.clone(), Arc::clone(&handler))
            .unwrap_or_else(|e| panic!("invalid route `{method} {path}`: {e}"));
        self.table.push((method, path, handler));
        self
    }

    pub(crate) fn lookup(&self, method: &http::Method, path: &str) -> Lookup {
        let method = Method::from_http(method);

        if let Some(matched) = method
            .and_then(|m| self.routes.get(&m))
            .and_then(|tree| tree.at(path).ok())
        {
            let params =
                matched.params.iter().map(|(k, v)| (k.to_owned(), v.to_owned())).collect();
            return Lookup::Found(Arc::clone(matched.value), params);
        }

        let mut allowed: Vec<Method> = self
            .routes
            .iter()
            .filter(|(m, tree)| Some(**m) != method && tree.at(path).is_ok())
            .map(|(m, _)| *m)
            .collect();

        if allowed.is_empty() {
            Lookup::NotFound
        } else {
            allowed.sort();
            Lookup::MethodNotAllowed(allowed)
        }
    }

    /// Terminal stage of the pipeline: match, read the body, call the handler.
    ///
    /// Only a matched request has its body read; `404` and `405` answer
    /// without touching it.
    pub(crate) fn dispatch(&self, mut req: Request) -> BoxFuture<'_> {
        Box::pin(async move {
            let lookup = self.lookup(req.method(), req.path());
            match lookup {
                Lookup::Found(handler, params) => {
                    req.params = params;
                    match req.buffer(self.body_limit).await {
                        Ok(()) => handler.call(req).await,
                        Err(BodyError::TooLarge) => {
                            let limit = self.body_limit;
                            debug!(path = %req.path(), limit, "request body too large");
                            Response::status(StatusCode::PAYLOAD_TOO_LARGE)
                        }
                        Err(BodyError::Read(e)) => {
                            warn!(path = %req.path(), "failed to read request body: {e}");
                            Response::status(StatusCode::BAD_REQUEST)
                        }
                    }
                }
                Lookup::MethodNotAllowed(allowed) => {
                    let allow = allowed.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(", ");
                    Response::builder()
                        .status(StatusCode::METHOD_NOT_ALLOWED)
                        .header("allow", &allow)
                        .no_body()
                }
                Lookup::NotFound => Response::status(StatusCode::NOT_FOUND),
            }
        })
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

/// Joins a scope prefix and a sub-path; `"/"` under a prefix is the prefix.
fn join(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    match (prefix.is_empty(), path.is_empty()) {
        (true, true) => "/".to_owned(),
        (false, true) => prefix.to_owned(),
        _ => format!("{prefix}/{path}"),
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::time::Duration;

    use bytes::Bytes;
    use futures_util::stream;
    use http_body_util::{Full, StreamBody};
    use hyper::body::Frame;

    use super::*;
    use crate::middleware::testing::{request, with_stream};

    async fn named(req: Request) -> Response {
        Response::text(format!("{}:{}", req.path(), req.param("id").unwrap_or("-")))
    }

    fn lookup_status(router: &Router, method: http::Method, path: &str) -> &'static str {
        match router.lookup(&method, path) {
            Lookup::Found(..) => "found",
            Lookup::MethodNotAllowed(_) => "405",
            Lookup::NotFound => "404",
        }
    }

    #[test]
    fn join_follows_scope_rules() {
        assert_eq!(join("", "/"), "/");
        assert_eq!(join("/api/v1", "/"), "/api/v1");
        assert_eq!(join("/api/v1/", "sessions"), "/api/v1/sessions");
        assert_eq!(join("/a", "/b/"), "/a/b/");
    }

    #[test]
    fn nested_scopes_register_full_paths() {
        let router = Router::new().route("/api", |r| {
            r.route("/items/{id}", |r| r.get("/", named).route("/tags", |r| r.post("/", named)))
        });

        let paths: Vec<_> = router.table.iter().map(|(m, p, _)| format!("{m} {p}")).collect();
        assert_eq!(paths, ["GET /api/items/{id}", "POST /api/items/{id}/tags"]);
    }

    #[test]
    fn static_segment_beats_parameter() {
        let router = Router::new()
            .get("/items/{id}", named)
            .get("/items/latest", named);

        match router.lookup(&http::Method::GET, "/items/latest") {
            Lookup::Found(_, params) => assert!(params.is_empty()),
            _ => panic!("expected a match"),
        }
        match router.lookup(&http::Method::GET, "/items/7") {
            Lookup::Found(_, params) => assert_eq!(params["id"], "7"),
            _ => panic!("expected a match"),
        }
    }

    #[test]
    fn wrong_method_is_405_with_sorted_allow_list() {
        let router = Router::new()
            .post("/items/{id}", named)
            .delete("/items/{id}", named)
            .get("/items/{id}", named);

        match router.lookup(&http::Method::PUT, "/items/1") {
            Lookup::MethodNotAllowed(allowed) => {
                assert_eq!(allowed, [Method::Delete, Method::Get, Method::Post]);
            }
            _ => panic!("expected 405"),
        }
        let purge = http::Method::from_bytes(b"PURGE").unwrap();
        assert_eq!(lookup_status(&router, purge, "/items/1"), "405");
    }

    #[test]
    fn unknown_path_is_404() {
        let router = Router::new().get("/items/{id}", named);
        assert_eq!(lookup_status(&router, http::Method::GET, "/other"), "404");
        assert_eq!(lookup_status(&router, http::Method::GET, "/items/1/extra"), "404");
    }

    #[test]
    #[should_panic(expected = "invalid route")]
    fn conflicting_registration_panics() {
        let _ = Router::new().get("/items/{id}", named).get("/items/{id}", named);
    }

    fn body_len_router() -> Router {
        Router::new().post("/upload", |req: Request| async move {
            Response::text(req.body().len().to_string())
        })
    }

    #[tokio::test]
    async fn matched_handler_sees_the_whole_body() {
        let body = Full::new(Bytes::from_static(b"hello"));
        let req = with_stream(request("POST", "/upload", &[]), body);
        let res = body_len_router().dispatch(req).await;

        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.body(), b"5");
    }

    #[tokio::test]
    async fn body_over_the_limit_is_413() {
        let router = body_len_router().body_limit(4);
        let body = Full::new(Bytes::from_static(b"hello"));
        let req = with_stream(request("POST", "/upload", &[]), body);

        assert_eq!(router.dispatch(req).await.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn body_that_fails_midway_is_400() {
        let chunks = stream::iter([
            Ok(Frame::data(Bytes::from_static(b"he"))),
            Err(std::io::Error::other("client aborted")),
        ]);
        let req = with_stream(request("POST", "/upload", &[]), StreamBody::new(chunks));

        assert_eq!(body_len_router().dispatch(req).await.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unmatched_request_never_reads_its_body() {
        let never = StreamBody::new(stream::pending::<Result<Frame<Bytes>, Infallible>>());
        let req = with_stream(request("POST", "/elsewhere", &[]), never);

        let res = tokio::time::timeout(Duration::from_secs(1), body_len_router().dispatch(req))
            .await
            .expect("404 must not wait for the body");
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
    }
}
