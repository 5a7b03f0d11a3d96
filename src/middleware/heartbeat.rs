//! Liveness endpoint.
//!
//! `GET` or `HEAD` on the configured path answers `200 "."` straight from the
//! chain. Nothing after this stage runs, the authentication gate included, so
//! the check works with or without credentials. If the process can respond
//! at all, it is alive.

use super::{Middleware, Next};
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;

/// Health-check stage.
#[derive(Clone, Debug)]
pub struct Heartbeat {
    path: String,
}

impl Heartbeat {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    fn matches(&self, req: &Request) -> bool {
        let method = req.method();
        (*method == http::Method::GET || *method == http::Method::HEAD)
            && req.path().eq_ignore_ascii_case(&self.path)
    }
}

impl Middleware for Heartbeat {
    fn name(&self) -> &'static str { "heartbeat" }

    fn handle<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a> {
        if self.matches(&req) {
            return Box::pin(async { Response::text(".") });
        }
        next.run(req)
    }
}
