//! Middleware layer.
//!
//! A [`Pipeline`] is an ordered list of [`Middleware`] stages in front of the
//! [`Router`]. Each stage receives the request and a [`Next`] handle and may
//! pass the request on, annotate it first, or answer on its own without
//! calling `next` at all. Stages run strictly in registration order.
//!
//! Optional stages are declared with [`PipelineBuilder::stage_if`], so
//! assembly reads as a flat list instead of scattered branches:
//!
//! ```rust,ignore
//! Pipeline::builder()
//!     .stage(AccessLog::new(sink))
//!     .stage(Recoverer)
//!     .stage_if(auth.required, || Authenticator)
//!     .build();
//! ```

use std::sync::Arc;

use crate::handler::BoxFuture;
use crate::request::Request;
use crate::router::Router;

mod access_log;
mod auth;
mod heartbeat;
mod real_ip;
mod recover;
mod request_id;

pub use access_log::{AccessEntry, AccessLog, AccessSink, TracingSink};
pub use auth::{Authenticator, JwtVerifier};
pub use heartbeat::Heartbeat;
pub use real_ip::RealIp;
pub use recover::Recoverer;
pub use request_id::{REQUEST_ID_HEADER, RequestId};

/// One stage of the request pipeline.
pub trait Middleware: Send + Sync + 'static {
    /// Short stable name, used in logs and for inspecting assembled pipelines.
    fn name(&self) -> &'static str;

    fn handle<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a>;
}

/// The remainder of the pipeline after the current stage.
pub struct Next<'a> {
    stages: &'a [Arc<dyn Middleware>],
    endpoint: &'a Router,
}

impl<'a> Next<'a> {
    /// Runs the next stage, or the router once every stage has run.
    pub fn run(self, req: Request) -> BoxFuture<'a> {
        match self.stages.split_first() {
            Some((stage, rest)) => {
                stage.handle(req, Next { stages: rest, endpoint: self.endpoint })
            }
            None => self.endpoint.dispatch(req),
        }
    }
}

/// An assembled, immutable chain of stages.
#[derive(Clone)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Middleware>>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder { stages: Vec::new() }
    }

    /// Stage names in execution order.
    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub(crate) fn run<'a>(&'a self, endpoint: &'a Router, req: Request) -> BoxFuture<'a> {
        Next { stages: &self.stages, endpoint }.run(req)
    }
}

/// Builder for [`Pipeline`].
pub struct PipelineBuilder {
    stages: Vec<Arc<dyn Middleware>>,
}

impl PipelineBuilder {
    /// Appends a stage.
    pub fn stage(mut self, middleware: impl Middleware) -> Self {
        self.stages.push(Arc::new(middleware));
        self
    }

    /// Appends the stage built by `make` only when `enabled` holds.
    /// `make` is not called otherwise.
    pub fn stage_if<M: Middleware>(self, enabled: bool, make: impl FnOnce() -> M) -> Self {
        if enabled { self.stage(make()) } else { self }
    }

    pub fn build(self) -> Pipeline {
        Pipeline { stages: self.stages }
    }
}


#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use http::StatusCode;

    use super::testing::*;
    use super::*;
    use crate::response::Response;

    struct Tag(&'static str, Arc<Mutex<Vec<&'static str>>>);

    impl Middleware for Tag {
        fn name(&self) -> &'static str { self.0 }

        fn handle<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a> {
            Box::pin(async move {
                self.1.lock().unwrap().push(self.0);
                next.run(req).await
            })
        }
    }

    struct Deny;

    impl Middleware for Deny {
        fn name(&self) -> &'static str { "deny" }

        fn handle<'a>(&'a self, _req: Request, _next: Next<'a>) -> BoxFuture<'a> {
            Box::pin(async { Response::status(StatusCode::FORBIDDEN) })
        }
    }

    #[tokio::test]
    async fn stages_run_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::builder()
            .stage(Tag("a", Arc::clone(&seen)))
            .stage(Tag("b", Arc::clone(&seen)))
            .stage(Tag("c", Arc::clone(&seen)))
            .build();

        let res = run(&pipeline, &echo_router(), request("GET", "/echo", &[])).await;
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(*seen.lock().unwrap(), ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn short_circuit_skips_later_stages_and_router() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::builder()
            .stage(Tag("before", Arc::clone(&seen)))
            .stage(Deny)
            .stage(Tag("after", Arc::clone(&seen)))
            .build();

        let res = run(&pipeline, &echo_router(), request("GET", "/echo", &[])).await;
        assert_eq!(res.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(*seen.lock().unwrap(), ["before"]);
    }

    #[test]
    fn stage_if_skips_disabled_stage_without_building_it() {
        let pipeline = Pipeline::builder()
            .stage_if(false, || -> Deny { panic!("must not be built") })
            .stage_if(true, || Deny)
            .build();
        assert_eq!(pipeline.names(), ["deny"]);
    }
}
