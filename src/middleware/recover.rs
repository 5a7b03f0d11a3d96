//! Panic recovery.
//!
//! A panic anywhere below this stage ends only the request that raised it:
//! the client gets an empty `500`, the connection task and every other
//! in-flight request carry on.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use http::StatusCode;
use tracing::error;

use super::{Middleware, Next};
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;

/// Panic-recovery stage.
#[derive(Clone, Copy, Debug, Default)]
pub struct Recoverer;

impl Middleware for Recoverer {
    fn name(&self) -> &'static str { "recover" }

    fn handle<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a> {
        Box::pin(async move {
            let method = req.method().clone();
            let path = req.path().to_owned();

            // Wrapped in a block so panics raised while building the
            // downstream future are caught too, not just while polling it.
            let outcome = AssertUnwindSafe(async move { next.run(req).await })
                .catch_unwind()
                .await;

            match outcome {
                Ok(res) => res,
                Err(payload) => {
                    let panic = panic_message(payload.as_ref());
                    error!(%method, %path, panic, "handler panicked");
                    Response::status(StatusCode::INTERNAL_SERVER_ERROR).recovered()
                }
            }
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic payload>")
}

#[cfg(test)]
mod tests {
    use super::super::Pipeline;
    use super::super::testing::*;
    use super::*;
    use crate::router::Router;

    fn panicking_router() -> Router {
        Router::new()
            .get("/boom", |_req: Request| async move {
                if true {
                    panic!("boom");
                }
                Response::text("unreachable")
            })
            .get("/eager", |_req: Request| -> std::future::Ready<Response> {
                panic!("panicked before returning a future")
            })
            .get("/fine", |_req: Request| async { Response::text("fine") })
    }

    #[tokio::test]
    async fn panic_becomes_500_and_next_request_succeeds() {
        let pipeline = Pipeline::builder().stage(Recoverer).build();
        let router = panicking_router();

        let res = run(&pipeline, &router, request("GET", "/boom", &[])).await;
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(res.recovered);
        assert!(res.body().is_empty());

        let res = run(&pipeline, &router, request("GET", "/fine", &[])).await;
        assert_eq!(res.status_code(), StatusCode::OK);
        assert!(!res.recovered);
    }

    #[tokio::test]
    async fn catches_panic_raised_before_the_future_exists() {
        let pipeline = Pipeline::builder().stage(Recoverer).build();
        let res = run(&pipeline, &panicking_router(), request("GET", "/eager", &[])).await;
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn extracts_string_payloads() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn Any + Send> = Box::new("static");
        let other: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(borrowed.as_ref()), "static");
        assert_eq!(panic_message(other.as_ref()), "<non-string panic payload>");
    }
}
