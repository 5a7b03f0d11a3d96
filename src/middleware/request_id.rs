//! Request identification.
//!
//! An inbound `x-request-id` is kept so a caller's correlation id survives
//! the hop; otherwise a UUID v4 is generated. Either way the id is stored on
//! the request and echoed on the response.

use uuid::Uuid;

use super::{Middleware, Next};
use crate::handler::BoxFuture;
use crate::request::Request;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request-id stage.
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestId;

impl Middleware for RequestId {
    fn name(&self) -> &'static str { "request_id" }

    fn handle<'a>(&'a self, mut req: Request, next: Next<'a>) -> BoxFuture<'a> {
        Box::pin(async move {
            let id = req
                .header(REQUEST_ID_HEADER)
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_owned)
                .unwrap_or_else(|| Uuid::new_v4().to_string());

            req.ctx.request_id = Some(id.clone());
            let mut res = next.run(req).await;
            res.set_header(REQUEST_ID_HEADER, &id);
            res
        })
    }
}
