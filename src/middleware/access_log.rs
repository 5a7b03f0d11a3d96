//! Per-request access log.
//!
//! Outermost stage: it sees the response the client actually gets, including
//! a 401 from the gate or a 500 from the recoverer. Where entries go is the
//! caller's choice through [`AccessSink`]; [`TracingSink`] is the default.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use super::{Middleware, Next, REQUEST_ID_HEADER};
use crate::handler::BoxFuture;
use crate::request::Request;

/// One completed request.
#[derive(Clone, Debug)]
pub struct AccessEntry {
    pub method: String,
    pub path: String,
    pub status: u16,
    pub latency: Duration,
    pub request_id: Option<String>,
    pub remote_addr: SocketAddr,
    /// The response was produced by the panic recoverer.
    pub recovered: bool,
}

/// Destination for access-log entries.
pub trait AccessSink: Send + Sync + 'static {
    fn record(&self, entry: &AccessEntry);
}

/// Emits one `tracing` event per request, levelled by status class.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl AccessSink for TracingSink {
    fn record(&self, e: &AccessEntry) {
        let latency_ms = e.latency.as_secs_f64() * 1000.0;
        let request_id = e.request_id.as_deref().unwrap_or("-");
        match e.status {
            500..=u16::MAX => error!(
                target: "recall::access",
                method = %e.method, path = %e.path, status = e.status, latency_ms,
                request_id, remote = %e.remote_addr, recovered = e.recovered,
                "request failed"
            ),
            400..=499 => warn!(
                target: "recall::access",
                method = %e.method, path = %e.path, status = e.status, latency_ms,
                request_id, remote = %e.remote_addr,
                "request rejected"
            ),
            _ => info!(
                target: "recall::access",
                method = %e.method, path = %e.path, status = e.status, latency_ms,
                request_id, remote = %e.remote_addr,
                "request completed"
            ),
        }
    }
}

/// Access-log stage.
pub struct AccessLog {
    sink: Arc<dyn AccessSink>,
}

impl AccessLog {
    pub fn new(sink: Arc<dyn AccessSink>) -> Self {
        Self { sink }
    }
}

impl Middleware for AccessLog {
    fn name(&self) -> &'static str { "access_log" }

    fn handle<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a> {
        Box::pin(async move {
            let started = Instant::now();
            let method = req.method().to_string();
            let path = req.path().to_owned();
            let remote_addr = req.remote_addr();

            let res = next.run(req).await;

            self.sink.record(&AccessEntry {
                method,
                path,
                status: res.status_code().as_u16(),
                latency: started.elapsed(),
                request_id: res.header(REQUEST_ID_HEADER).map(str::to_owned),
                remote_addr,
                recovered: res.recovered,
            });
            res
        })
    }
}
