//! HTTP server and graceful shutdown.
//!
//! # Slow clients
//!
//! Every connection gets [`READ_HEADER_TIMEOUT`] to send its first byte. A
//! client that connects and stays silent is dropped before protocol
//! detection starts. Over HTTP/1 the same limit then covers each request's
//! header block, so a client that trickles bytes is cut off too. HTTP/2
//! framing has no per-request header deadline; only the first-byte limit
//! applies there. The value is fixed; it is not configuration.
//!
//! # Graceful shutdown
//!
//! On **SIGTERM** or **SIGINT** the server:
//! 1. Immediately stops `listener.accept()` — no new connections are made.
//! 2. Lets every in-flight connection task run to completion.
//! 3. Returns from [`Server::serve`], which lets `main` exit cleanly.

use std::convert::Infallible;
use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::error::Error;
use crate::middleware::TracingSink;
use crate::routes::App;
use crate::state::{AppState, Resources};

/// Time a client has to send its complete request headers.
pub const READ_HEADER_TIMEOUT: Duration = Duration::from_secs(5);

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
    app: Arc<App>,
}

impl Server {
    /// Assembles the app from `state` and targets `0.0.0.0:<server.port>`.
    ///
    /// Nothing is bound yet; that happens in [`serve`](Server::serve).
    /// Access entries go to `tracing` through [`TracingSink`].
    ///
    /// # Errors
    ///
    /// Whatever [`App::new`] rejects.
    pub fn new<R: Resources>(state: Arc<AppState<R>>) -> Result<Self, Error> {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, state.config.server.port));
        let app = App::new(state, Arc::new(TracingSink))?;
        Ok(Self::with_app(addr, app))
    }

    /// Serves an already assembled `app` on `addr`.
    pub fn with_app(addr: SocketAddr, app: App) -> Self {
        Self { addr, app: Arc::new(app) }
    }

    /// The address [`serve`](Server::serve) binds to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Binds the listener and serves until SIGTERM / Ctrl-C.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] when the address cannot be bound (port in use, no
    /// permission). There is no retry.
    pub async fn serve(self) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr).await?;
        self.run(listener).await
    }

    /// Serves on an already bound listener until SIGTERM / Ctrl-C.
    pub async fn run(self, listener: TcpListener) -> Result<(), Error> {
        self.run_until(listener, shutdown_signal()).await
    }

    /// Serves on `listener` until `shutdown` resolves, then drains.
    pub async fn run_until(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        let local = listener.local_addr()?;
        info!(addr = %local, "recall listening");

        let mut conn = ConnBuilder::new(TokioExecutor::new());
        conn.http1()
            .timer(TokioTimer::new())
            .header_read_timeout(READ_HEADER_TIMEOUT);
        let conn = Arc::new(conn);

        // JoinSet tracks every spawned connection task so we can wait for
        // them all to finish during graceful shutdown.
        let mut tasks = tokio::task::JoinSet::new();

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Shutdown first, so a signal stops accepting even with a backlog.
                biased;

                () = &mut shutdown => {
                    let in_flight = tasks.len();
                    info!(in_flight, "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let app = Arc::clone(&self.app);
                    let conn = Arc::clone(&conn);

                    tasks.spawn(async move {
                        // Protocol detection waits on the first byte with no
                        // deadline of its own.
                        let mut first = [0u8; 1];
                        let peeked = stream.peek(&mut first);
                        match tokio::time::timeout(READ_HEADER_TIMEOUT, peeked).await {
                            Ok(Ok(n)) if n > 0 => {}
                            Ok(Ok(_)) => return,
                            Ok(Err(e)) => {
                                debug!(peer = %remote_addr, "connection lost before request: {e}");
                                return;
                            }
                            Err(_) => {
                                debug!(peer = %remote_addr, "no request within header timeout");
                                return;
                            }
                        }
                        let io = TokioIo::new(stream);

                        // Called once per request on the connection.
                        let svc = service_fn(move |req| {
                            let app = Arc::clone(&app);
                            async move { Ok::<_, Infallible>(app.call(req, remote_addr).await) }
                        });

                        // HTTP/1.1 or HTTP/2, whatever the client speaks.
                        if let Err(e) = conn.serve_connection(io, svc).await {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished tasks so the JoinSet stays bounded.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("recall stopped");
        Ok(())
    }
}

/// Resolves on the first shutdown signal the process receives.
///
/// On Unix this listens for both **SIGTERM** and **SIGINT** (Ctrl-C).
/// On other platforms only Ctrl-C is available. A handler that cannot be
/// installed is logged and treated as never firing.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c  => {}
        () = sigterm => {}
    }
}
