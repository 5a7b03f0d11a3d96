//! # recall
//!
//! The HTTP front door of a conversational-memory service. recall owns what
//! happens between the socket and the business logic:
//!
//! - the listener, with a fixed 5 s header-read timeout
//! - the middleware chain: access log → panic recovery → request id →
//!   client IP → `/healthz` → (optional) bearer-token gate
//! - the route tree under `/api/v1/sessions/{sessionId}`
//!
//! Sessions, memory and search themselves live behind the [`Resources`]
//! trait. recall never looks inside a session id or a request body.
//!
//! ## Routes
//!
//! | Method | Path | Collaborator |
//! |---|---|---|
//! | GET | `/api/v1/sessions/{sessionId}` | [`Resources::get_session`] |
//! | POST | `/api/v1/sessions/{sessionId}` | [`Resources::post_session`] |
//! | GET | `/api/v1/sessions/{sessionId}/memory` | [`Resources::get_memory`] |
//! | POST | `/api/v1/sessions/{sessionId}/memory` | [`Resources::post_memory`] |
//! | DELETE | `/api/v1/sessions/{sessionId}/memory` | [`Resources::delete_memory`] |
//! | POST | `/api/v1/sessions/{sessionId}/search` | [`Resources::search_memory`] |
//!
//! A known path with the wrong method is a `405`; anything else unmatched is
//! a `404`. With `auth.required` set, everything except `/healthz` needs a
//! valid HS256 bearer token and answers a uniform `401` otherwise.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use recall::{AppState, Config, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), recall::Error> {
//!     let state = Arc::new(AppState::new(Config::default(), MyResources::connect().await));
//!     Server::new(state)?.serve().await
//! }
//! ```

mod config;
mod error;
mod handler;
mod method;
mod request;
mod response;
mod router;
mod routes;
mod server;
mod state;

pub mod middleware;

pub use config::{AuthConfig, Config, ServerConfig};
pub use error::Error;
pub use handler::{BoxFuture, Handler};
pub use method::Method;
pub use request::{BoxError, Claims, Request};
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use router::{DEFAULT_BODY_LIMIT, Router};
pub use routes::{App, HEALTH_PATH, SESSION_ID};
pub use server::{READ_HEADER_TIMEOUT, Server};
pub use state::{AppState, Resources};
