//! Application state shared across all requests.

use std::sync::Arc;

use crate::config::Config;
use crate::handler::Handler;

/// Process-owned state: configuration plus the resource collaborators.
///
/// Wrapped in an `Arc` and handed to each collaborator once, at assembly.
/// The routing layer only ever reads it.
pub struct AppState<R> {
    pub config: Config,
    pub resources: R,
}

impl<R: Resources> AppState<R> {
    pub fn new(config: Config, resources: R) -> Self {
        Self { config, resources }
    }
}

/// The business logic behind the API routes.
///
/// Each function receives the shared state once, while the route tree is
/// being built, and returns the handler that serves every matching request.
/// The session identifier is available as [`Request::session_id`]; it is
/// passed through verbatim and never validated here.
///
/// ```rust
/// use std::sync::Arc;
/// use recall::{AppState, Handler, Request, Resources, Response};
///
/// struct Memory;
///
/// fn reply(name: &'static str) -> impl Handler {
///     move |req: Request| async move {
///         Response::text(format!("{name} {}", req.session_id().unwrap_or_default()))
///     }
/// }
///
/// impl Resources for Memory {
///     fn get_session(_: Arc<AppState<Self>>) -> impl Handler { reply("get_session") }
///     fn post_session(_: Arc<AppState<Self>>) -> impl Handler { reply("post_session") }
///     fn get_memory(_: Arc<AppState<Self>>) -> impl Handler { reply("get_memory") }
///     fn post_memory(_: Arc<AppState<Self>>) -> impl Handler { reply("post_memory") }
///     fn delete_memory(_: Arc<AppState<Self>>) -> impl Handler { reply("delete_memory") }
///     fn search_memory(_: Arc<AppState<Self>>) -> impl Handler { reply("search_memory") }
/// }
/// ```
///
/// [`Request::session_id`]: crate::Request::session_id
pub trait Resources: Send + Sync + Sized + 'static {
    /// `GET /api/v1/sessions/{sessionId}`
    fn get_session(state: Arc<AppState<Self>>) -> impl Handler;

    /// `POST /api/v1/sessions/{sessionId}`
    fn post_session(state: Arc<AppState<Self>>) -> impl Handler;

    /// `GET /api/v1/sessions/{sessionId}/memory`
    fn get_memory(state: Arc<AppState<Self>>) -> impl Handler;

    /// `POST /api/v1/sessions/{sessionId}/memory`
    fn post_memory(state: Arc<AppState<Self>>) -> impl Handler;

    /// `DELETE /api/v1/sessions/{sessionId}/memory`
    fn delete_memory(state: Arc<AppState<Self>>) -> impl Handler;

    /// `POST /api/v1/sessions/{sessionId}/search`
    fn search_memory(state: Arc<AppState<Self>>) -> impl Handler;
}
