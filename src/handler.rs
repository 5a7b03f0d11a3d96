//! Route handlers.
//!
//! A [`Resources`](crate::Resources) implementation is asked once per route,
//! while [`App::new`](crate::App::new) builds the tree, for the handler that
//! will serve it. Each answer is a closure over the shared `AppState`, and
//! every closure has its own type, so the router keeps them as
//! [`BoxedHandler`]s: `Resources::post_memory(state)` is boxed by
//! [`Handler::into_boxed_handler`] at registration, and a matched request
//! later goes through [`ErasedHandler::call`] with its body already read.
//!
//! The state is captured at assembly. Nothing is looked up per request.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// Boxed future yielding a [`Response`].
///
/// A handler's future owns everything it touches (`'static`); a middleware
/// stage's future may borrow the pipeline for `'a`.
pub type BoxFuture<'a> = Pin<Box<dyn Future<Output = Response> + Send + 'a>>;

/// Object-safe face of a handler, as the router stores it.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture<'static>;
}

/// One registered route's handler, shared by every request that matches it.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

/// What a [`Resources`](crate::Resources) factory returns.
///
/// Any `Fn(Request) -> impl Future<Output = impl IntoResponse>` that can be
/// shared across tasks qualifies. Sealed.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(Erased(self))
    }
}

struct Erased<F>(F);

impl<F, Fut, R> ErasedHandler for Erased<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture<'static> {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_response() })
    }
}
