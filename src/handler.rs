//! Handler and interceptor function types, and their type erasure.
//!
//! # How handlers are stored
//!
//! A [`Route`](crate::Route) holds handlers and interceptors of *different*
//! closure types in a single table. Rust collections can only hold one
//! concrete type, so every function is moved into an `Arc<dyn Fn …>` when it
//! is registered and stored uniformly from then on.
//!
//! Handlers borrow the request [`Context`] mutably for the duration of their
//! future, which is why they return a [`HandlerFuture<'a>`] tied to that
//! borrow instead of an `impl Future`:
//!
//! ```rust
//! use canopy::{Context, HandlerFuture};
//! use futures::FutureExt;
//!
//! fn get_user(cx: &mut Context) -> HandlerFuture<'_> {
//!     async move {
//!         let id = cx.param("id").unwrap_or("unknown").to_owned();
//!         cx.write_str(&format!("user {id}"));
//!         Ok(())
//!     }
//!     .boxed()
//! }
//! ```
//!
//! Closures follow the same shape: `|cx| async move { … }.boxed()`.
//!
//! The only runtime cost per call is **one virtual call** and **one boxed
//! future**, negligible next to network I/O.

use std::any::Any;
use std::sync::Arc;

use futures::future::{self, BoxFuture, FutureExt};

use crate::context::{Context, Snapshot};
use crate::failure::{Failure, Outcome};

/// Future returned by handlers and synchronous-phase interceptors.
pub type HandlerFuture<'a> = BoxFuture<'a, Outcome>;

/// Leaf handlers, `before` and `after` interceptors.
pub(crate) type BoxedHandler =
    Arc<dyn for<'a> Fn(&'a mut Context) -> HandlerFuture<'a> + Send + Sync + 'static>;

/// `error` interceptors: receive the failure that ended the request.
pub(crate) type BoxedErrorHandler =
    Arc<dyn for<'a> Fn(&'a mut Context, &'a Failure) -> HandlerFuture<'a> + Send + Sync + 'static>;

/// Recoverers run synchronously with the raw panic payload.
pub(crate) type BoxedRecoverer =
    Arc<dyn Fn(&Context, &(dyn Any + Send)) -> Outcome + Send + Sync + 'static>;

/// `after_async` interceptors own their input: they outlive the request.
pub(crate) type BoxedAsyncInterceptor =
    Arc<dyn Fn(Arc<Snapshot>) -> BoxFuture<'static, Outcome> + Send + Sync + 'static>;

fn handler_fn<F>(f: F) -> F
where
    F: for<'a> Fn(&'a mut Context) -> HandlerFuture<'a> + Send + Sync + 'static,
{
    f
}

/// Adapts a function returning the response body as a string into a handler.
///
/// ```rust
/// use canopy::{Route, handler};
///
/// let ping = Route::new("/ping").get(handler::simple(|_| "pong".to_owned()));
/// ```
pub fn simple<F>(
    f: F,
) -> impl for<'a> Fn(&'a mut Context) -> HandlerFuture<'a> + Send + Sync + 'static
where
    F: Fn(&Context) -> String + Send + Sync + 'static,
{
    handler_fn(move |cx| {
        let body = f(&*cx);
        cx.write_str(&body);
        future::ready(Ok(())).boxed()
    })
}
