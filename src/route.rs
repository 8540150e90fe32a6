//! Route declaration.
//!
//! A [`Route`] is one segment of a route tree. It owns its children, a
//! handler per HTTP method and the interceptors that apply to itself and to
//! every descendant:
//!
//! ```rust
//! use canopy::{Route, Router, Failure, StatusCode};
//! use futures::FutureExt;
//!
//! let app = Router::new().route(
//!     Route::new("/products")
//!         .get(|cx| async move { cx.write_str("all products"); Ok(()) }.boxed())
//!         .child(
//!             Route::new("/{id}")
//!                 .delete(|cx| async move { cx.set_status(StatusCode::NO_CONTENT); Ok(()) }.boxed())
//!                 .before(|cx| async move {
//!                     match cx.header("auth") {
//!                         Some(_) => Ok(()),
//!                         None => Err(Failure::json(StatusCode::UNAUTHORIZED, "unauthorized")),
//!                     }
//!                 }.boxed()),
//!         ),
//! );
//! ```
//!
//! Interceptors are inherited, never overridden: a `before` on `/products`
//! runs ahead of the one on `/products/{id}` for every request to the latter.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use http::Method;

use crate::context::{Context, Snapshot};
use crate::failure::{Failure, Outcome};
use crate::handler::{BoxedHandler, HandlerFuture};
use crate::interceptor::Interceptors;

/// Methods covered by [`Route::any`].
const STANDARD_METHODS: [Method; 7] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::PATCH,
    Method::OPTIONS,
    Method::HEAD,
];

/// Shorthand for [`Route::new`].
pub fn route(segment: impl Into<String>) -> Route {
    Route::new(segment)
}

/// A node of the route tree.
pub struct Route {
    pub(crate) segment: String,
    pub(crate) children: Vec<Route>,
    pub(crate) methods: Vec<(Method, BoxedHandler)>,
    pub(crate) interceptors: Interceptors,
}

impl Route {
    /// `segment` is a path template fragment such as `/users` or `/{id}`.
    /// It is appended verbatim to the parent's path.
    pub fn new(segment: impl Into<String>) -> Self {
        Self {
            segment: segment.into(),
            children: Vec::new(),
            methods: Vec::new(),
            interceptors: Interceptors::default(),
        }
    }

    pub fn segment(&self) -> &str {
        &self.segment
    }

    pub fn child(mut self, child: Route) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = Route>) -> Self {
        self.children.extend(children);
        self
    }

    // ── Method handlers ───────────────────────────────────────────────────────

    pub fn get<F>(self, handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> HandlerFuture<'a> + Send + Sync + 'static,
    {
        self.custom(Method::GET, handler)
    }

    pub fn post<F>(self, handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> HandlerFuture<'a> + Send + Sync + 'static,
    {
        self.custom(Method::POST, handler)
    }

    pub fn put<F>(self, handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> HandlerFuture<'a> + Send + Sync + 'static,
    {
        self.custom(Method::PUT, handler)
    }

    pub fn delete<F>(self, handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> HandlerFuture<'a> + Send + Sync + 'static,
    {
        self.custom(Method::DELETE, handler)
    }

    pub fn patch<F>(self, handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> HandlerFuture<'a> + Send + Sync + 'static,
    {
        self.custom(Method::PATCH, handler)
    }

    pub fn options<F>(self, handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> HandlerFuture<'a> + Send + Sync + 'static,
    {
        self.custom(Method::OPTIONS, handler)
    }

    pub fn head<F>(self, handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> HandlerFuture<'a> + Send + Sync + 'static,
    {
        self.custom(Method::HEAD, handler)
    }

    /// Registers `handler` for GET, POST, PUT, DELETE, PATCH, OPTIONS and HEAD.
    pub fn any<F>(mut self, handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> HandlerFuture<'a> + Send + Sync + 'static,
    {
        let handler: BoxedHandler = Arc::new(handler);
        for method in STANDARD_METHODS {
            self = self.insert(method, Arc::clone(&handler));
        }
        self
    }

    /// Registers a handler for any method, including extension methods built
    /// with [`Method::from_bytes`].
    pub fn custom<F>(self, method: Method, handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> HandlerFuture<'a> + Send + Sync + 'static,
    {
        self.insert(method, Arc::new(handler))
    }

    /// One handler per method: a second registration replaces the first but
    /// keeps its position.
    fn insert(mut self, method: Method, handler: BoxedHandler) -> Self {
        match self.methods.iter_mut().find(|(m, _)| *m == method) {
            Some(slot) => slot.1 = handler,
            None => self.methods.push((method, handler)),
        }
        self
    }

    // ── Interceptors ──────────────────────────────────────────────────────────

    /// Runs before the handler. A failure skips the handler and every
    /// remaining `before` interceptor, and goes to the `error` interceptors.
    pub fn before<F>(mut self, interceptor: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> HandlerFuture<'a> + Send + Sync + 'static,
    {
        self.interceptors.before.push(Arc::new(interceptor));
        self
    }

    /// Runs after a successful handler. A failure is logged and stops the
    /// remaining `after` interceptors; the response is sent regardless.
    pub fn after<F>(mut self, interceptor: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> HandlerFuture<'a> + Send + Sync + 'static,
    {
        self.interceptors.after.push(Arc::new(interceptor));
        self
    }

    /// Spawned after a successful request without being awaited. Receives a
    /// [`Snapshot`] of the request since the context is gone by then.
    pub fn after_async<F>(mut self, interceptor: F) -> Self
    where
        F: Fn(Arc<Snapshot>) -> BoxFuture<'static, Outcome> + Send + Sync + 'static,
    {
        self.interceptors.after_async.push(Arc::new(interceptor));
        self
    }

    /// Runs when a `before` interceptor or the handler fails. Declaring any
    /// `error` interceptor on the chain makes the interceptors responsible for
    /// the error response.
    pub fn error<F>(mut self, interceptor: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context, &'a Failure) -> HandlerFuture<'a> + Send + Sync + 'static,
    {
        self.interceptors.error.push(Arc::new(interceptor));
        self
    }

    /// Runs with the panic payload when the handler panics, before the
    /// `error` interceptors.
    pub fn recover<F>(mut self, recoverer: F) -> Self
    where
        F: Fn(&Context, &(dyn Any + Send)) -> Outcome + Send + Sync + 'static,
    {
        self.interceptors.recover.push(Arc::new(recoverer));
        self
    }

    /// Number of `/` in this node's own segment; orders declared roots.
    pub(crate) fn separator_count(&self) -> usize {
        self.segment.matches('/').count()
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("segment", &self.segment)
            .field("methods", &self.methods.iter().map(|(m, _)| m).collect::<Vec<_>>())
            .field("children", &self.children)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use futures::FutureExt;

    use super::*;

    fn methods(route: &Route) -> Vec<Method> {
        route.methods.iter().map(|(m, _)| m.clone()).collect()
    }

    #[test]
    fn reregistering_a_method_replaces_in_place() {
        let route = Route::new("/x")
            .get(|_| async { Ok(()) }.boxed())
            .post(|_| async { Ok(()) }.boxed())
            .get(|_| async { Ok(()) }.boxed());
        assert_eq!(methods(&route), [Method::GET, Method::POST]);
    }

    #[test]
    fn any_covers_the_standard_methods() {
        let route = Route::new("/x").any(|_| async { Ok(()) }.boxed());
        assert_eq!(methods(&route), STANDARD_METHODS);
    }

    #[test]
    fn custom_methods_are_kept() {
        let purge = Method::from_bytes(b"PURGE").unwrap();
        let route = Route::new("/cache").custom(purge.clone(), |_| async { Ok(()) }.boxed());
        assert_eq!(methods(&route), [purge]);
    }

    #[test]
    fn separator_count_counts_own_segment_only() {
        assert_eq!(Route::new("/").separator_count(), 1);
        assert_eq!(Route::new("/user/{id}").separator_count(), 2);
        assert_eq!(Route::new("api").child(Route::new("/a/b")).separator_count(), 0);
    }

    #[test]
    fn interceptors_accumulate_in_declaration_order() {
        let route = Route::new("/")
            .before(|_| async { Ok(()) }.boxed())
            .before(|_| async { Ok(()) }.boxed())
            .after(|_| async { Ok(()) }.boxed())
            .error(|_, _| async { Ok(()) }.boxed())
            .recover(|_, _| Ok(()))
            .after_async(|_| async { Ok(()) }.boxed());
        assert_eq!(route.interceptors.before.len(), 2);
        assert_eq!(route.interceptors.after.len(), 1);
        assert!(route.interceptors.has_error_interceptors());
        assert!(route.interceptors.has_after_async());
        assert_eq!(route.interceptors.recover.len(), 1);
    }
}
