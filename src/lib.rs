//! # canopy
//!
//! Nested route trees with inherited interceptors, on top of hyper.
//!
//! Routes are declared as a tree. Every node contributes a path segment,
//! handlers keyed by HTTP method, and interceptors that apply to the node
//! *and every descendant*:
//!
//! - **before**: runs ahead of the handler; a failure skips the handler.
//! - **after**: runs after a successful handler; failures are only logged.
//! - **after_async**: spawned once the request succeeded, never awaited.
//! - **error**: runs when a `before` interceptor or the handler fails.
//! - **recover**: sees the raw payload when the handler panics.
//!
//! The tree is compiled once into one radix tree per method via [`matchit`];
//! after that it is read-only and shared by every connection.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use canopy::{Config, Context, Failure, HandlerFuture, Route, Router, StatusCode};
//! use futures::FutureExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), canopy::Error> {
//!     Router::new()
//!         .config(Config::from_env())
//!         .route(
//!             Route::new("/").child(
//!                 Route::new("/user")
//!                     .get(|cx| async move { cx.write_str("/user"); Ok(()) }.boxed())
//!                     .child(Route::new("/{id}").get(get_user).before(require_auth)),
//!             ),
//!         )
//!         .listen_and_serve("0.0.0.0:3000")
//!         .await
//! }
//!
//! fn get_user(cx: &mut Context) -> HandlerFuture<'_> {
//!     async move {
//!         let id = cx.param("id").unwrap_or_default().to_owned();
//!         cx.write_str(&format!("/user/{id}"));
//!         Ok(())
//!     }
//!     .boxed()
//! }
//!
//! fn require_auth(cx: &mut Context) -> HandlerFuture<'_> {
//!     async move {
//!         match cx.header("auth") {
//!             Some(_) => Ok(()),
//!             None => Err(Failure::json(StatusCode::UNAUTHORIZED, "missing Auth header")),
//!         }
//!     }
//!     .boxed()
//! }
//! ```

mod compile;
mod config;
mod context;
mod dispatch;
mod error;
mod failure;
mod interceptor;
mod response;
mod route;
mod router;
mod server;

pub mod handler;

pub use compile::Registration;
pub use config::Config;
pub use context::{Context, ContextError, Snapshot};
pub use error::{BoxError, Error};
pub use failure::{Failure, HttpError, JsonError, Outcome, XmlError};
pub use handler::HandlerFuture;
pub use http::{Method, StatusCode};
pub use response::{ContentType, Response};
pub use route::{Route, route};
pub use router::{Router, Service};
pub use server::Server;
