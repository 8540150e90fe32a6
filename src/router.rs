//! Route tree declaration and the compiled request entry point.
//!
//! A [`Router`] collects declared root routes and configuration. Compiling it
//! once produces a [`Service`]: read-only, cheap to clone and shared by every
//! connection task without locking.

use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;
use tracing::info;

use crate::compile::{self, Registration, RouteTable};
use crate::config::Config;
use crate::context::{self, Context};
use crate::error::{BoxError, Error};
use crate::response::Response;
use crate::route::Route;
use crate::server::Server;

/// The application: declared root routes plus configuration.
#[derive(Debug, Default)]
pub struct Router {
    roots: Vec<Route>,
    config: Config,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Declares a root. Unlike a child, a root's segment is the start of every
    /// path below it, and roots are ordered by depth before compilation.
    pub fn route(mut self, root: Route) -> Self {
        self.roots.push(root);
        self
    }

    /// Flattens every declared tree into the matcher. Can be called more than
    /// once; the tree is only borrowed.
    pub fn compile(&self) -> Result<Service, Error> {
        let table = compile::compile(&self.roots)?;
        info!(routes = table.registrations().len(), "route tree compiled");
        Ok(Service { table: Arc::new(table), config: Arc::new(self.config.clone()) })
    }

    /// Compiles the routes, then serves them on `addr` until SIGTERM / Ctrl-C.
    pub async fn listen_and_serve(self, addr: &str) -> Result<(), Error> {
        let service = self.compile()?;
        Server::bind(addr)?.serve(service).await
    }
}

/// A compiled router, ready to answer requests.
#[derive(Clone)]
pub struct Service {
    table: Arc<RouteTable>,
    config: Arc<Config>,
}

impl Service {
    /// Every flattened `(method, path)` pair, in registration order.
    pub fn registrations(&self) -> &[Registration] {
        self.table.registrations()
    }

    /// Routes one request and produces exactly one response. Unmatched
    /// requests get an empty `404` without running any interceptor.
    pub async fn handle<B>(&self, req: http::Request<B>) -> http::Response<Full<Bytes>>
    where
        B: hyper::body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = req.into_parts();

        let Some((endpoint, params)) = self.table.lookup(&parts.method, parts.uri.path()) else {
            if self.config.is_debug() {
                info!(method = %parts.method, path = %parts.uri.path(), status = 404, "request");
            }
            let mut res = Response::new();
            res.set_status(StatusCode::NOT_FOUND);
            return res.into_http();
        };

        let mut cx = Context::new(
            parts,
            context::box_body(body),
            params,
            Arc::clone(endpoint.route_path()),
            Arc::clone(&self.config),
        );
        endpoint.dispatch(&mut cx).await;

        if self.config.is_debug() {
            info!(
                method = %cx.method(),
                peer = ?cx.remote_addr(),
                path = %cx.path(),
                status = cx.response().status().as_u16(),
                "request"
            );
        }

        cx.into_response().into_http()
    }
}
