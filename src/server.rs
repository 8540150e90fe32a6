//! Serving a compiled [`Service`] over TCP.
//!
//! Each accepted connection gets its own task speaking HTTP/1.1 or HTTP/2
//! (negotiated by hyper-util's auto builder). On shutdown the server stops
//! accepting, waits for the open connections to finish and returns.
//!
//! `after_async` interceptors are plain tokio tasks and are not tracked here:
//! they keep running until the runtime itself shuts down.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;

use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::context::RemoteAddr;
use crate::error::Error;
use crate::router::Service;

enum Bind {
    Addr(SocketAddr),
    Listener(TcpListener),
}

/// The HTTP server.
pub struct Server {
    bind: Bind,
}

impl Server {
    /// Parses `addr`; the socket is opened when serving starts.
    ///
    /// ```rust
    /// use canopy::Server;
    /// assert!(Server::bind("0.0.0.0:3000").is_ok());
    /// assert!(Server::bind("not an address").is_err());
    /// ```
    pub fn bind(addr: &str) -> Result<Self, Error> {
        let addr = addr.parse().map_err(|source| Error::Addr { addr: addr.to_owned(), source })?;
        Ok(Self { bind: Bind::Addr(addr) })
    }

    /// Serves on a listener that is already bound, e.g. one on port 0.
    pub fn from_listener(listener: TcpListener) -> Self {
        Self { bind: Bind::Listener(listener) }
    }

    /// Serves until SIGTERM or Ctrl-C, then drains open connections.
    pub async fn serve(self, service: Service) -> Result<(), Error> {
        self.serve_with_shutdown(service, shutdown_signal()).await
    }

    /// Serves until `signal` resolves, then drains open connections.
    pub async fn serve_with_shutdown<F>(self, service: Service, signal: F) -> Result<(), Error>
    where
        F: Future<Output = ()>,
    {
        let listener = match self.bind {
            Bind::Addr(addr) => TcpListener::bind(addr).await?,
            Bind::Listener(listener) => listener,
        };
        info!(addr = %listener.local_addr()?, "canopy listening");

        let mut connections = JoinSet::new();
        tokio::pin!(signal);

        loop {
            tokio::select! {
                // Shutdown takes priority over queued connections.
                biased;

                () = &mut signal => break,

                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        connections.spawn(serve_connection(stream, peer, service.clone()));
                    }
                    Err(e) => warn!("accept failed: {e}"),
                },

                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        info!(open = connections.len(), "shutting down, draining connections");
        while connections.join_next().await.is_some() {}
        info!("canopy stopped");
        Ok(())
    }
}

async fn serve_connection(stream: TcpStream, peer: SocketAddr, service: Service) {
    debug!(%peer, "connection accepted");
    let svc = service_fn(move |mut req: hyper::Request<Incoming>| {
        let service = service.clone();
        req.extensions_mut().insert(RemoteAddr(peer));
        async move { Ok::<_, Infallible>(service.handle(req).await) }
    });

    if let Err(e) = ConnBuilder::new(TokioExecutor::new())
        .serve_connection(TokioIo::new(stream), svc)
        .await
    {
        error!(%peer, "connection error: {e}");
    }
}

/// First of SIGTERM (Unix) or Ctrl-C. A handler that cannot be installed is
/// logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Ctrl-C received"),
        () = terminate => info!("SIGTERM received"),
    }
}
