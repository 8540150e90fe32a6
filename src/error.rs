//! Unified error type.

use http::Method;
use thiserror::Error;

/// A boxed error, used wherever the concrete source type is not known.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by canopy's fallible operations.
///
/// Application-level errors (401, 404, 422, etc.) are expressed as
/// [`Failure`](crate::Failure) values returned from handlers, not as `Error`s.
/// This type surfaces infrastructure failures: compiling the route tree,
/// binding to a port or accepting a connection.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid socket address `{addr}`: {source}")]
    Addr {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },

    /// The matcher rejected a flattened route, usually because two nodes
    /// resolve to the same `(method, path)` pair.
    #[error("invalid route {method} `{path}`: {source}")]
    Route {
        method: Method,
        path: String,
        #[source]
        source: matchit::InsertError,
    },
}
