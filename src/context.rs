//! Per-request context.
//!
//! One [`Context`] is created for every matched request and threaded through
//! every interceptor and the handler, in order. It owns the inbound request,
//! the outbound [`Response`] and a small scratch map interceptors can use to
//! pass values to each other.

use std::any::Any;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue, InvalidHeaderName, InvalidHeaderValue};
use http::request::Parts;
use http::{Method, StatusCode, Uri};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::config::Config;
use crate::error::BoxError;
use crate::response::{ContentType, Response};

/// Type-erased request body.
pub(crate) type Body = UnsyncBoxBody<Bytes, BoxError>;

pub(crate) fn box_body<B>(body: B) -> Body
where
    B: hyper::body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    body.map_err(|e| -> BoxError { e.into() }).boxed_unsync()
}

/// Peer address, attached to each request by [`Server`](crate::Server).
#[derive(Clone, Copy, Debug)]
pub(crate) struct RemoteAddr(pub(crate) SocketAddr);

/// Errors from the [`Context`] body and header helpers.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("request body already consumed")]
    BodyConsumed,

    #[error("reading request body: {0}")]
    Body(#[source] BoxError),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    HeaderName(#[from] InvalidHeaderName),

    #[error(transparent)]
    HeaderValue(#[from] InvalidHeaderValue),
}

/// The state of one request as it moves through the interceptor chain.
pub struct Context {
    parts: Parts,
    body: Option<Body>,
    params: HashMap<String, String>,
    route_path: Arc<str>,
    response: Response,
    data: HashMap<String, Box<dyn Any + Send + Sync>>,
    config: Arc<Config>,
}

impl Context {
    pub(crate) fn new(
        parts: Parts,
        body: Body,
        params: HashMap<String, String>,
        route_path: Arc<str>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            parts,
            body: Some(body),
            params,
            route_path,
            response: Response::new(),
            data: HashMap::new(),
            config,
        }
    }

    pub(crate) fn into_response(self) -> Response {
        self.response
    }

    // ── Request ───────────────────────────────────────────────────────────────

    pub fn method(&self) -> &Method { &self.parts.method }
    pub fn uri(&self) -> &Uri { &self.parts.uri }
    pub fn path(&self) -> &str { self.parts.uri.path() }
    pub fn query(&self) -> Option<&str> { self.parts.uri.query() }
    pub fn headers(&self) -> &HeaderMap { &self.parts.headers }

    /// Case-insensitive header lookup. Values that are not visible ASCII are
    /// reported as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.parts.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// First value of a form-urlencoded query parameter, percent-decoded.
    pub fn query_param(&self, name: &str) -> Option<String> {
        let query = self.query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.parts.extensions.get::<RemoteAddr>().map(|addr| addr.0)
    }

    /// Returns a named path variable.
    ///
    /// For a route `/users/{id}`, `cx.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    /// Absolute path template of the matched route, e.g. `/files/{*rest}`.
    pub fn route_path(&self) -> &str {
        &self.route_path
    }

    /// The part of the request path beyond the route's static mount point.
    ///
    /// For the route `/static/{*file}` and the request `/static/css/site.css`
    /// this is `css/site.css`. Routes without variables yield `""`.
    pub fn extra_path(&self) -> &str {
        let mount = self.route_path.split('{').next().unwrap_or_default();
        self.path().strip_prefix(mount).unwrap_or_default()
    }

    // ── Body ──────────────────────────────────────────────────────────────────

    /// Reads the whole request body. The body can be read once; later calls
    /// fail with [`ContextError::BodyConsumed`].
    pub async fn read_body(&mut self) -> Result<Bytes, ContextError> {
        let body = self.body.take().ok_or(ContextError::BodyConsumed)?;
        let collected = body.collect().await.map_err(ContextError::Body)?;
        Ok(collected.to_bytes())
    }

    pub async fn decode_json<T: DeserializeOwned>(&mut self) -> Result<T, ContextError> {
        let bytes = self.read_body().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Decodes an `application/x-www-form-urlencoded` body. Repeated keys
    /// keep the last value.
    pub async fn decode_form(&mut self) -> Result<HashMap<String, String>, ContextError> {
        let bytes = self.read_body().await?;
        Ok(url::form_urlencoded::parse(&bytes).into_owned().collect())
    }

    // ── Response ──────────────────────────────────────────────────────────────

    pub fn response(&self) -> &Response { &self.response }
    pub fn response_mut(&mut self) -> &mut Response { &mut self.response }

    pub fn set_status(&mut self, status: StatusCode) {
        self.response.set_status(status);
    }

    pub fn set_header(&mut self, name: &str, value: &str) -> Result<(), ContextError> {
        let name = HeaderName::try_from(name)?;
        let value = HeaderValue::try_from(value)?;
        self.response.headers_mut().insert(name, value);
        Ok(())
    }

    pub fn write(&mut self, bytes: &[u8]) {
        self.response.write(bytes);
    }

    /// Appends text. Sets `text/plain` if no content type was chosen yet.
    pub fn write_str(&mut self, text: &str) {
        if !self.response.headers().contains_key(http::header::CONTENT_TYPE) {
            self.response.set_content_type(ContentType::Text);
        }
        self.response.write(text.as_bytes());
    }

    /// Serializes `value` as the JSON body. Pretty-printed in debug mode.
    pub fn write_json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), ContextError> {
        let body = if self.config.is_debug() {
            serde_json::to_vec_pretty(value)?
        } else {
            serde_json::to_vec(value)?
        };
        self.response.set_content_type(ContentType::Json);
        self.response.write(&body);
        Ok(())
    }

    /// Writes an already-serialized XML document.
    pub fn write_xml(&mut self, xml: &[u8]) {
        self.response.set_content_type(ContentType::Xml);
        self.response.write(xml);
    }

    // ── Scratch data ──────────────────────────────────────────────────────────

    /// Stores a value for later interceptors of the same request.
    pub fn insert_data<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.data.insert(key.into(), Box::new(value));
    }

    /// `None` if the key is missing or holds a different type.
    pub fn data<T: Any>(&self, key: &str) -> Option<&T> {
        self.data.get(key)?.downcast_ref()
    }

    /// Removes and returns the value if it has type `T`; otherwise leaves it.
    pub fn remove_data<T: Any>(&mut self, key: &str) -> Option<T> {
        if !self.data.get(key)?.is::<T>() {
            return None;
        }
        self.data.remove(key)?.downcast().ok().map(|value| *value)
    }

    /// Immutable copy of the request metadata, safe to move into a task that
    /// outlives the request.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            method: self.parts.method.clone(),
            uri: self.parts.uri.clone(),
            headers: self.parts.headers.clone(),
            route_path: Arc::clone(&self.route_path),
            params: self.params.clone(),
            status: self.response.status(),
            remote_addr: self.remote_addr(),
        }
    }
}

/// What an `after_async` interceptor gets to see of a finished request.
#[derive(Clone, Debug)]
pub struct Snapshot {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    route_path: Arc<str>,
    params: HashMap<String, String>,
    status: StatusCode,
    remote_addr: Option<SocketAddr>,
}

impl Snapshot {
    pub fn method(&self) -> &Method { &self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn route_path(&self) -> &str { &self.route_path }
    pub fn param(&self, name: &str) -> Option<&str> { self.params.get(name).map(String::as_str) }
    pub fn status(&self) -> StatusCode { self.status }
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.remote_addr }
}

#[cfg(test)]
mod tests {
    use http_body_util::Full;

    use super::*;

    fn context(uri: &str, route: &str, body: &'static str, config: Config) -> Context {
        let (parts, body) = http::Request::builder()
            .uri(uri)
            .header("X-Token", "abc")
            .body(Full::new(Bytes::from_static(body.as_bytes())))
            .unwrap()
            .into_parts();
        let params = HashMap::from([("id".to_owned(), "42".to_owned())]);
        Context::new(parts, box_body(body), params, Arc::from(route), Arc::new(config))
    }

    #[tokio::test]
    async fn body_can_be_read_once() {
        let mut cx = context("/", "/", "hello", Config::new());
        assert_eq!(cx.read_body().await.unwrap(), "hello");
        assert!(matches!(cx.read_body().await, Err(ContextError::BodyConsumed)));
    }

    #[tokio::test]
    async fn decodes_form_bodies() {
        let mut cx = context("/", "/", "name=ada+lovelace&lang=en", Config::new());
        let form = cx.decode_form().await.unwrap();
        assert_eq!(form["name"], "ada lovelace");
        assert_eq!(form["lang"], "en");
    }

    #[test]
    fn extra_path_is_relative_to_the_mount_point() {
        let cx = context("/static/css/site.css", "/static/{*file}", "", Config::new());
        assert_eq!(cx.extra_path(), "css/site.css");

        let cx = context("/about", "/about", "", Config::new());
        assert_eq!(cx.extra_path(), "");
    }

    #[test]
    fn request_accessors() {
        let cx = context("/users/42?sort=name%20desc&x=1", "/users/{id}", "", Config::new());
        assert_eq!(cx.param("id"), Some("42"));
        assert_eq!(cx.header("x-token"), Some("abc"));
        assert_eq!(cx.query_param("sort").as_deref(), Some("name desc"));
        assert_eq!(cx.query_param("missing"), None);
        assert_eq!(cx.remote_addr(), None);
    }

    #[test]
    fn scratch_data_is_typed() {
        let mut cx = context("/", "/", "", Config::new());
        cx.insert_data("user", 7_u32);
        assert_eq!(cx.data::<u32>("user"), Some(&7));
        assert_eq!(cx.data::<String>("user"), None);
        assert_eq!(cx.remove_data::<String>("user"), None);
        assert_eq!(cx.remove_data::<u32>("user"), Some(7));
        assert_eq!(cx.data::<u32>("user"), None);
    }

    #[test]
    fn write_json_pretty_prints_in_debug_mode() {
        let value = serde_json::json!({"a": 1});

        let mut cx = context("/", "/", "", Config::new());
        cx.write_json(&value).unwrap();
        assert_eq!(cx.response().body(), br#"{"a":1}"#);

        let mut cx = context("/", "/", "", Config::new().debug(true));
        cx.write_json(&value).unwrap();
        assert_eq!(cx.response().body(), b"{\n  \"a\": 1\n}");
        assert_eq!(
            cx.response().headers()[http::header::CONTENT_TYPE],
            ContentType::Json.as_str()
        );
    }
}
