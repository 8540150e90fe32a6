//! Outgoing HTTP response buffer.
//!
//! Handlers never build a response from scratch: every [`Context`] owns one
//! `Response`, handlers and interceptors write into it, and the dispatcher
//! hands it to hyper once the pipeline is done.
//!
//! [`Context`]: crate::Context

use bytes::{Bytes, BytesMut};
use http::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use http::StatusCode;
use http_body_util::Full;
use tracing::warn;

use crate::failure::Failure;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values for use with [`Response::set_content_type`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContentType {
    Csv,          // text/csv
    EventStream,  // text/event-stream  (SSE)
    FormData,     // application/x-www-form-urlencoded
    Html,         // text/html; charset=utf-8
    Json,         // application/json; charset=utf-8
    OctetStream,  // application/octet-stream  (binary / file download)
    Text,         // text/plain; charset=utf-8
    Xml,          // application/xml; charset=utf-8
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csv         => "text/csv",
            Self::EventStream => "text/event-stream",
            Self::FormData    => "application/x-www-form-urlencoded",
            Self::Html        => "text/html; charset=utf-8",
            Self::Json        => "application/json; charset=utf-8",
            Self::OctetStream => "application/octet-stream",
            Self::Text        => "text/plain; charset=utf-8",
            Self::Xml         => "application/xml; charset=utf-8",
        }
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

/// The response being built for the current request. Starts as an empty
/// `200 OK`.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: BytesMut,
}

impl Response {
    pub(crate) fn new() -> Self {
        Self { status: StatusCode::OK, headers: HeaderMap::new(), body: BytesMut::new() }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn set_content_type(&mut self, content_type: ContentType) {
        self.headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type.as_str()));
    }

    /// Bytes written so far.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Appends to the body.
    pub fn write(&mut self, bytes: &[u8]) {
        self.body.extend_from_slice(bytes);
    }

    /// Back to an empty `200 OK` with no headers.
    pub fn reset(&mut self) {
        self.status = StatusCode::OK;
        self.headers.clear();
        self.body.clear();
    }

    /// Replaces whatever was buffered with the rendering of `failure`.
    ///
    /// If the failure cannot render itself (serialization error or a content
    /// type that is not a valid header value) the response degrades to
    /// `500 text/plain` carrying the failure's display text.
    pub(crate) fn render_failure(&mut self, failure: &Failure) {
        self.reset();

        let rendered = failure.render_body().map_err(|e| e.to_string()).and_then(|body| {
            HeaderValue::from_str(failure.content_type())
                .map(|ct| (ct, body))
                .map_err(|e| e.to_string())
        });

        match rendered {
            Ok((content_type, body)) => {
                self.status = failure.status_code();
                self.headers.insert(CONTENT_TYPE, content_type);
                self.body.extend_from_slice(&body);
            }
            Err(reason) => {
                warn!(%failure, %reason, "error rendering failed, falling back to text/plain");
                self.status = StatusCode::INTERNAL_SERVER_ERROR;
                self.set_content_type(ContentType::Text);
                self.body.extend_from_slice(failure.to_string().as_bytes());
            }
        }
    }

    pub(crate) fn into_http(self) -> http::Response<Full<Bytes>> {
        let mut res = http::Response::new(Full::new(self.body.freeze()));
        *res.status_mut() = self.status;
        *res.headers_mut() = self.headers;
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::failure::HttpError;

    #[derive(Debug)]
    struct Unrenderable;

    impl std::fmt::Display for Unrenderable {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("cannot render me")
        }
    }

    impl HttpError for Unrenderable {
        fn status_code(&self) -> StatusCode {
            StatusCode::CONFLICT
        }

        fn content_type(&self) -> &str {
            "application/json"
        }

        fn render_body(&self) -> Result<Vec<u8>, BoxError> {
            Err("serializer exploded".into())
        }
    }

    #[test]
    fn render_failure_discards_buffered_output() {
        let mut res = Response::new();
        res.set_content_type(ContentType::Html);
        res.write(b"<p>half a page");

        res.render_failure(&Failure::json(StatusCode::FORBIDDEN, "no"));

        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        assert_eq!(res.headers()[CONTENT_TYPE], ContentType::Json.as_str());
        assert_eq!(res.body(), br#"{"errorCode":403,"errorMessage":"no"}"#);
    }

    #[test]
    fn render_failure_falls_back_when_body_cannot_render() {
        let mut res = Response::new();
        res.render_failure(&Failure::http(Unrenderable));

        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.headers()[CONTENT_TYPE], ContentType::Text.as_str());
        assert_eq!(res.body(), b"cannot render me");
    }
}
