//! Typed HTTP failures and how they are rendered.
//!
//! Every handler and interceptor returns an [`Outcome`]. When it fails, the
//! dispatcher only ever looks at the failure through the [`HttpError`]
//! capability: status code, content type and rendered body. Plain Rust errors
//! (anything implementing `std::error::Error`) convert into a [`Failure`]
//! through `?` and render as an opaque `500 text/plain` carrying their display
//! text.
//!
//! ```rust
//! use canopy::{Failure, StatusCode};
//!
//! let f = Failure::json(StatusCode::UNAUTHORIZED, "missing Auth header");
//! assert_eq!(f.status_code(), StatusCode::UNAUTHORIZED);
//! assert_eq!(
//!     f.render_body().unwrap(),
//!     br#"{"errorCode":401,"errorMessage":"missing Auth header"}"#,
//! );
//! ```

use std::any::Any;
use std::fmt;

use http::StatusCode;
use serde_json::json;
use thiserror::Error;

use crate::error::BoxError;

/// Result of a handler or interceptor.
pub type Outcome = Result<(), Failure>;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const APPLICATION_JSON: &str = "application/json; charset=utf-8";
const APPLICATION_XML: &str = "application/xml; charset=utf-8";

// ── Capability ────────────────────────────────────────────────────────────────

/// An error that knows how to present itself to an HTTP client.
///
/// Implement this on your own type to control the error body completely, then
/// return it with [`Failure::http`]:
///
/// ```rust
/// use canopy::{BoxError, Failure, HttpError, StatusCode};
///
/// #[derive(Debug)]
/// struct Teapot;
///
/// impl std::fmt::Display for Teapot {
///     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
///         f.write_str("short and stout")
///     }
/// }
///
/// impl HttpError for Teapot {
///     fn status_code(&self) -> StatusCode { StatusCode::IM_A_TEAPOT }
///     fn content_type(&self) -> &str { "text/html" }
///     fn render_body(&self) -> Result<Vec<u8>, BoxError> {
///         Ok(b"<h1>short and stout</h1>".to_vec())
///     }
/// }
///
/// let failure = Failure::http(Teapot);
/// assert_eq!(failure.content_type(), "text/html");
/// ```
pub trait HttpError: fmt::Display + fmt::Debug + Send + Sync + 'static {
    fn status_code(&self) -> StatusCode;

    fn content_type(&self) -> &str;

    /// Serialized body. An `Err` makes the dispatcher fall back to a generic
    /// `500` carrying this error's display text.
    fn render_body(&self) -> Result<Vec<u8>, BoxError>;
}

// ── Built-in renderings ───────────────────────────────────────────────────────

/// `{"errorCode": <status>, "errorMessage": "<message>"}`
#[derive(Clone, Debug)]
pub struct JsonError {
    status: StatusCode,
    message: String,
}

impl JsonError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for JsonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.status.as_u16(), self.message)
    }
}

impl HttpError for JsonError {
    fn status_code(&self) -> StatusCode {
        self.status
    }

    fn content_type(&self) -> &str {
        APPLICATION_JSON
    }

    fn render_body(&self) -> Result<Vec<u8>, BoxError> {
        let body = json!({
            "errorCode": self.status.as_u16(),
            "errorMessage": self.message,
        });
        Ok(serde_json::to_vec(&body)?)
    }
}

/// `<error code="<status>">message</error>`
#[derive(Clone, Debug)]
pub struct XmlError {
    status: StatusCode,
    message: String,
}

impl XmlError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for XmlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.status.as_u16(), self.message)
    }
}

impl HttpError for XmlError {
    fn status_code(&self) -> StatusCode {
        self.status
    }

    fn content_type(&self) -> &str {
        APPLICATION_XML
    }

    fn render_body(&self) -> Result<Vec<u8>, BoxError> {
        Ok(format!(
            r#"<error code="{}">{}</error>"#,
            self.status.as_u16(),
            escape_xml(&self.message)
        )
        .into_bytes())
    }
}

fn escape_xml(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

// ── Fallback ──────────────────────────────────────────────────────────────────

/// Any error without its own rendering: `500`, `text/plain`, display text.
#[derive(Debug)]
struct Opaque(BoxError);

impl fmt::Display for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl HttpError for Opaque {
    fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    fn content_type(&self) -> &str {
        TEXT_PLAIN
    }

    fn render_body(&self) -> Result<Vec<u8>, BoxError> {
        Ok(self.0.to_string().into_bytes())
    }
}

#[derive(Debug, Error)]
#[error("{0}")]
struct Message(String);

#[derive(Debug, Error)]
#[error("{origin} panicked: {message}")]
struct Panicked {
    origin: &'static str,
    message: String,
}

// ── Failure ───────────────────────────────────────────────────────────────────

/// The failure value flowing out of a handler or interceptor.
///
/// Deliberately not a `std::error::Error` itself, so that every error type can
/// convert into it with `?`.
pub struct Failure(Box<dyn HttpError>);

impl Failure {
    /// Wraps a value with its own rendering.
    pub fn http(error: impl HttpError) -> Self {
        Self(Box::new(error))
    }

    pub fn json(status: StatusCode, message: impl Into<String>) -> Self {
        Self::http(JsonError::new(status, message))
    }

    pub fn xml(status: StatusCode, message: impl Into<String>) -> Self {
        Self::http(XmlError::new(status, message))
    }

    /// An opaque failure rendered as `500 text/plain` with `message` as body.
    pub fn msg(message: impl fmt::Display) -> Self {
        Self::opaque(Box::new(Message(message.to_string())))
    }

    /// `origin` names the step that panicked, e.g. `handler` or `interceptor`.
    pub(crate) fn panicked(origin: &'static str, payload: &(dyn Any + Send)) -> Self {
        Self::opaque(Box::new(Panicked { origin, message: panic_message(payload) }))
    }

    fn opaque(error: BoxError) -> Self {
        Self(Box::new(Opaque(error)))
    }

    pub fn status_code(&self) -> StatusCode {
        self.0.status_code()
    }

    pub fn content_type(&self) -> &str {
        self.0.content_type()
    }

    pub fn render_body(&self) -> Result<Vec<u8>, BoxError> {
        self.0.render_body()
    }

    pub fn as_http(&self) -> &dyn HttpError {
        self.0.as_ref()
    }
}

impl<E> From<E> for Failure
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Self::opaque(Box::new(error))
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Failure").field(&self.0).finish()
    }
}

/// Extracts a message string from a `catch_unwind` payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_error_renders_code_and_quoted_message() {
        let f = Failure::json(StatusCode::NOT_FOUND, r#"no "user" here"#);
        assert_eq!(f.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(f.content_type(), APPLICATION_JSON);
        assert_eq!(
            String::from_utf8(f.render_body().unwrap()).unwrap(),
            r#"{"errorCode":404,"errorMessage":"no \"user\" here"}"#
        );
        assert_eq!(f.to_string(), r#"[404] no "user" here"#);
    }

    #[test]
    fn xml_error_escapes_message() {
        let f = Failure::xml(StatusCode::IM_A_TEAPOT, "tea & <biscuits>");
        assert_eq!(f.content_type(), APPLICATION_XML);
        assert_eq!(
            f.render_body().unwrap(),
            br#"<error code="418">tea &amp; &lt;biscuits&gt;</error>"#
        );
    }

    #[test]
    fn std_errors_become_opaque_500() {
        fn fails() -> Outcome {
            Err::<(), _>(std::io::Error::other("disk on fire"))?;
            Ok(())
        }

        let f = fails().unwrap_err();
        assert_eq!(f.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(f.content_type(), TEXT_PLAIN);
        assert_eq!(f.render_body().unwrap(), b"disk on fire");
    }

    #[test]
    fn panic_payloads_are_described() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(Failure::panicked("handler", boxed.as_ref()).to_string(), "handler panicked: boom");

        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned boom"));
        assert_eq!(panic_message(boxed.as_ref()), "owned boom");

        let boxed: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }

    #[test]
    fn msg_is_plain_text() {
        let f = Failure::msg("nope");
        assert_eq!(f.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(f.render_body().unwrap(), b"nope");
    }
}
