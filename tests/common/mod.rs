#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use canopy::{Context, Failure, HandlerFuture, Method, Service, StatusCode};
use futures::FutureExt;
use http::HeaderMap;
use http_body_util::{BodyExt, Full};

/// Shared, ordered record of which interceptors ran.
pub type Log = Arc<Mutex<Vec<String>>>;

pub fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl Reply {
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(http::header::CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }
}

pub async fn send(service: &Service, method: Method, uri: &str, headers: &[(&str, &str)]) -> Reply {
    send_body(service, method, uri, headers, "").await
}

pub async fn send_body(
    service: &Service,
    method: Method,
    uri: &str,
    headers: &[(&str, &str)],
    body: &'static str,
) -> Reply {
    let mut builder = http::Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let req = builder.body(Full::new(Bytes::from_static(body.as_bytes()))).unwrap();

    let res = service.handle(req).await;
    let status = res.status();
    let headers = res.headers().clone();
    let body = res.into_body().collect().await.unwrap().to_bytes();
    Reply { status, headers, body: String::from_utf8(body.to_vec()).unwrap() }
}

/// Pins a closure to the handler signature so its argument lifetime is inferred.
pub fn handler<F>(f: F) -> F
where
    F: for<'a> Fn(&'a mut Context) -> HandlerFuture<'a> + Send + Sync + 'static,
{
    f
}

/// An interceptor or handler that appends `entry` to `log` and succeeds.
pub fn record(
    log: &Log,
    entry: &'static str,
) -> impl for<'a> Fn(&'a mut Context) -> HandlerFuture<'a> + Send + Sync + 'static {
    let log = Arc::clone(log);
    handler(move |_| {
        log.lock().unwrap().push(entry.to_owned());
        async { Ok(()) }.boxed()
    })
}

/// Appends `entry` to `log`, then fails with a JSON error of `status`.
pub fn record_and_fail(
    log: &Log,
    entry: &'static str,
    status: StatusCode,
) -> impl for<'a> Fn(&'a mut Context) -> HandlerFuture<'a> + Send + Sync + 'static {
    let log = Arc::clone(log);
    handler(move |_| {
        log.lock().unwrap().push(entry.to_owned());
        async move { Err(Failure::json(status, entry)) }.boxed()
    })
}

/// Writes `body` as text.
pub fn text(body: &'static str) -> impl for<'a> Fn(&'a mut Context) -> HandlerFuture<'a> + Send + Sync + 'static {
    handler(move |cx| {
        cx.write_str(body);
        async { Ok(()) }.boxed()
    })
}
