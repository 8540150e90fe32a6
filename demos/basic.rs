//! A small user API with an auth interceptor, error rendering and an
//! access log that runs off the request path.
//!
//! Run with:
//!   RUST_LOG=info CANOPY_DEBUG=1 cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/user
//!   curl http://localhost:3000/user/42                  # 401
//!   curl -H 'Auth: secret' http://localhost:3000/user/42
//!   curl -X POST http://localhost:3000/user -d '{"name":"alice"}'

use std::sync::Arc;

use canopy::{Config, Context, Failure, HandlerFuture, Route, Router, Snapshot, StatusCode};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), canopy::Error> {
    tracing_subscriber::fmt::init();

    Router::new()
        .config(Config::from_env())
        .route(
            Route::new("/")
                .error(render_error)
                .after_async(access_log)
                .child(
                    Route::new("/user")
                        .get(list_users)
                        .post(create_user)
                        .child(Route::new("/{id}").before(require_auth).get(get_user)),
                ),
        )
        .listen_and_serve("0.0.0.0:3000")
        .await
}

#[derive(Deserialize)]
struct NewUser {
    name: String,
}

fn list_users(cx: &mut Context) -> HandlerFuture<'_> {
    async move {
        cx.write_json(&serde_json::json!([{ "id": "42", "name": "alice" }]))?;
        Ok(())
    }
    .boxed()
}

fn create_user(cx: &mut Context) -> HandlerFuture<'_> {
    async move {
        let user: NewUser = cx.decode_json().await?;
        cx.set_status(StatusCode::CREATED);
        cx.set_header("location", "/user/99")?;
        cx.write_json(&serde_json::json!({ "id": "99", "name": user.name }))?;
        Ok(())
    }
    .boxed()
}

fn get_user(cx: &mut Context) -> HandlerFuture<'_> {
    async move {
        let id = cx.param("id").unwrap_or("unknown").to_owned();
        cx.write_json(&serde_json::json!({ "id": id, "name": "alice" }))?;
        Ok(())
    }
    .boxed()
}

fn require_auth(cx: &mut Context) -> HandlerFuture<'_> {
    async move {
        match cx.header("auth") {
            Some("secret") => Ok(()),
            _ => Err(Failure::json(StatusCode::UNAUTHORIZED, "missing or bad Auth header")),
        }
    }
    .boxed()
}

fn render_error<'a>(cx: &'a mut Context, failure: &'a Failure) -> HandlerFuture<'a> {
    async move {
        warn!(path = cx.path(), status = %failure.status_code(), "request failed");
        cx.response_mut().reset();
        cx.set_status(failure.status_code());
        cx.set_header("content-type", failure.content_type())?;
        let body = failure.render_body().map_err(Failure::msg)?;
        cx.write(&body);
        Ok(())
    }
    .boxed()
}

fn access_log(snapshot: Arc<Snapshot>) -> BoxFuture<'static, Result<(), Failure>> {
    async move {
        info!(method = %snapshot.method(), path = snapshot.path(), status = %snapshot.status(), "served");
        Ok(())
    }
    .boxed()
}
