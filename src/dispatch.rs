//! Request dispatch.
//!
//! # The pipeline
//!
//! Each matched request runs through a small state machine over the
//! interceptor chains of the route's ancestors, always root first and in
//! declaration order within one route:
//!
//! ```text
//!            ok                 ok
//! BEFORE ─────────► HANDLING ─────────► AFTER ──► DONE
//!    │                 │  panic ─► recoverers        ▲
//!    │ failure         │ failure      │              │
//!    └────────────► ERROR ◄───────────┘ ─────────────┘
//! ```
//!
//! - **BEFORE** stops at the first failing interceptor, across all ancestors.
//! - **HANDLING** calls the handler once. A panic runs every recoverer with
//!   the payload, then continues as a failure.
//! - **AFTER** runs `after` interceptors until one fails (logged only), then
//!   spawns every `after_async` interceptor regardless.
//! - **ERROR** runs every `error` interceptor. If the chain has none, the
//!   failure renders itself through [`HttpError`](crate::HttpError).
//!
//! Interceptors are unwind-guarded too: a panicking `before` fails the
//! request with a 500, while a panicking `after` or `error` interceptor is
//! logged like any other failure of that phase.
//!
//! Exactly one response leaves the pipeline, in DONE.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{error, trace};

use crate::context::Context;
use crate::failure::{Failure, Outcome};
use crate::handler::BoxedHandler;
use crate::interceptor::Interceptors;

/// A compiled route: one handler plus the chains that wrap it.
pub(crate) struct Endpoint {
    handler: BoxedHandler,
    route_path: Arc<str>,
    ancestors: Arc<[Arc<Interceptors>]>,
}

enum Phase {
    Before,
    Handling,
    After,
    Error(Failure),
    Done,
}

impl Endpoint {
    pub(crate) fn new(
        handler: BoxedHandler,
        route_path: Arc<str>,
        ancestors: Arc<[Arc<Interceptors>]>,
    ) -> Self {
        Self { handler, route_path, ancestors }
    }

    pub(crate) fn route_path(&self) -> &Arc<str> {
        &self.route_path
    }

    /// Number of routes from the declaration root to this one, inclusive.
    #[cfg(test)]
    pub(crate) fn depth(&self) -> usize {
        self.ancestors.len()
    }

    /// Drives `cx` through the pipeline. When this returns, the response in
    /// `cx` is final.
    pub(crate) async fn dispatch(&self, cx: &mut Context) {
        let mut phase = Phase::Before;
        loop {
            phase = match phase {
                Phase::Before => match self.before(cx).await {
                    Ok(()) => Phase::Handling,
                    Err(failure) => Phase::Error(failure),
                },
                Phase::Handling => match self.handle(cx).await {
                    Ok(()) => Phase::After,
                    Err(failure) => Phase::Error(failure),
                },
                Phase::After => {
                    self.after(cx).await;
                    Phase::Done
                }
                Phase::Error(failure) => {
                    self.error(cx, failure).await;
                    Phase::Done
                }
                Phase::Done => return,
            };
        }
    }

    async fn before(&self, cx: &mut Context) -> Outcome {
        for chain in self.ancestors.iter() {
            chain.run_before(cx).await?;
        }
        Ok(())
    }

    async fn handle(&self, cx: &mut Context) -> Outcome {
        // The future is built inside the guarded block so a panic raised
        // before the handler's first await is caught too.
        let handler = &self.handler;
        let call_cx = &mut *cx;
        let guarded = AssertUnwindSafe(async move { handler(call_cx).await }).catch_unwind();
        match guarded.await {
            Ok(outcome) => outcome,
            Err(payload) => {
                error!(route = %self.route_path, path = %cx.path(), "handler panicked");
                for chain in self.ancestors.iter() {
                    chain.run_recover(cx, payload.as_ref());
                }
                Err(Failure::panicked("handler", payload.as_ref()))
            }
        }
    }

    async fn after(&self, cx: &mut Context) {
        for chain in self.ancestors.iter() {
            if let Err(e) = chain.run_after(cx).await {
                error!(route = %self.route_path, path = %cx.path(), error = %e, "after interceptor failed");
                break;
            }
        }

        if self.ancestors.iter().any(|chain| chain.has_after_async()) {
            let snapshot = Arc::new(cx.snapshot());
            for chain in self.ancestors.iter() {
                chain.spawn_after_async(&snapshot);
            }
        }
    }

    async fn error(&self, cx: &mut Context, failure: Failure) {
        trace!(route = %self.route_path, %failure, "request failed");
        for chain in self.ancestors.iter() {
            chain.run_error(cx, &failure).await;
        }

        let delegated = self.ancestors.iter().any(|chain| chain.has_error_interceptors());
        if !delegated {
            cx.response_mut().render_failure(&failure);
        }
    }
}
