//! Interceptor chains.
//!
//! Every [`Route`](crate::Route) owns one [`Interceptors`] value holding five
//! ordered lists. The dispatcher walks the chains of all ancestors of the
//! matched route, root first, and calls the runners below for each phase.

use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures::FutureExt;
use tracing::{error, warn};

use crate::context::{Context, Snapshot};
use crate::failure::{Failure, Outcome};
use crate::handler::{BoxedAsyncInterceptor, BoxedErrorHandler, BoxedHandler, BoxedRecoverer};

#[derive(Clone, Default)]
pub(crate) struct Interceptors {
    pub(crate) before: Vec<BoxedHandler>,
    pub(crate) after: Vec<BoxedHandler>,
    pub(crate) after_async: Vec<BoxedAsyncInterceptor>,
    pub(crate) error: Vec<BoxedErrorHandler>,
    pub(crate) recover: Vec<BoxedRecoverer>,
}

impl Interceptors {
    /// Stops at the first failure. A panic counts as a failure.
    pub(crate) async fn run_before(&self, cx: &mut Context) -> Outcome {
        for interceptor in &self.before {
            let call_cx = &mut *cx;
            guarded(async move { interceptor(call_cx).await }).await?;
        }
        Ok(())
    }

    /// Stops at the first failure. A panic counts as a failure.
    pub(crate) async fn run_after(&self, cx: &mut Context) -> Outcome {
        for interceptor in &self.after {
            let call_cx = &mut *cx;
            guarded(async move { interceptor(call_cx).await }).await?;
        }
        Ok(())
    }

    /// Launches every `after_async` interceptor on its own task and returns
    /// immediately. The tasks are never joined or cancelled and their
    /// failures (and panics) stay inside the task.
    pub(crate) fn spawn_after_async(&self, snapshot: &Arc<Snapshot>) {
        for interceptor in &self.after_async {
            let interceptor = Arc::clone(interceptor);
            let snapshot = Arc::clone(snapshot);
            tokio::spawn(async move {
                let _ = interceptor(snapshot).await;
            });
        }
    }

    /// Runs every `error` interceptor. A failing interceptor is logged and the
    /// next one still runs.
    pub(crate) async fn run_error(&self, cx: &mut Context, failure: &Failure) {
        for interceptor in &self.error {
            let call_cx = &mut *cx;
            if let Err(e) = guarded(async move { interceptor(call_cx, failure).await }).await {
                error!(path = %cx.path(), original = %failure, error = %e, "error interceptor failed");
            }
        }
    }

    pub(crate) fn run_recover(&self, cx: &Context, payload: &(dyn Any + Send)) {
        for recoverer in &self.recover {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| recoverer(cx, payload)))
                .unwrap_or_else(|p| Err(Failure::panicked("recoverer", p.as_ref())));
            if let Err(e) = outcome {
                warn!(path = %cx.path(), error = %e, "recoverer failed");
            }
        }
    }

    pub(crate) fn has_error_interceptors(&self) -> bool {
        !self.error.is_empty()
    }

    pub(crate) fn has_after_async(&self) -> bool {
        !self.after_async.is_empty()
    }
}

/// Runs `call` to completion, turning a panic (including one raised while the
/// interceptor builds its future) into a 500 failure.
async fn guarded<F>(call: F) -> Outcome
where
    F: Future<Output = Outcome>,
{
    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(payload) => Err(Failure::panicked("interceptor", payload.as_ref())),
    }
}
