use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use resume_guard::{RequestInfo, Verdict};

use crate::error::AppError;
use crate::state::AppState;

/// Per-IP general and login rate limiting.
///
/// Limits come from `[rate_limit]` in the server config. Rejections are
/// answered here and never reach the inner service.
pub async fn rate_limit(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
    let remote = super::remote_addr(&req);
    let verdict = state.limiter.evaluate(&RequestInfo {
        headers: req.headers(),
        method: req.method(),
        path: req.uri().path(),
        remote_addr: remote.as_deref(),
    });

    match verdict {
        Verdict::Reject { ip, reason } => {
            tracing::warn!("Rate limited {ip} on {} {}: {reason:?}", req.method(), req.uri().path());
            AppError::RateLimited {
                reason,
                locale: state.limiter.settings().locale,
            }
            .into_response()
        }
        Verdict::Allow { .. } | Verdict::Bypass => next.run(req).await,
    }
}
