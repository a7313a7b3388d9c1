use std::time::Instant;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, Request};
use axum::middleware::Next;
use axum::response::Response;
use resume_guard::{log_client_ip, should_log, AccessRecord, DeviceInfo, Visitor};

use crate::state::AppState;

fn header_or<'a>(headers: &'a HeaderMap, name: header::HeaderName, fallback: &'a str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(fallback)
}

/// One line per request on the `access` target.
///
/// Responses with status >= 400 are logged at warn level. The visitor is
/// taken from a [`Visitor`] request extension when an auth layer set one.
pub async fn access_log(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
    let config = &state.config.access_log;
    if !config.enabled || !should_log(req.uri().path(), &config.exclude_paths) {
        return next.run(req).await;
    }

    let start = Instant::now();
    let remote = super::remote_addr(&req);
    let headers = req.headers();
    let ip = log_client_ip(headers, remote.as_deref());
    let user_agent = header_or(headers, header::USER_AGENT, "unknown").to_string();
    let referer = header_or(headers, header::REFERER, "direct").to_string();
    let visitor = req.extensions().get::<Visitor>().cloned().unwrap_or_default();
    let method = req.method().to_string();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    let record = AccessRecord {
        ip,
        visitor,
        method,
        path,
        status: response.status().as_u16(),
        duration: start.elapsed(),
        device: DeviceInfo::from_user_agent(&user_agent),
        referer,
        user_agent,
    };
    if record.is_error() {
        tracing::warn!(target: "access", user_agent = %record.user_agent, "{record}");
    } else {
        tracing::info!(target: "access", user_agent = %record.user_agent, "{record}");
    }

    response
}
