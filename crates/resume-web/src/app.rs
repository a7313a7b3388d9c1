use axum::http::{header, Method};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::middleware;
use crate::state::AppState;

/// Builds the full middleware stack around the routes.
///
/// Outermost first: trace, CORS, body limit, access log, security headers,
/// rate limit. Rate limit rejections therefore still get logged and carry
/// the security headers.
pub fn build_app(state: AppState) -> Router {
    // CORS: same-origin only by default (no cross-origin requests allowed)
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    let router = api::router()
        .fallback(api::not_found)
        .layer(from_fn_with_state(
            state.clone(),
            middleware::rate_limit::rate_limit,
        ));

    let router = if state.config.tls.is_enabled() {
        router.layer(from_fn(middleware::security_headers::security_headers_with_hsts))
    } else {
        router.layer(from_fn(middleware::security_headers::security_headers))
    };

    router
        .layer(from_fn_with_state(
            state.clone(),
            middleware::access_log::access_log,
        ))
        .layer(RequestBodyLimitLayer::new(state.config.max_body_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
