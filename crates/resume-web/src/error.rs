use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use resume_guard::{Locale, RateLimited};
use serde::Serialize;

#[derive(Debug)]
pub enum AppError {
    RateLimited { reason: RateLimited, locale: Locale },
    NotFound(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: u16,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::RateLimited { reason, locale } => {
                (StatusCode::TOO_MANY_REQUESTS, reason.message(*locale))
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
        };

        let body = ErrorBody {
            error: message,
            code: status.as_u16(),
        };

        (status, axum::Json(body)).into_response()
    }
}
