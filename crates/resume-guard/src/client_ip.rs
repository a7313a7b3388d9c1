//! Client address resolution from proxy headers.

use http::HeaderMap;

/// Returned when no header or socket address identifies the client.
pub const UNKNOWN_CLIENT: &str = "unknown";

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_REAL_IP: &str = "x-real-ip";

/// Resolves the client IP used as the rate limit key.
///
/// Order: first `X-Forwarded-For` entry, then `X-Real-IP`, then the socket
/// address, then [`UNKNOWN_CLIENT`]. Unreadable or blank header values are
/// skipped rather than treated as errors.
pub fn resolve_client_ip(headers: &HeaderMap, remote_addr: Option<&str>) -> String {
    forwarded_for(headers)
        .or_else(|| header_value(headers, X_REAL_IP))
        .or_else(|| remote_addr.map(str::trim).filter(|s| !s.is_empty()))
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

/// Resolves the client IP for access logging.
///
/// Same as [`resolve_client_ip`] without the `X-Real-IP` step.
pub fn log_client_ip(headers: &HeaderMap, remote_addr: Option<&str>) -> String {
    forwarded_for(headers)
        .or_else(|| remote_addr.map(str::trim).filter(|s| !s.is_empty()))
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

fn forwarded_for(headers: &HeaderMap) -> Option<&str> {
    header_value(headers, X_FORWARDED_FOR)?
        .split(',')
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
