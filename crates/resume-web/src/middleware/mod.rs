pub mod access_log;
pub mod rate_limit;
pub mod security_headers;

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::Request;

/// Peer IP from the connection, when the server was started with connect info.
pub(crate) fn remote_addr(req: &Request<Body>) -> Option<String> {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}
