use std::time::Instant;

use axum::{
    extract::Request,
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use crate::mcp::engine::SESSION_ID_HEADER;

const NO_SESSION: &str = "-";

pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

/// Logs one summary line per `/mcp` exchange, tagged with the session that
/// answered it. Server errors are logged at `warn`.
pub async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_bytes = content_length(request.headers());
    let requested_session = session_id(request.headers()).map(str::to_string);
    let started_at = Instant::now();

    let response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = started_at.elapsed().as_millis();
    let session = session_id(response.headers())
        .or(requested_session.as_deref())
        .unwrap_or(NO_SESSION);

    if status.is_server_error() {
        warn!(
            method = %method,
            path = %path,
            session_id = session,
            status = status.as_u16(),
            duration_ms = elapsed_ms,
            "request failed"
        );
    } else {
        info!(
            method = %method,
            path = %path,
            session_id = session,
            status = status.as_u16(),
            request_bytes,
            duration_ms = elapsed_ms,
            "request summary"
        );
    }

    response
}

fn session_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(&SESSION_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
}

fn content_length(headers: &HeaderMap) -> u64 {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
        .unwrap_or(0)
}
