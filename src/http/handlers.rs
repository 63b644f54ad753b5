//! Axum handler for the `/mcp` route
//!
//! Dispatches on the HTTP verb and, for POST, on the envelope's method:
//! notifications are acknowledged, handshakes replace the session, and
//! everything else is forwarded to the live session.

use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use tracing::{debug, error};

use crate::{
    errors::AppError,
    http::writer::ResponseWriter,
    mcp::{
        envelope::{normalize, Envelope, NormalizedBody, RawBody},
        session::McpSession,
    },
    AppState,
};

pub const LIVENESS_MESSAGE: &str = "DailyCard MCP server is running";
pub const ALLOWED_METHODS: &str = "GET,HEAD,OPTIONS,POST,DELETE";

/// Only the POST arm reads the body, capped at `AppState::max_body_bytes`.
/// Other verbs answer without touching it, whatever its size.
pub async fn mcp_endpoint(State(state): State<AppState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    match parts.method {
        Method::GET | Method::HEAD => (StatusCode::OK, LIVENESS_MESSAGE).into_response(),
        Method::OPTIONS | Method::DELETE => StatusCode::NO_CONTENT.into_response(),
        Method::POST => match read_body(body, state.max_body_bytes).await {
            Ok(bytes) => {
                let raw = RawBody::from_http(&parts.headers, bytes);
                handle_post(&state, &parts.headers, raw).await
            }
            Err(err) => err.into_response(),
        },
        _ => (
            StatusCode::METHOD_NOT_ALLOWED,
            [(header::ALLOW, ALLOWED_METHODS)],
        )
            .into_response(),
    }
}

async fn read_body(body: Body, limit: usize) -> Result<Bytes, AppError> {
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) if err.is::<LengthLimitError>() => Err(AppError::PayloadTooLarge { limit }),
        Err(err) => {
            debug!(error = %err, "failed to read request body");
            Err(AppError::bad_request(
                "unreadable_body",
                "request body could not be read",
            ))
        }
    }
}

async fn handle_post(state: &AppState, headers: &HeaderMap, body: RawBody) -> Response {
    let envelope = match normalize(body) {
        NormalizedBody::Envelope(envelope) => envelope,
        NormalizedBody::Absent => return StatusCode::NO_CONTENT.into_response(),
        NormalizedBody::Malformed(text) => {
            debug!(length = text.len(), "acknowledging body that is not an envelope");
            return StatusCode::NO_CONTENT.into_response();
        }
    };

    let Some(method) = envelope.method() else {
        debug!("envelope has no method, acknowledging");
        return StatusCode::NO_CONTENT.into_response();
    };

    if envelope.is_notification() {
        debug!(method = %method, "notification acknowledged");
        return StatusCode::NO_CONTENT.into_response();
    }

    let session = if envelope.is_handshake() {
        state.sessions.reset_connection().await
    } else {
        state
            .sessions
            .current()
            .await
            .ok_or(AppError::SessionNotInitialized)
    };

    match session {
        Ok(session) => forward(state, session, headers, &envelope).await,
        Err(err) => err.into_response(),
    }
}

async fn forward(
    state: &AppState,
    session: Arc<McpSession>,
    headers: &HeaderMap,
    envelope: &Envelope,
) -> Response {
    let mut writer = ResponseWriter::new();
    let result = state
        .sessions
        .engine()
        .handle_request(&session, headers, &mut writer, envelope)
        .await;

    match result {
        Ok(()) if writer.headers_sent() => writer.into_response(),
        Ok(()) => AppError::internal("protocol engine produced no response").into_response(),
        Err(err) if writer.headers_sent() => {
            error!(
                session_id = %session.id(),
                status = ?writer.status(),
                error = %err,
                "protocol engine failed after response was started"
            );
            writer.into_response()
        }
        Err(err) => err.into_response(),
    }
}
