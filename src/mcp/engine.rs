use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use tracing::{debug, info};

use crate::{
    domain::resources::WidgetTemplate,
    errors::AppError,
    http::writer::ResponseWriter,
    mcp::{
        envelope::Envelope,
        rpc::{json_rpc_error, SESSION_CLOSED},
        server::{handle_json_rpc_request, parse_message, RpcMessage},
        session::McpSession,
    },
};

pub const SESSION_ID_HEADER: HeaderName = HeaderName::from_static("mcp-session-id");

/// The protocol side of the bridge. Sessions are attached with `connect`,
/// retired with `close`, and every forwarded envelope goes through
/// `handle_request`, which owns writing the HTTP reply.
#[async_trait]
pub trait ProtocolEngine: Send + Sync {
    async fn connect(&self, session: &McpSession) -> Result<(), AppError>;

    async fn close(&self, session: &McpSession) -> Result<(), AppError>;

    async fn handle_request(
        &self,
        session: &McpSession,
        headers: &HeaderMap,
        response: &mut ResponseWriter,
        envelope: &Envelope,
    ) -> Result<(), AppError>;
}

#[derive(Debug, Clone)]
pub struct McpEngine {
    widget: WidgetTemplate,
}

impl McpEngine {
    pub fn new(widget: WidgetTemplate) -> Self {
        Self { widget }
    }
}

fn session_headers(session: &McpSession) -> Result<HeaderMap, AppError> {
    let value = HeaderValue::from_str(session.id())
        .map_err(|err| AppError::internal(format!("invalid session id header: {err}")))?;
    let mut headers = HeaderMap::new();
    headers.insert(SESSION_ID_HEADER, value);
    Ok(headers)
}

#[async_trait]
impl ProtocolEngine for McpEngine {
    async fn connect(&self, session: &McpSession) -> Result<(), AppError> {
        if session.is_closed() {
            return Err(AppError::engine("cannot attach a closed session"));
        }
        debug!(session_id = %session.id(), "session attached to engine");
        Ok(())
    }

    async fn close(&self, session: &McpSession) -> Result<(), AppError> {
        if !session.mark_closed() {
            return Err(AppError::engine("session already closed"));
        }
        Ok(())
    }

    async fn handle_request(
        &self,
        session: &McpSession,
        headers: &HeaderMap,
        response: &mut ResponseWriter,
        envelope: &Envelope,
    ) -> Result<(), AppError> {
        if let Some(client_session) = headers
            .get(&SESSION_ID_HEADER)
            .and_then(|value| value.to_str().ok())
        {
            if client_session != session.id() {
                debug!(
                    client_session = %client_session,
                    session_id = %session.id(),
                    "request carries a session id other than the live one"
                );
            }
        }

        let reply_headers = session_headers(session)?;

        if session.is_closed() {
            info!(session_id = %session.id(), "request forwarded to a closed session");
            let id = envelope.payload().get("id").cloned();
            return response.send_json(
                StatusCode::NOT_FOUND,
                reply_headers,
                &json_rpc_error(id, SESSION_CLOSED, "Session closed"),
            );
        }

        match parse_message(envelope.payload()) {
            Ok(RpcMessage::Call { id, method, params }) => {
                let reply =
                    handle_json_rpc_request(&self.widget, session, id, &method, params);
                response.send_json(StatusCode::OK, reply_headers, &reply)
            }
            Ok(RpcMessage::Reply) => response.write_head(StatusCode::ACCEPTED, reply_headers),
            Err(error) => response.send_json(StatusCode::OK, reply_headers, &error),
        }
    }
}
