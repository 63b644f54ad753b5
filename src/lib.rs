use std::sync::Arc;

use axum::{middleware, routing::any, Router};

pub mod config;
pub mod domain;
pub mod errors;
pub mod http;
pub mod logging;
pub mod mcp;

use mcp::{engine::ProtocolEngine, session::SessionController};

/// Largest POST body the dispatcher will buffer.
pub const DEFAULT_MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionController>,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(engine: Arc<dyn ProtocolEngine>) -> Self {
        Self {
            sessions: Arc::new(SessionController::new(engine)),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/mcp", any(http::handlers::mcp_endpoint))
        .layer(middleware::from_fn(logging::request_logging_middleware))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{header, HeaderMap, Request, StatusCode},
        response::Response,
    };
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::{
        domain::resources::{WidgetTemplate, TEMPLATE_URI},
        errors::AppError,
        http::{
            handlers::{ALLOWED_METHODS, LIVENESS_MESSAGE},
            writer::ResponseWriter,
        },
        mcp::{
            engine::{McpEngine, SESSION_ID_HEADER},
            envelope::Envelope,
            session::McpSession,
        },
    };

    use super::*;

    const INITIALIZE_BODY: &str = r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2025-06-18","clientInfo":{"name":"test-client","version":"1.0.0"},"capabilities":{}}}"#;

    fn state() -> AppState {
        AppState::new(Arc::new(McpEngine::new(WidgetTemplate::new(
            "console.log('dailycard');",
        ))))
    }

    fn request(method: &str, body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .uri("/mcp")
            .method(method)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.into())
            .expect("request build")
    }

    async fn send(state: &AppState, request: Request<Body>) -> Response {
        build_app(state.clone())
            .oneshot(request)
            .await
            .expect("request execution")
    }

    async fn body_bytes(response: Response) -> axum::body::Bytes {
        response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes()
    }

    async fn body_json(response: Response) -> Value {
        serde_json::from_slice(&body_bytes(response).await).expect("valid json response")
    }

    #[tokio::test]
    async fn get_answers_liveness_text() {
        let state = state();
        let response = send(&state, request("GET", Body::empty())).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, LIVENESS_MESSAGE);
        assert!(!state.sessions.is_connected().await);
    }

    #[tokio::test]
    async fn head_answers_liveness_status() {
        let state = state();
        let response = send(&state, request("HEAD", Body::empty())).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(!state.sessions.is_connected().await);
    }

    #[tokio::test]
    async fn options_and_delete_are_empty() {
        let state = state();

        for method in ["OPTIONS", "DELETE"] {
            let response = send(&state, request(method, Body::empty())).await;
            assert_eq!(response.status(), StatusCode::NO_CONTENT);
            assert!(body_bytes(response).await.is_empty());
        }
        assert!(!state.sessions.is_connected().await);
    }

    #[tokio::test]
    async fn put_is_not_allowed() {
        let response = send(&state(), request("PUT", "{}")).await;

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[header::ALLOW], ALLOWED_METHODS);
        assert_eq!(
            response.headers()[header::ALLOW],
            "GET,HEAD,OPTIONS,POST,DELETE"
        );
    }

    #[tokio::test]
    async fn non_post_verbs_ignore_oversized_bodies() {
        let state = state();
        let large = || Body::from(vec![b'a'; 3 * 1024 * 1024]);

        let response = send(&state, request("GET", large())).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, LIVENESS_MESSAGE);

        for method in ["OPTIONS", "DELETE"] {
            let response = send(&state, request(method, large())).await;
            assert_eq!(response.status(), StatusCode::NO_CONTENT);
        }

        let response = send(&state, request("PUT", large())).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[header::ALLOW], ALLOWED_METHODS);
        assert!(!state.sessions.is_connected().await);
    }

    #[tokio::test]
    async fn post_above_body_limit_is_rejected() {
        let state = state().with_max_body_bytes(64);
        let padding = "x".repeat(128);
        let body = format!(r#"{{"method":"notifications/ping","params":"{padding}"}}"#);

        let response = send(&state, request("POST", body)).await;

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            body_json(response).await["error"],
            "request body exceeds 64 bytes"
        );
        assert!(!state.sessions.is_connected().await);
    }

    #[tokio::test]
    async fn post_above_axum_default_limit_is_accepted() {
        let state = state();
        let padding = "x".repeat(3 * 1024 * 1024);
        let body = format!(r#"{{"method":"notifications/ping","params":"{padding}"}}"#);

        let response = send(&state, request("POST", body)).await;

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn other_paths_are_not_found() {
        let response = build_app(state())
            .oneshot(
                Request::builder()
                    .uri("/")
                    .method("GET")
                    .body(Body::empty())
                    .expect("request build"),
            )
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn notifications_are_acknowledged() {
        let state = state();

        for body in [
            r#"{"jsonrpc":"2.0","method":"notifications/ping","params":{"anything":[1,2]}}"#,
            r#"{"method":"notifications/ping","params":"not-even-an-object"}"#,
            r#"{"method":"notifications/initialized"}"#,
        ] {
            let response = send(&state, request("POST", body)).await;
            assert_eq!(response.status(), StatusCode::NO_CONTENT);
            assert!(body_bytes(response).await.is_empty());
        }
        assert!(!state.sessions.is_connected().await);
    }

    #[tokio::test]
    async fn malformed_body_is_acknowledged() {
        let state = state();

        for body in [
            Body::from(vec![0xff_u8, 0xfe, 0x00, 0x7b]),
            Body::from("{not json"),
            Body::empty(),
            Body::from(r#"{"params":{}}"#),
            Body::from(r#"[{"method":"ping"}]"#),
        ] {
            let response = send(&state, request("POST", body)).await;
            assert_eq!(response.status(), StatusCode::NO_CONTENT);
            assert!(body_bytes(response).await.is_empty());
        }
    }

    #[tokio::test]
    async fn text_plain_handshake_is_forwarded() {
        let state = state();
        let request = Request::builder()
            .uri("/mcp")
            .method("POST")
            .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(Body::from(INITIALIZE_BODY))
            .expect("request build");

        let response = send(&state, request).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(state.sessions.is_connected().await);
        assert_eq!(body_json(response).await["id"], 1);
    }

    #[tokio::test]
    async fn initialize_creates_session_and_forwards() {
        let state = state();
        assert!(!state.sessions.is_connected().await);

        let response = send(&state, request("POST", INITIALIZE_BODY)).await;

        assert_eq!(response.status(), StatusCode::OK);
        let session = state.sessions.current().await.expect("live session");
        assert_eq!(response.headers()[&SESSION_ID_HEADER], session.id());
        assert!(session.is_initialized());

        let body = body_json(response).await;
        assert_eq!(body["id"], 1);
        assert_eq!(body["result"]["protocolVersion"], "2025-06-18");
        assert_eq!(body["result"]["serverInfo"]["name"], env!("CARGO_PKG_NAME"));
        assert!(body["result"]["capabilities"]["resources"].is_object());
    }

    #[tokio::test]
    async fn bare_initialize_still_creates_session() {
        let state = state();

        let response = send(
            &state,
            request("POST", r#"{"method":"initialize","params":{}}"#),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(state.sessions.is_connected().await);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn repeated_initialize_replaces_session() {
        let state = state();

        send(&state, request("POST", INITIALIZE_BODY)).await;
        let first = state.sessions.current().await.expect("first session");

        send(&state, request("POST", INITIALIZE_BODY)).await;
        let second = state.sessions.current().await.expect("second session");

        assert_ne!(first.id(), second.id());
        assert!(first.is_closed());
        assert!(!second.is_closed());
    }

    #[tokio::test]
    async fn draw_after_initialize_returns_card() {
        let state = state();
        send(&state, request("POST", INITIALIZE_BODY)).await;
        let session = state.sessions.current().await.expect("live session");

        let response = send(
            &state,
            request("POST", r#"{"method":"dailycard.draw","params":{}}"#),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let current = state.sessions.current().await.expect("live session");
        assert_eq!(current.id(), session.id());

        let body = body_json(response).await;
        let card = &body["result"]["structuredContent"]["card"];
        assert!(card["name"].is_string());
        assert!(matches!(
            card["orientation"].as_str(),
            Some("upright") | Some("reversed")
        ));
    }

    #[tokio::test]
    async fn tools_list_and_widget_read_are_served() {
        let state = state();
        send(&state, request("POST", INITIALIZE_BODY)).await;

        let tools = body_json(
            send(
                &state,
                request(
                    "POST",
                    r#"{"jsonrpc":"2.0","id":2,"method":"tools/list","params":{}}"#,
                ),
            )
            .await,
        )
        .await;
        assert_eq!(tools["result"]["tools"][0]["name"], "dailycard.draw");

        let read = body_json(
            send(
                &state,
                request(
                    "POST",
                    r#"{"jsonrpc":"2.0","id":3,"method":"resources/read","params":{"uri":"ui://widget/dailycard.html"}}"#,
                ),
            )
            .await,
        )
        .await;
        assert_eq!(read["result"]["contents"][0]["uri"], TEMPLATE_URI);
        assert!(read["result"]["contents"][0]["text"]
            .as_str()
            .expect("html text")
            .contains("console.log('dailycard');"));
    }

    #[tokio::test]
    async fn request_without_session_fails() {
        let state = state();

        let response = send(
            &state,
            request("POST", r#"{"jsonrpc":"2.0","id":4,"method":"tools/list"}"#),
        )
        .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], "session not initialized");
        assert!(!state.sessions.is_connected().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_initialize_leaves_one_session() {
        let state = state();

        let first = tokio::spawn(send_owned(state.clone(), INITIALIZE_BODY));
        let second = tokio::spawn(send_owned(state.clone(), INITIALIZE_BODY));

        let mut issued = Vec::new();
        for handle in [first, second] {
            let response = handle.await.expect("task join");
            assert!(matches!(
                response.status(),
                StatusCode::OK | StatusCode::NOT_FOUND
            ));
            let id = response.headers()[&SESSION_ID_HEADER]
                .to_str()
                .expect("ascii session id")
                .to_string();
            issued.push(id);
        }

        assert_ne!(issued[0], issued[1]);
        let current = state.sessions.current().await.expect("live session");
        assert!(!current.is_closed());
        assert!(issued.iter().any(|id| id == current.id()));
    }

    async fn send_owned(state: AppState, body: &'static str) -> Response {
        send(&state, request("POST", body)).await
    }

    enum Failure {
        BeforeWrite,
        AfterHead,
        Silent,
    }

    struct FailingEngine {
        failure: Failure,
    }

    #[async_trait]
    impl ProtocolEngine for FailingEngine {
        async fn connect(&self, _session: &McpSession) -> Result<(), AppError> {
            Ok(())
        }

        async fn close(&self, _session: &McpSession) -> Result<(), AppError> {
            Err(AppError::engine("close refused"))
        }

        async fn handle_request(
            &self,
            _session: &McpSession,
            _headers: &HeaderMap,
            response: &mut ResponseWriter,
            _envelope: &Envelope,
        ) -> Result<(), AppError> {
            match self.failure {
                Failure::BeforeWrite => Err(AppError::engine("engine exploded")),
                Failure::AfterHead => {
                    response.write_head(StatusCode::OK, HeaderMap::new())?;
                    response.write_body(b"partial");
                    Err(AppError::engine("stream broke"))
                }
                Failure::Silent => Ok(()),
            }
        }
    }

    fn failing_state(failure: Failure) -> AppState {
        AppState::new(Arc::new(FailingEngine { failure }))
    }

    #[tokio::test]
    async fn engine_failure_before_write_is_500() {
        let state = failing_state(Failure::BeforeWrite);

        let response = send(&state, request("POST", INITIALIZE_BODY)).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], "engine exploded");
    }

    #[tokio::test]
    async fn engine_failure_after_head_keeps_partial_response() {
        let state = failing_state(Failure::AfterHead);

        let response = send(&state, request("POST", INITIALIZE_BODY)).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, "partial");
    }

    #[tokio::test]
    async fn engine_without_reply_is_500() {
        let state = failing_state(Failure::Silent);

        let response = send(&state, request("POST", INITIALIZE_BODY)).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn close_failure_does_not_block_handshake() {
        let state = failing_state(Failure::AfterHead);

        send(&state, request("POST", INITIALIZE_BODY)).await;
        let first = state.sessions.current().await.expect("first session");
        send(&state, request("POST", INITIALIZE_BODY)).await;
        let second = state.sessions.current().await.expect("second session");

        assert_ne!(first.id(), second.id());
    }
}
