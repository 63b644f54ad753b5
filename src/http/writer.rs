//! Response sink handed to the protocol engine
//!
//! Tracks whether the engine has started its reply so the dispatcher never
//! emits a second response on top of a partial one.

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::Value;

use crate::errors::AppError;

#[derive(Debug, Default)]
pub struct ResponseWriter {
    head: Option<(StatusCode, HeaderMap)>,
    body: Vec<u8>,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn headers_sent(&self) -> bool {
        self.head.is_some()
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.head.as_ref().map(|(status, _)| *status)
    }

    pub fn write_head(&mut self, status: StatusCode, headers: HeaderMap) -> Result<(), AppError> {
        if self.headers_sent() {
            return Err(AppError::internal("response headers already sent"));
        }
        self.head = Some((status, headers));
        Ok(())
    }

    /// Appends to the body, committing a `200 OK` head first if none was written.
    pub fn write_body(&mut self, chunk: &[u8]) {
        if self.head.is_none() {
            self.head = Some((StatusCode::OK, HeaderMap::new()));
        }
        self.body.extend_from_slice(chunk);
    }

    pub fn send_json(
        &mut self,
        status: StatusCode,
        mut headers: HeaderMap,
        value: &Value,
    ) -> Result<(), AppError> {
        let body = serde_json::to_vec(value)
            .map_err(|err| AppError::internal(format!("failed to encode response: {err}")))?;
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        self.write_head(status, headers)?;
        self.write_body(&body);
        Ok(())
    }
}

impl IntoResponse for ResponseWriter {
    fn into_response(self) -> Response {
        let (status, headers) = self
            .head
            .unwrap_or_else(|| (StatusCode::INTERNAL_SERVER_ERROR, HeaderMap::new()));

        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}
