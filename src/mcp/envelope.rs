//! Inbound body normalization
//!
//! Every POST body, whatever shape it arrives in, is reduced to one of three
//! outcomes before dispatch. Normalization never fails.

use axum::{
    body::Bytes,
    http::{header, HeaderMap},
};
use serde_json::Value;
use tracing::debug;

pub const HANDSHAKE_METHOD: &str = "initialize";
pub const NOTIFICATION_PREFIX: &str = "notifications/";

/// A request body before any decoding.
#[derive(Debug, Clone)]
pub enum RawBody {
    Bytes(Bytes),
    Text(String),
    Absent,
}

impl RawBody {
    /// Classifies a buffered HTTP body. A `text/*` content type with valid
    /// UTF-8 is kept as text; anything else stays as bytes.
    pub fn from_http(headers: &HeaderMap, bytes: Bytes) -> Self {
        if bytes.is_empty() {
            return Self::Absent;
        }

        let is_text = headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.trim_start().starts_with("text/"));
        if !is_text {
            return Self::Bytes(bytes);
        }

        match String::from_utf8(bytes.to_vec()) {
            Ok(text) => Self::Text(text),
            Err(_) => Self::Bytes(bytes),
        }
    }
}

impl From<Bytes> for RawBody {
    fn from(bytes: Bytes) -> Self {
        if bytes.is_empty() {
            Self::Absent
        } else {
            Self::Bytes(bytes)
        }
    }
}

/// A decoded RPC request body.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    payload: Value,
}

impl Envelope {
    pub fn new(payload: Value) -> Self {
        Self { payload }
    }

    /// The `method` field, when present and a string.
    pub fn method(&self) -> Option<&str> {
        self.payload.get("method").and_then(Value::as_str)
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn is_notification(&self) -> bool {
        self.method()
            .is_some_and(|method| method.starts_with(NOTIFICATION_PREFIX))
    }

    pub fn is_handshake(&self) -> bool {
        self.method() == Some(HANDSHAKE_METHOD)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedBody {
    Envelope(Envelope),
    Absent,
    /// Text that did not decode as JSON.
    Malformed(String),
}

impl NormalizedBody {
    pub fn envelope(&self) -> Option<&Envelope> {
        match self {
            Self::Envelope(envelope) => Some(envelope),
            Self::Absent | Self::Malformed(_) => None,
        }
    }
}

pub fn normalize(raw: RawBody) -> NormalizedBody {
    let text = match raw {
        RawBody::Absent => return NormalizedBody::Absent,
        RawBody::Text(text) => text,
        RawBody::Bytes(bytes) if bytes.is_empty() => return NormalizedBody::Absent,
        RawBody::Bytes(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
    };

    if text.trim().is_empty() {
        return NormalizedBody::Absent;
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(value) => NormalizedBody::Envelope(Envelope::new(value)),
        Err(err) => {
            debug!(error = %err, length = text.len(), "request body is not valid JSON");
            NormalizedBody::Malformed(text)
        }
    }
}
