//! JSON-RPC response builders
//!
//! Maps `AppError`s onto JSON-RPC error objects and wraps results in the
//! `rust-mcp-sdk` response envelopes.

use rust_mcp_sdk::schema::{
    JsonrpcErrorResponse, JsonrpcResultResponse, RequestId, Result as McpResult, RpcError,
};
use serde_json::{json, Value};

use crate::errors::AppError;

pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;
pub const SESSION_CLOSED: i32 = -32000;

pub fn is_json_rpc_error(value: &Value) -> bool {
    value.get("error").is_some()
}

pub fn app_error_to_json_rpc(id: Option<Value>, err: AppError) -> Value {
    match err {
        AppError::BadRequest { code, message } => json_rpc_error_with_data(
            id,
            INVALID_PARAMS,
            "Invalid params",
            Some(json!({
                "code": code,
                "message": message,
            })),
        ),
        AppError::PayloadTooLarge { .. } => {
            json_rpc_error(id, INVALID_REQUEST, "Invalid Request")
        }
        AppError::SessionNotInitialized | AppError::Engine { .. } | AppError::Internal { .. } => {
            json_rpc_error(id, INTERNAL_ERROR, "Internal error")
        }
    }
}

pub fn json_rpc_error(id: Option<Value>, code: i32, message: &str) -> Value {
    json_rpc_error_with_data(id, code, message, None)
}

pub fn json_rpc_error_with_data(
    id: Option<Value>,
    code: i32,
    message: &str,
    data: Option<Value>,
) -> Value {
    let error = RpcError {
        code: i64::from(code),
        data,
        message: message.to_string(),
    };

    // The schema type cannot carry a null id, which is what a reply to an
    // id-less request needs.
    match id.as_ref().and_then(value_to_request_id) {
        Some(request_id) => {
            serde_json::to_value(JsonrpcErrorResponse::new(error, Some(request_id)))
                .unwrap_or_else(|_| fallback_internal_error())
        }
        None => json!({
            "jsonrpc": "2.0",
            "id": Value::Null,
            "error": error,
        }),
    }
}

pub fn json_rpc_result(id: Option<Value>, result: Value) -> Value {
    if let Some(request_id) = id.as_ref().and_then(value_to_request_id) {
        let extra = result.as_object().cloned();
        let response = JsonrpcResultResponse::new(request_id, McpResult { meta: None, extra });
        if let Ok(value) = serde_json::to_value(response) {
            return value;
        }
    }

    json!({
        "jsonrpc": "2.0",
        "id": id.unwrap_or(Value::Null),
        "result": result
    })
}

pub fn value_to_request_id(value: &Value) -> Option<RequestId> {
    if let Some(string_id) = value.as_str() {
        return Some(RequestId::String(string_id.to_string()));
    }

    value.as_i64().map(RequestId::Integer)
}

fn fallback_internal_error() -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": Value::Null,
        "error": { "code": INTERNAL_ERROR, "message": "Internal error" }
    })
}
