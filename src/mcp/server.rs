//! MCP method routing
//!
//! Decodes a forwarded envelope into a JSON-RPC call, negotiates the protocol
//! version on `initialize`, and routes tool and resource methods to the
//! DailyCard catalog.

use rust_mcp_sdk::schema::{
    Implementation, InitializeResult, ListResourcesResult, ListToolsResult, ServerCapabilities,
    ServerCapabilitiesResources, ServerCapabilitiesTools,
};
use serde_json::{json, Value};
use tracing::info;

use crate::domain::{
    resources::{build_resources_list, handle_resources_read, WidgetTemplate},
    tools::{build_tools_list, call_tool, handle_tools_call, is_known_tool},
};
use crate::mcp::{
    rpc::{
        app_error_to_json_rpc, is_json_rpc_error, json_rpc_error, json_rpc_result,
        INTERNAL_ERROR, INVALID_REQUEST, METHOD_NOT_FOUND,
    },
    session::McpSession,
};
use crate::errors::AppError;

/// Newest first.
pub const SUPPORTED_PROTOCOL_VERSIONS: [&str; 3] = ["2025-06-18", "2025-03-26", "2024-11-05"];

#[derive(Debug, Clone, PartialEq)]
pub enum RpcMessage {
    Call {
        id: Option<Value>,
        method: String,
        params: Option<Value>,
    },
    /// A client's reply to a server-initiated request.
    Reply,
}

/// Lenient JSON-RPC decoding: `jsonrpc` and `id` may be omitted.
pub fn parse_message(payload: &Value) -> Result<RpcMessage, Value> {
    let Some(object) = payload.as_object() else {
        return Err(json_rpc_error(None, INVALID_REQUEST, "Invalid Request"));
    };

    let id = object.get("id").cloned().filter(|id| !id.is_null());

    if let Some(version) = object.get("jsonrpc") {
        if version.as_str() != Some("2.0") {
            return Err(json_rpc_error(id, INVALID_REQUEST, "Invalid Request"));
        }
    }

    let method = match object.get("method") {
        Some(Value::String(method)) if !method.trim().is_empty() => method.clone(),
        None if object.contains_key("result") || object.contains_key("error") => {
            return Ok(RpcMessage::Reply)
        }
        _ => return Err(json_rpc_error(id, INVALID_REQUEST, "Invalid Request")),
    };

    Ok(RpcMessage::Call {
        id,
        method,
        params: object.get("params").cloned(),
    })
}

pub fn handle_json_rpc_request(
    widget: &WidgetTemplate,
    session: &McpSession,
    id: Option<Value>,
    method: &str,
    params: Option<Value>,
) -> Value {
    let response = match method {
        "initialize" => match negotiate_protocol_version(params.as_ref()) {
            Ok(version) => match initialize_result(version) {
                Ok(result) => {
                    session.mark_initialized();
                    json_rpc_result(id, result)
                }
                Err(_) => json_rpc_error(id, INTERNAL_ERROR, "Internal error"),
            },
            Err(err) => app_error_to_json_rpc(id, err),
        },
        "ping" => json_rpc_result(id, json!({})),
        "tools/list" => match serde_json::to_value(ListToolsResult {
            meta: None,
            next_cursor: None,
            tools: build_tools_list(),
        }) {
            Ok(result) => json_rpc_result(id, result),
            Err(_) => json_rpc_error(id, INTERNAL_ERROR, "Internal error"),
        },
        "tools/call" => handle_tools_call(id, params),
        "resources/list" => match serde_json::to_value(ListResourcesResult {
            meta: None,
            next_cursor: None,
            resources: build_resources_list(),
        }) {
            Ok(result) => json_rpc_result(id, result),
            Err(_) => json_rpc_error(id, INTERNAL_ERROR, "Internal error"),
        },
        "resources/read" => handle_resources_read(widget, id, params),
        name if is_known_tool(name) => call_tool(id, name, params),
        _ => json_rpc_error(id, METHOD_NOT_FOUND, "Method not found"),
    };

    info!(
        method = %method,
        session_id = %session.id(),
        initialized = session.is_initialized(),
        outcome = if is_json_rpc_error(&response) { "failure" } else { "success" },
        "mcp action audited"
    );

    response
}

pub fn negotiate_protocol_version(params: Option<&Value>) -> Result<&'static str, AppError> {
    let offered_version = params
        .and_then(Value::as_object)
        .and_then(|object| object.get("protocolVersion"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|version| !version.is_empty())
        .ok_or_else(|| {
            AppError::bad_request(
                "invalid_protocol_version",
                "initialize params.protocolVersion is required",
            )
        })?;

    Ok(SUPPORTED_PROTOCOL_VERSIONS
        .iter()
        .copied()
        .find(|version| *version == offered_version)
        .unwrap_or(SUPPORTED_PROTOCOL_VERSIONS[0]))
}

fn initialize_result(protocol_version: &str) -> Result<Value, serde_json::Error> {
    serde_json::to_value(InitializeResult {
        server_info: Implementation {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            title: Some("DailyCard".to_string()),
            description: None,
            icons: vec![],
            website_url: None,
        },
        capabilities: ServerCapabilities {
            tools: Some(ServerCapabilitiesTools {
                list_changed: Some(false),
            }),
            resources: Some(ServerCapabilitiesResources {
                subscribe: Some(false),
                list_changed: Some(false),
            }),
            prompts: None,
            ..Default::default()
        },
        protocol_version: protocol_version.to_string(),
        instructions: None,
        meta: None,
    })
}
