//! Tools exposed via Model Context Protocol
//!
//! Provides `dailycard.draw`, which draws one card from the tarot deck and
//! hands the widget template a structured `card` payload.

use chrono::{SecondsFormat, Utc};
use rust_mcp_sdk::{
    macros,
    schema::{CallToolRequestParams, CallToolResult, ContentBlock, TextContent, Tool},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::domain::{resources::TEMPLATE_URI, tarot::draw_card};
use crate::mcp::rpc::{
    json_rpc_error, json_rpc_error_with_data, json_rpc_result, INTERNAL_ERROR, INVALID_PARAMS,
    METHOD_NOT_FOUND,
};

pub const DRAW_TOOL_NAME: &str = "dailycard.draw";

#[macros::mcp_tool(
    name = "dailycard.draw",
    description = "随机抽取一张塔罗牌，包含正/逆位与今日运势。"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct DailyCardDrawTool {
    pub dummy: Option<String>,
}

pub fn build_tools_list() -> Vec<Tool> {
    let mut draw = DailyCardDrawTool::tool();
    draw.title = Some("抽一张塔罗牌".to_string());
    draw.meta = Some(Map::from_iter([
        ("openai/outputTemplate".to_string(), json!(TEMPLATE_URI)),
        (
            "openai/toolInvocation/invoking".to_string(),
            json!("正在为你抽取今日的塔罗牌..."),
        ),
        (
            "openai/toolInvocation/invoked".to_string(),
            json!("已为你抽出今日塔罗牌。"),
        ),
    ]));

    vec![draw]
}

pub fn is_known_tool(name: &str) -> bool {
    name == DRAW_TOOL_NAME
}

pub fn handle_tools_call(id: Option<Value>, params: Option<Value>) -> Value {
    let Some(raw_params) = params else {
        return json_rpc_error(id, INVALID_PARAMS, "Invalid params");
    };

    let tool_call: CallToolRequestParams = match serde_json::from_value(raw_params) {
        Ok(value) => value,
        Err(_) => return json_rpc_error(id, INVALID_PARAMS, "Invalid params"),
    };

    call_tool(id, &tool_call.name, tool_call.arguments.map(Value::Object))
}

/// Runs a tool by name with already-extracted arguments.
pub fn call_tool(id: Option<Value>, name: &str, arguments: Option<Value>) -> Value {
    match name {
        DRAW_TOOL_NAME => {
            let arguments = match arguments {
                None | Some(Value::Null) => json!({}),
                Some(value) => value,
            };
            if serde_json::from_value::<DailyCardDrawTool>(arguments).is_err() {
                return json_rpc_error(id, INVALID_PARAMS, "Invalid params");
            }

            let card = draw_card();
            let drawn_at_utc = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);

            let result = CallToolResult {
                content: vec![ContentBlock::from(TextContent::new(
                    card.summary(),
                    None,
                    None,
                ))],
                is_error: None,
                meta: None,
                structured_content: Some(Map::from_iter([
                    ("card".to_string(), json!(card)),
                    ("drawn_at_utc".to_string(), json!(drawn_at_utc)),
                ])),
            };

            match serde_json::to_value(result) {
                Ok(value) => json_rpc_result(id, value),
                Err(_) => json_rpc_error(id, INTERNAL_ERROR, "Internal error"),
            }
        }
        _ => json_rpc_error_with_data(
            id,
            METHOD_NOT_FOUND,
            "Method not found",
            Some(json!({
                "code": "tool_not_found",
                "message": "unknown tool name",
                "details": {
                    "name": name,
                },
            })),
        ),
    }
}
