//! Model Context Protocol template resources
//!
//! Exposes the DailyCard widget, an HTML fragment with the bundled component
//! script inlined, under a fixed `ui://` URI.

use std::{path::Path, sync::Arc};

use rust_mcp_sdk::schema::{
    ReadResourceContent, ReadResourceRequestParams, ReadResourceResult, Resource,
    TextResourceContents,
};
use serde_json::{json, Map, Value};

use crate::mcp::rpc::{
    json_rpc_error, json_rpc_error_with_data, json_rpc_result, INTERNAL_ERROR, INVALID_PARAMS,
    METHOD_NOT_FOUND,
};

pub const TEMPLATE_URI: &str = "ui://widget/dailycard.html";
pub const TEMPLATE_MIME_TYPE: &str = "text/html+skybridge";

/// The rendered widget markup, built once from the script bundle.
#[derive(Debug, Clone)]
pub struct WidgetTemplate {
    html: Arc<str>,
}

impl WidgetTemplate {
    pub fn new(script: &str) -> Self {
        let html = format!(
            "<div id=\"dailycard-root\"></div>\n<script type=\"module\">\n{script}\n</script>\n"
        );
        Self {
            html: Arc::from(html),
        }
    }

    pub async fn load(path: &Path) -> std::io::Result<Self> {
        let script = tokio::fs::read_to_string(path).await?;
        Ok(Self::new(&script))
    }

    pub fn html(&self) -> &str {
        &self.html
    }
}

pub fn build_resources_list() -> Vec<Resource> {
    vec![Resource {
        annotations: None,
        description: Some("DailyCard 塔罗牌展示卡片".to_string()),
        icons: vec![],
        meta: Some(widget_meta()),
        mime_type: Some(TEMPLATE_MIME_TYPE.to_string()),
        name: "dailycard-widget".to_string(),
        size: None,
        title: None,
        uri: TEMPLATE_URI.to_string(),
    }]
}

fn widget_meta() -> Map<String, Value> {
    Map::from_iter([
        (
            "openai/widgetDescription".to_string(),
            json!("DailyCard 塔罗牌展示卡片"),
        ),
        ("openai/widgetPrefersBorder".to_string(), json!(true)),
    ])
}

pub fn handle_resources_read(
    widget: &WidgetTemplate,
    id: Option<Value>,
    params: Option<Value>,
) -> Value {
    let Some(raw_params) = params else {
        return json_rpc_error(id, INVALID_PARAMS, "Invalid params");
    };

    let resource_read: ReadResourceRequestParams = match serde_json::from_value(raw_params) {
        Ok(value) => value,
        Err(_) => return json_rpc_error(id, INVALID_PARAMS, "Invalid params"),
    };

    match resource_read.uri.as_str() {
        TEMPLATE_URI => {
            let result = serde_json::to_value(ReadResourceResult {
                contents: vec![ReadResourceContent::from(TextResourceContents {
                    meta: Some(widget_meta()),
                    mime_type: Some(TEMPLATE_MIME_TYPE.to_string()),
                    text: widget.html().to_string(),
                    uri: TEMPLATE_URI.to_string(),
                })],
                meta: None,
            });

            match result {
                Ok(value) => json_rpc_result(id, value),
                Err(_) => json_rpc_error(id, INTERNAL_ERROR, "Internal error"),
            }
        }
        _ => json_rpc_error_with_data(
            id,
            METHOD_NOT_FOUND,
            "Method not found",
            Some(json!({
                "code": "resource_not_found",
                "message": "unknown resource uri",
                "details": {
                    "uri": resource_read.uri,
                },
            })),
        ),
    }
}
