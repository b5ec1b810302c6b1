use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A JSON-RPC 2.0 request, used for both `tools/list` and `tools/call`
/// (`spec.md` §4.1).
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC 2.0 response envelope. Exactly one of `result` / `error` is
/// populated on a well-formed response.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    #[allow(dead_code)]
    pub jsonrpc: Option<String>,
    pub id: Option<u64>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// Raw shape of one tool descriptor as returned by `tools/list`, before the
/// read-only flag is derived (`spec.md` §3).
#[derive(Debug, Clone, Deserialize)]
pub struct RawToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_parameters_schema")]
    pub parameters: Value,
    #[serde(default, rename = "readOnly")]
    pub read_only_hint: Option<bool>,
}

fn default_parameters_schema() -> Value {
    serde_json::json!({ "type": "object" })
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolsListResult {
    #[serde(default)]
    pub tools: Vec<RawToolDescriptor>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolsCallParams {
    pub name: String,
    pub arguments: Value,
}

/// Content payload of a successful `tools/call` result. Collaborators return
/// a list of content blocks; the text block (if any) is the tool's result.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsCallResult {
    #[serde(default)]
    pub content: Vec<ToolContentBlock>,
    #[serde(default, rename = "isError")]
    pub is_error: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

impl ToolsCallResult {
    /// The tool's result as a JSON value: parses the first text block as
    /// JSON if possible, else returns it as a plain string.
    pub fn into_value(self) -> Value {
        for block in self.content {
            if let ToolContentBlock::Text { text } = block {
                return serde_json::from_str(&text).unwrap_or(Value::String(text));
            }
        }
        Value::Null
    }
}
