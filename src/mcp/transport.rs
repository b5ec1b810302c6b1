use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::McpError;
use crate::mcp::wire::{
    JsonRpcRequest, JsonRpcResponse, ToolsCallParams, ToolsCallResult, ToolsListResult,
};

/// Transport seam between the agent core and one collaborator service.
///
/// `HttpMcpTransport` is the one real implementation; tests substitute a
/// hand-written mock that returns canned responses, mirroring the teacher's
/// `MockModel` pattern for `ChatModel`.
#[async_trait]
pub trait McpTransport: Send + Sync {
    async fn list_tools(&self) -> Result<ToolsListResult, McpError>;

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolsCallResult, McpError>;
}

/// HTTP JSON-RPC 2.0 client for one collaborator service endpoint.
pub struct HttpMcpTransport {
    client: Client,
    base_url: String,
    next_id: AtomicU64,
}

impl HttpMcpTransport {
    pub fn new(base_url: impl Into<String>) -> Result<Self, McpError> {
        let client = Client::builder()
            .build()
            .map_err(|err| McpError::Unreachable(err.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn rpc(&self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        let request = JsonRpcRequest::new(self.next_request_id(), method, params);

        let response = self
            .client
            .post(&self.base_url)
            .json(&request)
            .send()
            .await
            .map_err(|err| McpError::Unreachable(err.to_string()))?;

        if !response.status().is_success() {
            return Err(McpError::Status(response.status().as_u16()));
        }

        let body = response
            .json::<JsonRpcResponse>()
            .await
            .map_err(|err| McpError::Malformed(err.to_string()))?;

        if let Some(error) = body.error {
            return Err(McpError::ToolError(format!(
                "{} ({})",
                error.message, error.code
            )));
        }

        body.result
            .ok_or_else(|| McpError::Malformed("response had neither result nor error".to_string()))
    }
}

#[async_trait]
impl McpTransport for HttpMcpTransport {
    async fn list_tools(&self) -> Result<ToolsListResult, McpError> {
        let result = self.rpc("tools/list", None).await?;
        serde_json::from_value(result).map_err(|err| McpError::Malformed(err.to_string()))
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolsCallResult, McpError> {
        let params = ToolsCallParams {
            name: name.to_string(),
            arguments,
        };
        let result = self
            .rpc("tools/call", Some(json!(params)))
            .await?;
        serde_json::from_value(result).map_err(|err| McpError::Malformed(err.to_string()))
    }
}

#[cfg(test)]
pub mod mock {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Canned-response transport for tests, mirroring the teacher's
    /// `MockModel { responses: Mutex<VecDeque<...>> }` idiom.
    pub struct MockMcpTransport {
        pub list_responses: Mutex<VecDeque<Result<ToolsListResult, McpError>>>,
        pub call_responses: Mutex<VecDeque<Result<ToolsCallResult, McpError>>>,
        pub calls: Mutex<Vec<(String, Value)>>,
    }

    impl MockMcpTransport {
        pub fn new() -> Self {
            Self {
                list_responses: Mutex::new(VecDeque::new()),
                call_responses: Mutex::new(VecDeque::new()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn push_list(&self, response: Result<ToolsListResult, McpError>) {
            self.list_responses.lock().unwrap().push_back(response);
        }

        pub fn push_call(&self, response: Result<ToolsCallResult, McpError>) {
            self.call_responses.lock().unwrap().push_back(response);
        }
    }

    #[async_trait]
    impl McpTransport for MockMcpTransport {
        async fn list_tools(&self) -> Result<ToolsListResult, McpError> {
            self.list_responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(ToolsListResult { tools: vec![] }))
        }

        async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolsCallResult, McpError> {
            self.calls
                .lock()
                .unwrap()
                .push((name.to_string(), arguments));
            self.call_responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(McpError::UnknownTool(name.to_string())))
        }
    }
}
