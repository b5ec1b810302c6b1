use std::collections::HashMap;

use serde_json::Value;

use crate::error::McpError;
use crate::mcp::transport::McpTransport;
use crate::model::ToolDescriptor;

/// Which collaborator a tool was discovered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collaborator {
    Browser,
    Data,
}

/// Discovers and classifies every tool advertised by the two collaborator
/// services, and dispatches calls back to the owning transport
/// (`spec.md` §3, §4.1).
pub struct ToolRegistry {
    browser: Box<dyn McpTransport>,
    data: Box<dyn McpTransport>,
    descriptors: HashMap<String, (Collaborator, ToolDescriptor)>,
}

impl ToolRegistry {
    /// Bootstraps the registry by calling `tools/list` on both collaborators.
    /// Fails with `McpError::NoTools` if the union of both is empty.
    pub async fn bootstrap(
        browser: Box<dyn McpTransport>,
        data: Box<dyn McpTransport>,
    ) -> Result<Self, McpError> {
        let mut descriptors = HashMap::new();

        for (collaborator, transport) in [(Collaborator::Browser, &browser), (Collaborator::Data, &data)] {
            let listed = transport.list_tools().await?;
            if listed.tools.is_empty() {
                return Err(McpError::NoTools);
            }
            for raw in listed.tools {
                let descriptor = ToolDescriptor {
                    read_only: ToolDescriptor::derive_read_only(&raw.name, raw.read_only_hint),
                    name: raw.name.clone(),
                    description: raw.description,
                    parameters: raw.parameters,
                };
                descriptors.insert(raw.name, (collaborator, descriptor));
            }
        }

        Ok(Self {
            browser,
            data,
            descriptors,
        })
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.descriptors.get(name).map(|(_, descriptor)| descriptor)
    }

    pub fn all(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.descriptors.values().map(|(_, descriptor)| descriptor)
    }

    /// Read-only tools on the data collaborator only, for use as probes
    /// (`spec.md` §4.1): a `ui.*` tool is never eligible even if
    /// misclassified as read-only.
    pub fn read_only_tools(&self) -> Vec<&ToolDescriptor> {
        self.descriptors
            .values()
            .filter(|(collaborator, descriptor)| *collaborator == Collaborator::Data && descriptor.read_only)
            .map(|(_, descriptor)| descriptor)
            .collect()
    }

    pub fn ui_tools(&self) -> Vec<&ToolDescriptor> {
        self.all().filter(|tool| tool.is_ui_action()).collect()
    }

    /// Dispatches a call to whichever collaborator advertised `name`.
    pub async fn call(&self, name: &str, arguments: Value) -> Result<Value, McpError> {
        let (collaborator, descriptor) = self
            .descriptors
            .get(name)
            .ok_or_else(|| McpError::UnknownTool(name.to_string()))?;

        let transport = match collaborator {
            Collaborator::Browser => self.browser.as_ref(),
            Collaborator::Data => self.data.as_ref(),
        };

        let _ = descriptor;
        let result = transport.call_tool(name, arguments).await?;
        if result.is_error {
            return Err(McpError::ToolError(format!(
                "'{name}' returned an error result"
            )));
        }

        Ok(result.into_value())
    }

    /// Calls a read-only tool. Returns `McpError::ToolError` if `name` is not
    /// flagged read-only, enforcing the Probe Broker's read-only-only
    /// invariant at the registry boundary (`spec.md` §4.6).
    pub async fn call_read_only(&self, name: &str, arguments: Value) -> Result<Value, McpError> {
        match self.get(name) {
            Some(descriptor) if descriptor.read_only => self.call(name, arguments).await,
            Some(_) => Err(McpError::ToolError(format!(
                "'{name}' is not read-only; refusing to use it as a probe"
            ))),
            None => Err(McpError::UnknownTool(name.to_string())),
        }
    }
}
