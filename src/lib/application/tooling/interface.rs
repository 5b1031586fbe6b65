use async_trait::async_trait;
use serde_json::Value;

use super::error::ToolInvokeError;
use super::types::{ResourceContents, ResourceDescriptor, ToolCallResult, ToolDescriptor};

/// The operations the agent needs from a tool/resource server session.
#[async_trait]
pub trait ToolServerInterface: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolInvokeError>;

    async fn list_resources(&self) -> Result<Vec<ResourceDescriptor>, ToolInvokeError>;

    async fn read_resource(&self, uri: &str) -> Result<Vec<ResourceContents>, ToolInvokeError>;

    async fn call_tool(
        &self,
        tool: &str,
        arguments: Value,
    ) -> Result<ToolCallResult, ToolInvokeError>;
}
