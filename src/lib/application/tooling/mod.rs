//! MCP tool/resource provider client.

mod error;
mod interface;
mod process;
mod types;

pub use error::ToolInvokeError;
pub use interface::ToolServerInterface;
pub use process::McpProcess;
pub use types::{
    ResourceContents, ResourceDescriptor, ToolCallResult, ToolContent, ToolDescriptor,
    render_resource_contents,
};
