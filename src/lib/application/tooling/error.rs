use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolInvokeError {
    #[error("failed to spawn MCP server '{server}': {source}")]
    Spawn {
        server: String,
        #[source]
        source: std::io::Error,
    },
    #[error("MCP server '{server}' transport error: {message}")]
    Transport { server: String, message: String },
    #[error("MCP server '{server}' returned invalid JSON: {source}")]
    InvalidJson {
        server: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("MCP server '{server}' returned JSON-RPC error {code}: {message}")]
    Rpc {
        server: String,
        code: i64,
        message: String,
    },
    #[error("MCP server '{server}' returned an unexpected {method} payload: {source}")]
    UnexpectedPayload {
        server: String,
        method: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("MCP server '{server}' terminated unexpectedly")]
    Terminated { server: String },
    #[error("MCP server '{server}' request cancelled")]
    Cancelled { server: String },
}

impl ToolInvokeError {
    /// Whether the server answered and rejected the request, as opposed to the
    /// connection itself failing.
    pub fn is_server_rejection(&self) -> bool {
        matches!(self, ToolInvokeError::Rpc { .. })
    }
}
