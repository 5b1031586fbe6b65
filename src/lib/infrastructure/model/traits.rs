//! Model traits

use super::types::{ModelError, ModelRequest, ModelStream};
use async_trait::async_trait;

/// A hosted chat model that answers with a chunk stream.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Get the client ID
    fn id(&self) -> &str;

    /// Start one assistant turn. Errors before the first byte are returned
    /// directly; errors mid-stream arrive as stream items.
    async fn stream(&self, request: ModelRequest) -> Result<ModelStream, ModelError>;
}
