//! Model infrastructure module
//!
//! Streaming LLM clients behind a factory.
//!
//! # Structure
//! - `types` - Request, chunk and Error types
//! - `traits` - ModelClient trait
//! - `adapter` - Message and tool format adapters
//! - `accumulator` - Reassembly of streamed turns
//! - `factory` - Provider factory for creating clients
//! - `clients` - Individual client implementations

pub mod accumulator;
pub mod adapter;
pub mod clients;
pub mod factory;
pub mod traits;
pub mod types;

// Re-exports for convenience
pub use accumulator::ChunkAccumulator;
pub use factory::ProviderFactory;
pub use traits::ModelClient;
pub use types::{FinishReason, ModelChunk, ModelError, ModelRequest, ModelStream, ToolCallChunk};
