//! # Application Module
//!
//! Agent logic on top of the model and tool-server boundaries.
//!
//! ## Submodules
//!
//! - [`tooling`] - MCP tool/resource server session
//! - [`prompt`] - System prompt assembly
//! - [`graph`] - Assistant/tools orchestration loop with checkpoints
//! - [`formatter`] - Labeled blocks from streamed model output
//! - [`console`] - Interactive console loop

pub mod console;
pub mod formatter;
pub mod graph;
pub mod prompt;
pub mod tooling;
