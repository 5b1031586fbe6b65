//! # Orchestration Graph
//!
//! A two-node cycle between the model (`Assistant`) and the tool server
//! (`Tools`):
//!
//! 1. `Assistant` streams one model turn and appends the assistant message
//! 2. If that message requests tool calls, `Tools` executes them in order and
//!    appends one tool message per call, then control returns to `Assistant`
//! 3. Otherwise the run reaches `Terminal`
//!
//! State is checkpointed per thread after every node, so a later run on the
//! same thread continues the conversation.

mod checkpoint;
mod error;
mod runner;

pub use checkpoint::{Checkpoint, MemoryCheckpointer};
pub use error::GraphError;
pub use runner::{AgentGraph, GraphEventStream, GraphOptions};

use crate::domain::types::{ChatMessage, MessageRole};
use crate::infrastructure::model::ModelChunk;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphNode {
    Assistant,
    Tools,
    Terminal,
}

impl fmt::Display for GraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GraphNode::Assistant => "assistant",
            GraphNode::Tools => "tools",
            GraphNode::Terminal => "terminal",
        };
        f.write_str(name)
    }
}

/// Conversation history of one thread. The system prompt is not stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphState {
    pub messages: Vec<ChatMessage>,
}

impl GraphState {
    pub fn last_assistant(&self) -> Option<&ChatMessage> {
        self.messages
            .iter()
            .rev()
            .find(|message| message.role == MessageRole::Assistant)
    }
}

/// Conditional edge out of the assistant node.
pub fn route_after_assistant(state: &GraphState) -> GraphNode {
    match state.messages.last() {
        Some(message) if message.role == MessageRole::Assistant && message.has_tool_calls() => {
            GraphNode::Tools
        }
        _ => GraphNode::Terminal,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GraphEvent {
    /// A chunk streamed by the assistant node.
    ModelChunk(ModelChunk),
    /// A tool message appended by the tools node.
    ToolResult(ChatMessage),
    Transition { from: GraphNode, to: GraphNode },
}
