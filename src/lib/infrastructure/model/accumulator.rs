//! Reassembles one streamed model turn from its chunks.

use super::types::{FinishReason, ModelChunk};
use crate::domain::types::{ChatMessage, ToolCall};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Default, Clone)]
struct PartialCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

/// Text buffer plus tool-call fragments merged by index.
#[derive(Debug, Default, Clone)]
pub struct ChunkAccumulator {
    text: String,
    calls: BTreeMap<usize, PartialCall>,
    finish_reason: Option<FinishReason>,
}

impl ChunkAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &ModelChunk) {
        if let Some(content) = &chunk.content {
            self.text.push_str(content);
        }
        for fragment in &chunk.tool_calls {
            let call = self.calls.entry(fragment.index).or_default();
            if let Some(id) = fragment.id.as_ref().filter(|id| !id.is_empty()) {
                call.id = Some(id.clone());
            }
            if let Some(name) = fragment.name.as_ref().filter(|name| !name.is_empty()) {
                call.name = name.clone();
            }
            call.arguments.push_str(&fragment.arguments);
        }
        if let Some(reason) = &chunk.finish_reason {
            self.finish_reason = Some(reason.clone());
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn finish_reason(&self) -> Option<&FinishReason> {
        self.finish_reason.as_ref()
    }

    pub fn has_tool_calls(&self) -> bool {
        self.calls.values().any(|call| !call.name.is_empty())
    }

    /// Completed calls in index order. Calls without an id get `call_<uuid>`;
    /// fragments that never received a name are dropped.
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.calls
            .iter()
            .filter_map(|(index, call)| {
                if call.name.is_empty() {
                    warn!(index, "Dropping tool call fragment without a name");
                    return None;
                }
                let id = call
                    .id
                    .clone()
                    .unwrap_or_else(|| format!("call_{}", Uuid::new_v4()));
                Some(ToolCall::new(id, call.name.clone(), parse_arguments(call)))
            })
            .collect()
    }

    /// The assistant message for this turn.
    pub fn into_message(self) -> ChatMessage {
        let calls = self.tool_calls();
        if calls.is_empty() {
            ChatMessage::assistant(self.text)
        } else {
            ChatMessage::assistant_with_calls(self.text, calls)
        }
    }

    pub fn reset(&mut self) {
        self.text.clear();
        self.calls.clear();
        self.finish_reason = None;
    }
}

fn parse_arguments(call: &PartialCall) -> Value {
    let raw = call.arguments.trim();
    if raw.is_empty() {
        return Value::Object(Map::new());
    }
    serde_json::from_str(raw).unwrap_or_else(|err| {
        warn!(tool = call.name.as_str(), %err, "Tool call arguments are not valid JSON");
        Value::String(raw.to_string())
    })
}
