//! Turns streamed model chunks into labeled console blocks.

use crate::config::OutputFormat;
use crate::domain::types::ToolCall;
use crate::infrastructure::model::{ChunkAccumulator, ModelChunk};
use serde::Deserialize;
use std::fmt;
use tracing::{debug, warn};

const REASONING_MARKER: &str = "Reasoning:";
const RESOLUTION_MARKER: &str = "Final Resolution:";
const TOOL_CALLS_MARKER: &str = "Tool Calls:";

#[derive(Debug, Clone, PartialEq)]
pub enum FormattedBlock {
    Reasoning(String),
    ToolCalls(Vec<ToolCall>),
    Resolution(String),
}

impl fmt::Display for FormattedBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormattedBlock::Reasoning(text) => write!(f, "\n=== REASONING ===\n{text}\n"),
            FormattedBlock::ToolCalls(calls) => {
                writeln!(f, "\n=== TOOL CALLS ===")?;
                for call in calls {
                    let args = serde_json::to_string_pretty(&call.arguments)
                        .unwrap_or_else(|_| call.arguments.to_string());
                    write!(f, "=== TOOL CALL: {} ===\n{args}\n\n", call.name)?;
                }
                Ok(())
            }
            FormattedBlock::Resolution(text) => {
                write!(f, "\n=== FINAL RESOLUTION ===\n{text}\n")
            }
        }
    }
}

/// Reasoning and resolution text of one model turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sections {
    pub reasoning: String,
    pub resolution: String,
}

/// Split a marker-formatted turn.
///
/// Returns `None` when the text has no `Reasoning:` marker.
pub fn split_sections(buffer: &str) -> Option<Sections> {
    if !buffer.contains(REASONING_MARKER) {
        return None;
    }

    let (head, resolution) = match buffer.split_once(RESOLUTION_MARKER) {
        Some((head, tail)) => (head, clean_resolution(tail)),
        None => (buffer, String::new()),
    };
    let reasoning_part = head
        .rsplit_once(REASONING_MARKER)
        .map_or(head, |(_, after)| after);
    let reasoning = reasoning_part
        .replace(TOOL_CALLS_MARKER, "")
        .trim()
        .trim_matches('*')
        .trim()
        .to_string();

    Some(Sections {
        reasoning,
        resolution,
    })
}

/// Resolution text of a turn that carries no `Reasoning:` marker of its own.
pub fn split_resolution(buffer: &str) -> Option<String> {
    buffer
        .split_once(RESOLUTION_MARKER)
        .map(|(_, tail)| clean_resolution(tail))
}

/// Drop the bold markup a `**Final Resolution:**` heading leaves behind.
fn clean_resolution(tail: &str) -> String {
    tail.trim().trim_start_matches('*').trim().to_string()
}

#[derive(Deserialize)]
struct StructuredAnswer {
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    final_resolution: Option<String>,
}

/// Read a `{"reasoning": .., "final_resolution": ..}` answer, tolerating a
/// fenced code block or surrounding prose.
pub fn parse_structured(buffer: &str) -> Option<Sections> {
    let start = buffer.find('{')?;
    let end = buffer.rfind('}')?;
    if end < start {
        return None;
    }
    let answer: StructuredAnswer = serde_json::from_str(&buffer[start..=end]).ok()?;
    Some(Sections {
        reasoning: answer.reasoning.unwrap_or_default().trim().to_string(),
        resolution: answer.final_resolution.unwrap_or_default().trim().to_string(),
    })
}

/// Stateful formatter for the chunks of a graph run.
#[derive(Debug)]
pub struct ResponseFormatter {
    format: OutputFormat,
    turn: ChunkAccumulator,
    /// Set once any turn of the run carried reasoning.
    reasoning_seen: bool,
}

impl ResponseFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            turn: ChunkAccumulator::new(),
            reasoning_seen: false,
        }
    }

    /// Feed one chunk; blocks are returned once the chunk ends a model turn.
    pub fn push(&mut self, chunk: &ModelChunk) -> Vec<FormattedBlock> {
        self.turn.push(chunk);
        if chunk.is_final() {
            self.finish_turn()
        } else {
            Vec::new()
        }
    }

    /// Emit whatever the current turn holds and start a fresh one. Text
    /// buffers are per turn; whether reasoning was seen lasts for the run.
    pub fn finish_turn(&mut self) -> Vec<FormattedBlock> {
        let mut blocks = Vec::new();
        let text = self.turn.text();

        let parsed = match self.format {
            OutputFormat::Structured => parse_structured(text).or_else(|| split_sections(text)),
            OutputFormat::Markers => split_sections(text),
        };
        let sections = match parsed {
            Some(sections) => {
                self.reasoning_seen = true;
                sections
            }
            // A closing turn after tool results may hold only the resolution.
            None if self.reasoning_seen => Sections {
                reasoning: String::new(),
                resolution: split_resolution(text).unwrap_or_default(),
            },
            None => {
                if !text.trim().is_empty() {
                    warn!(
                        chars = text.len(),
                        format = ?self.format,
                        "Model output had no reasoning section; nothing printed for this turn"
                    );
                }
                Sections::default()
            }
        };

        if !sections.reasoning.is_empty() {
            blocks.push(FormattedBlock::Reasoning(sections.reasoning));
        }

        let calls = self.turn.tool_calls();
        if !calls.is_empty() {
            blocks.push(FormattedBlock::ToolCalls(calls));
        }

        if !sections.resolution.is_empty() {
            blocks.push(FormattedBlock::Resolution(sections.resolution));
        }

        debug!(blocks = blocks.len(), "Formatted model turn");
        self.turn.reset();
        blocks
    }
}

impl Default for ResponseFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Markers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::model::{FinishReason, ToolCallChunk};
    use serde_json::json;

    #[test]
    fn splits_reasoning_and_resolution() {
        let sections =
            split_sections("Reasoning: merchant overloaded  Final Resolution:  customer notified ")
                .expect("has marker");
        assert_eq!(sections.reasoning, "merchant overloaded");
        assert_eq!(sections.resolution, "customer notified");
    }

    #[test]
    fn uses_text_after_last_reasoning_marker() {
        let sections = split_sections(
            "Reasoning: plan A\nNext Step Reasoning: plan B\nTool Calls:\nFinal Resolution: done",
        )
        .expect("has marker");
        assert_eq!(sections.reasoning, "plan B");
        assert_eq!(sections.resolution, "done");
    }

    #[test]
    fn no_marker_means_no_sections() {
        assert!(split_sections("Final Resolution: done").is_none());
    }

    #[test]
    fn structured_answers_are_read_from_json() {
        let sections = parse_structured(
            "```json\n{\"reasoning\": \" check merchant \", \"final_resolution\": \"refund issued\"}\n```",
        )
        .expect("valid json");
        assert_eq!(sections.reasoning, "check merchant");
        assert_eq!(sections.resolution, "refund issued");
        assert!(parse_structured("no json here").is_none());
    }

    #[test]
    fn blocks_follow_fixed_order_and_reset_per_turn() {
        let mut formatter = ResponseFormatter::default();
        assert!(formatter.push(&ModelChunk::text("Reasoning: look up ")).is_empty());
        formatter.push(&ModelChunk::tool_call(ToolCallChunk {
            index: 0,
            id: Some("c1".into()),
            name: Some("check_merchant_status".into()),
            arguments: r#"{"merchant_id":"M-1"}"#.into(),
        }));
        let blocks = formatter.push(&ModelChunk::finished(FinishReason::ToolCalls));
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0], FormattedBlock::Reasoning("look up".into()));
        assert!(matches!(&blocks[1], FormattedBlock::ToolCalls(calls) if calls[0].arguments == json!({"merchant_id": "M-1"})));

        formatter.push(&ModelChunk::text("Reasoning: ok Final Resolution: sorted"));
        let blocks = formatter.push(&ModelChunk::finished(FinishReason::Stop));
        assert_eq!(
            blocks,
            vec![
                FormattedBlock::Reasoning("ok".into()),
                FormattedBlock::Resolution("sorted".into())
            ]
        );
    }

    #[test]
    fn blocks_render_with_headers() {
        let call = ToolCall::new("c1", "notify_customer", json!({"order_id": "42"}));
        assert_eq!(
            FormattedBlock::ToolCalls(vec![call]).to_string(),
            "\n=== TOOL CALLS ===\n=== TOOL CALL: notify_customer ===\n{\n  \"order_id\": \"42\"\n}\n\n"
        );
        assert_eq!(
            FormattedBlock::Reasoning("x".into()).to_string(),
            "\n=== REASONING ===\nx\n"
        );
        assert_eq!(
            FormattedBlock::Resolution("y".into()).to_string(),
            "\n=== FINAL RESOLUTION ===\ny\n"
        );
    }
}
