//! Orchestration settings (`[agent]` table).

use super::defaults::{DEFAULT_MAX_CYCLES, DEFAULT_THREAD_ID};
use serde::Deserialize;

/// How the model is asked to lay out its answer, and how the formatter reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Free text with `Reasoning:` / `Final Resolution:` markers.
    #[default]
    Markers,
    /// A JSON object with `reasoning` and `final_resolution` fields.
    Structured,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub thread_id: String,
    pub max_cycles: usize,
    pub reject_duplicate_tool_calls: bool,
    pub output_format: OutputFormat,
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            thread_id: DEFAULT_THREAD_ID.to_string(),
            max_cycles: DEFAULT_MAX_CYCLES,
            reject_duplicate_tool_calls: true,
            output_format: OutputFormat::Markers,
            system_prompt: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(super) struct RawAgentConfig {
    #[serde(default)]
    thread_id: Option<String>,
    #[serde(default)]
    max_cycles: Option<usize>,
    #[serde(default)]
    reject_duplicate_tool_calls: Option<bool>,
    #[serde(default)]
    output_format: Option<OutputFormat>,
    #[serde(default)]
    system_prompt: Option<String>,
}

impl From<RawAgentConfig> for AgentConfig {
    fn from(raw: RawAgentConfig) -> Self {
        let defaults = AgentConfig::default();
        Self {
            thread_id: raw
                .thread_id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or(defaults.thread_id),
            max_cycles: raw.max_cycles.unwrap_or(defaults.max_cycles),
            reject_duplicate_tool_calls: raw
                .reject_duplicate_tool_calls
                .unwrap_or(defaults.reject_duplicate_tool_calls),
            output_format: raw.output_format.unwrap_or_default(),
            system_prompt: raw.system_prompt.filter(|p| !p.trim().is_empty()),
        }
    }
}
