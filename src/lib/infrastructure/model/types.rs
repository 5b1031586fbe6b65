//! Model types - Request, streamed chunk, and Error types

use crate::application::tooling::ToolDescriptor;
use crate::domain::types::ChatMessage;
use futures::stream::BoxStream;
use reqwest::StatusCode;
use thiserror::Error;

/// Model request for one assistant turn
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolDescriptor>,
    pub temperature: f32,
}

/// Partial tool call as delivered by a streaming provider.
///
/// Fragments sharing an `index` belong to the same call; `arguments` is a
/// piece of the JSON argument text to be concatenated in arrival order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolCallChunk {
    pub index: usize,
    pub id: Option<String>,
    pub name: Option<String>,
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Length,
    Other(String),
}

impl FinishReason {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "stop" => FinishReason::Stop,
            "tool_calls" | "function_call" => FinishReason::ToolCalls,
            "length" | "max_tokens" => FinishReason::Length,
            other => FinishReason::Other(other.to_string()),
        }
    }
}

/// One increment of a streamed model turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelChunk {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallChunk>,
    /// Set on the last chunk of a turn.
    pub finish_reason: Option<FinishReason>,
}

impl ModelChunk {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn tool_call(fragment: ToolCallChunk) -> Self {
        Self {
            tool_calls: vec![fragment],
            ..Self::default()
        }
    }

    pub fn finished(reason: FinishReason) -> Self {
        Self {
            finish_reason: Some(reason),
            ..Self::default()
        }
    }

    pub fn is_final(&self) -> bool {
        self.finish_reason.is_some()
    }
}

pub type ModelStream = BoxStream<'static, Result<ModelChunk, ModelError>>;

/// Model errors
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("provider '{provider}' requires an API key")]
    MissingApiKey { provider: String },
    #[error("network error calling provider '{provider}': {source}")]
    Network {
        provider: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("provider '{provider}' responded with HTTP {status}: {body}")]
    Status {
        provider: String,
        status: StatusCode,
        body: String,
    },
    #[error("stream from provider '{provider}' failed: {reason}")]
    Stream { provider: String, reason: String },
    #[error("provider '{provider}' returned invalid response: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

impl ModelError {
    pub fn missing_api_key(provider: impl Into<String>) -> Self {
        Self::MissingApiKey {
            provider: provider.into(),
        }
    }

    pub fn network(provider: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            provider: provider.into(),
            source,
        }
    }

    pub fn status(provider: impl Into<String>, status: StatusCode, body: impl Into<String>) -> Self {
        Self::Status {
            provider: provider.into(),
            status,
            body: body.into(),
        }
    }

    pub fn stream(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Stream {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_response(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    /// Short message for the console.
    pub fn user_message(&self) -> String {
        match self {
            ModelError::MissingApiKey { provider } => {
                format!("Provider '{provider}' needs an API key. Check config/.env.")
            }
            ModelError::Network { provider, source } => {
                if source.is_connect() {
                    format!("Could not connect to model provider '{provider}'.")
                } else if source.is_timeout() {
                    format!("Request to '{provider}' timed out.")
                } else {
                    format!("Network error talking to '{provider}'.")
                }
            }
            ModelError::Status {
                provider, status, ..
            } => match *status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    format!("Provider '{provider}' rejected the API key.")
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    format!("Provider '{provider}' is rate limiting requests.")
                }
                StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY => {
                    format!("Provider '{provider}' is currently unavailable.")
                }
                other => format!("Request to '{provider}' failed: {}", other.as_u16()),
            },
            ModelError::Stream { provider, .. } => {
                format!("The response stream from '{provider}' was interrupted.")
            }
            ModelError::InvalidResponse { provider, .. } => {
                format!("Provider '{provider}' sent a response that could not be read.")
            }
        }
    }
}
