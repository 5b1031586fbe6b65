//! OpenAI-compatible client implementation

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::base::HttpClientBase;
use crate::config::ModelProviderConfig;
use crate::infrastructure::model::adapter::MessageAdapter;
use crate::infrastructure::model::factory::resolve_api_key;
use crate::infrastructure::model::traits::ModelClient;
use crate::infrastructure::model::types::{
    FinishReason, ModelChunk, ModelError, ModelRequest, ModelStream, ToolCallChunk,
};

/// OpenAI-compatible client (works with OpenAI, Mistral, Groq, OpenRouter, etc.)
#[derive(Clone)]
pub struct OpenAIClient {
    base: HttpClientBase,
    api_path: String,
}

impl OpenAIClient {
    pub fn from_config(config: &ModelProviderConfig) -> Self {
        let api_key = resolve_api_key(&config.id, config.api_key.as_deref());
        Self {
            base: HttpClientBase::new(config.id.clone(), config.endpoint.clone(), api_key),
            api_path: config
                .api_path
                .clone()
                .unwrap_or_else(|| "/chat/completions".to_string()),
        }
    }
}

#[async_trait]
impl ModelClient for OpenAIClient {
    fn id(&self) -> &str {
        &self.base.id
    }

    async fn stream(&self, request: ModelRequest) -> Result<ModelStream, ModelError> {
        let url = self.base.build_url(&self.api_path);

        let payload = OpenAIRequest {
            model: request.model.clone(),
            messages: MessageAdapter::to_openai_format(&request.messages),
            tools: MessageAdapter::to_openai_tools(&request.tools),
            temperature: request.temperature,
            stream: true,
        };

        info!(
            provider = self.base.id.as_str(),
            model = request.model.as_str(),
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Streaming request to OpenAI-compatible provider"
        );

        let provider = self.base.id.clone();
        self.base
            .stream_with_bearer(&url, &payload, move |data| decode_delta(&provider, data))
            .await
    }
}

/// Map one `chat.completion.chunk` to at most one model chunk; tool-call
/// deltas are passed through as indexed fragments.
pub(crate) fn decode_delta(provider: &str, data: &str) -> Result<Vec<ModelChunk>, ModelError> {
    let response: StreamResponse = serde_json::from_str(data)
        .map_err(|err| ModelError::invalid_response(provider, err.to_string()))?;

    let Some(choice) = response.choices.into_iter().next() else {
        return Ok(Vec::new());
    };

    let chunk = ModelChunk {
        content: choice.delta.content.filter(|c| !c.is_empty()),
        tool_calls: choice
            .delta
            .tool_calls
            .into_iter()
            .map(|delta| {
                let (name, arguments) = match delta.function {
                    Some(function) => (function.name, function.arguments.unwrap_or_default()),
                    None => (None, String::new()),
                };
                ToolCallChunk {
                    index: delta.index,
                    id: delta.id,
                    name,
                    arguments,
                }
            })
            .collect(),
        finish_reason: choice.finish_reason.as_deref().map(FinishReason::parse),
    };

    if chunk == ModelChunk::default() {
        Ok(Vec::new())
    } else {
        Ok(vec![chunk])
    }
}

#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCallDelta>,
}

#[derive(Deserialize)]
struct ToolCallDelta {
    #[serde(default)]
    index: usize,
    id: Option<String>,
    function: Option<FunctionDelta>,
}

#[derive(Deserialize)]
struct FunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}
