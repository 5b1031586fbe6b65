//! Gemini client implementation

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use super::base::HttpClientBase;
use crate::config::ModelProviderConfig;
use crate::constants::DEFAULT_GEMINI_API_PATH;
use crate::infrastructure::model::adapter::MessageAdapter;
use crate::infrastructure::model::factory::resolve_api_key;
use crate::infrastructure::model::traits::ModelClient;
use crate::infrastructure::model::types::{
    FinishReason, ModelChunk, ModelError, ModelRequest, ModelStream, ToolCallChunk,
};

/// Gemini client for Google AI
#[derive(Clone)]
pub struct GeminiClient {
    base: HttpClientBase,
    api_path: String,
}

impl GeminiClient {
    pub fn from_config(config: &ModelProviderConfig) -> Self {
        let api_key = resolve_api_key(&config.id, config.api_key.as_deref());
        Self {
            base: HttpClientBase::new(config.id.clone(), config.endpoint.clone(), api_key),
            api_path: config
                .api_path
                .clone()
                .unwrap_or_else(|| DEFAULT_GEMINI_API_PATH.to_string()),
        }
    }

    fn build_model_url(&self, model: &str) -> String {
        let path = self.api_path.trim_matches('/');
        self.base
            .build_url(&format!("{path}/{model}:streamGenerateContent"))
    }
}

pub(crate) fn build_payload(request: &ModelRequest) -> Value {
    let (system_text, contents) = MessageAdapter::to_gemini_format(&request.messages);

    let mut payload = json!({
        "contents": contents,
        "generationConfig": {
            "temperature": request.temperature
        }
    });

    if let Some(system) = system_text {
        payload["system_instruction"] = json!({
            "parts": [{"text": system}]
        });
    }

    let tools = MessageAdapter::to_gemini_tools(&request.tools);
    if !tools.is_empty() {
        payload["tools"] = Value::Array(tools);
    }
    payload
}

#[async_trait]
impl ModelClient for GeminiClient {
    fn id(&self) -> &str {
        &self.base.id
    }

    async fn stream(&self, request: ModelRequest) -> Result<ModelStream, ModelError> {
        let url = self.build_model_url(&request.model);
        let payload = build_payload(&request);

        info!(
            provider = self.base.id.as_str(),
            model = request.model.as_str(),
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Streaming request to Gemini"
        );

        let mut decoder = GeminiDecoder::new(self.base.id.clone());
        self.base
            .stream_with_query_key(&url, &payload, move |data| decoder.decode(data))
            .await
    }
}

/// Turns `streamGenerateContent` SSE payloads into chunks.
///
/// Gemini sends whole function calls, so each becomes a single fragment with
/// a turn-wide running index.
pub(crate) struct GeminiDecoder {
    provider: String,
    next_index: usize,
}

impl GeminiDecoder {
    pub(crate) fn new(provider: String) -> Self {
        Self {
            provider,
            next_index: 0,
        }
    }

    pub(crate) fn decode(&mut self, data: &str) -> Result<Vec<ModelChunk>, ModelError> {
        let response: GeminiStreamResponse = serde_json::from_str(data)
            .map_err(|err| ModelError::invalid_response(&self.provider, err.to_string()))?;

        if let Some(error) = response.error {
            return Err(ModelError::invalid_response(
                &self.provider,
                error.message.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }

        let Some(candidate) = response.candidates.into_iter().next() else {
            return Ok(Vec::new());
        };

        let mut chunks = Vec::new();
        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            if part.thought {
                continue;
            }
            if let Some(call) = part.function_call {
                let index = self.next_index;
                self.next_index += 1;
                chunks.push(ModelChunk::tool_call(ToolCallChunk {
                    index,
                    id: call.id,
                    name: Some(call.name),
                    arguments: call.args.unwrap_or_else(|| json!({})).to_string(),
                }));
            } else if let Some(text) = part.text.filter(|text| !text.is_empty()) {
                chunks.push(ModelChunk::text(text));
            }
        }

        if let Some(reason) = candidate.finish_reason {
            let reason = if self.next_index > 0 {
                FinishReason::ToolCalls
            } else {
                FinishReason::parse(&reason)
            };
            chunks.push(ModelChunk::finished(reason));
        }
        Ok(chunks)
    }
}

#[derive(Deserialize)]
struct GeminiStreamResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    error: Option<GeminiError>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    text: Option<String>,
    function_call: Option<GeminiFunctionCall>,
    #[serde(default)]
    thought: bool,
}

#[derive(Deserialize)]
struct GeminiFunctionCall {
    id: Option<String>,
    name: String,
    args: Option<Value>,
}

#[derive(Deserialize)]
struct GeminiError {
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::tooling::ToolDescriptor;
    use crate::domain::types::ChatMessage;

    #[test]
    fn decoder_emits_text_then_finish() {
        let mut decoder = GeminiDecoder::new("gemini".into());
        let first = decoder
            .decode(r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Reasoning: "}]}}]}"#)
            .expect("chunk");
        assert_eq!(first, vec![ModelChunk::text("Reasoning: ")]);

        let last = decoder
            .decode(r#"{"candidates":[{"content":{"parts":[{"text":"done"}]},"finishReason":"STOP"}]}"#)
            .expect("chunk");
        assert_eq!(last.len(), 2);
        assert_eq!(last[1].finish_reason, Some(FinishReason::Stop));
    }

    #[test]
    fn decoder_indexes_function_calls() {
        let mut decoder = GeminiDecoder::new("gemini".into());
        let chunks = decoder
            .decode(
                r#"{"candidates":[{"content":{"parts":[
                    {"functionCall":{"name":"check_merchant_status","args":{"merchant_id":"M-1"}}},
                    {"functionCall":{"name":"notify_customer","args":{"order_id":"42"}}}
                ]},"finishReason":"STOP"}]}"#,
            )
            .expect("chunk");
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].tool_calls[0].index, 0);
        assert_eq!(chunks[1].tool_calls[0].index, 1);
        assert_eq!(chunks[1].tool_calls[0].id, None);
        assert_eq!(
            chunks[0].tool_calls[0].arguments,
            r#"{"merchant_id":"M-1"}"#
        );
        assert_eq!(chunks[2].finish_reason, Some(FinishReason::ToolCalls));
    }

    #[test]
    fn decoder_surfaces_error_payloads() {
        let mut decoder = GeminiDecoder::new("gemini".into());
        let err = decoder
            .decode(r#"{"error":{"code":400,"message":"API key not valid"}}"#)
            .expect_err("error payload");
        assert!(err.to_string().contains("API key not valid"));
    }

    #[test]
    fn payload_includes_tools_and_temperature() {
        let request = ModelRequest {
            model: "gemini-2.5-flash".into(),
            messages: vec![ChatMessage::system("sys"), ChatMessage::user("hi")],
            tools: vec![ToolDescriptor::new("list_incidents", "Open incidents")],
            temperature: 0.0,
        };
        let payload = build_payload(&request);
        assert_eq!(payload["system_instruction"]["parts"][0]["text"], "sys");
        assert_eq!(payload["generationConfig"]["temperature"], 0.0);
        assert_eq!(
            payload["tools"][0]["functionDeclarations"][0]["name"],
            "list_incidents"
        );
        assert_eq!(payload["contents"].as_array().map(Vec::len), Some(1));
    }
}
