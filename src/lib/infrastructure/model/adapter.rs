//! Message adapters - convert between different API formats

use crate::application::tooling::ToolDescriptor;
use crate::domain::types::{ChatMessage, MessageRole};
use serde_json::{Map, Value, json};

/// Schema keywords Gemini's function declarations reject.
const GEMINI_UNSUPPORTED_KEYS: &[&str] = &[
    "$schema",
    "$id",
    "$defs",
    "$ref",
    "definitions",
    "additionalProperties",
    "default",
    "examples",
    "const",
];

/// Adapter for converting messages to different API formats
pub struct MessageAdapter;

impl MessageAdapter {
    /// Convert messages to OpenAI chat-completions format, including
    /// assistant `tool_calls` and `tool` result messages.
    pub fn to_openai_format(messages: &[ChatMessage]) -> Vec<Value> {
        messages
            .iter()
            .map(|msg| match msg.role {
                MessageRole::Assistant if msg.has_tool_calls() => {
                    let calls: Vec<Value> = msg
                        .tool_calls
                        .iter()
                        .map(|call| {
                            json!({
                                "id": call.id,
                                "type": "function",
                                "function": {
                                    "name": call.name,
                                    "arguments": call.arguments.to_string()
                                }
                            })
                        })
                        .collect();
                    let content = if msg.content.is_empty() {
                        Value::Null
                    } else {
                        Value::String(msg.content.clone())
                    };
                    json!({
                        "role": "assistant",
                        "content": content,
                        "tool_calls": calls
                    })
                }
                MessageRole::Tool => json!({
                    "role": "tool",
                    "tool_call_id": msg.tool_call_id.clone().unwrap_or_default(),
                    "content": msg.content
                }),
                role => json!({
                    "role": role.as_str(),
                    "content": msg.content
                }),
            })
            .collect()
    }

    /// Tool list in OpenAI `tools` format.
    pub fn to_openai_tools(tools: &[ToolDescriptor]) -> Vec<Value> {
        tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description_or_default(),
                        "parameters": tool.input_schema
                    }
                })
            })
            .collect()
    }

    /// Convert messages to Gemini format
    /// Returns: (system_instruction_text, contents)
    ///
    /// Assistant tool calls become `functionCall` parts of a `model` turn;
    /// consecutive tool results are grouped into one `user` turn of
    /// `functionResponse` parts.
    pub fn to_gemini_format(messages: &[ChatMessage]) -> (Option<String>, Vec<Value>) {
        let mut system_parts = Vec::new();
        let mut contents: Vec<Value> = Vec::new();
        let mut last_was_tool = false;

        for message in messages {
            match message.role {
                MessageRole::System => {
                    system_parts.push(message.content.clone());
                    last_was_tool = false;
                }
                MessageRole::User => {
                    contents.push(json!({
                        "role": "user",
                        "parts": [{"text": message.content}]
                    }));
                    last_was_tool = false;
                }
                MessageRole::Assistant => {
                    let mut parts = Vec::new();
                    if !message.content.is_empty() {
                        parts.push(json!({"text": message.content}));
                    }
                    for call in &message.tool_calls {
                        parts.push(json!({
                            "functionCall": {
                                "name": call.name,
                                "args": call.arguments
                            }
                        }));
                    }
                    if parts.is_empty() {
                        parts.push(json!({"text": ""}));
                    }
                    contents.push(json!({ "role": "model", "parts": parts }));
                    last_was_tool = false;
                }
                MessageRole::Tool => {
                    let part = json!({
                        "functionResponse": {
                            "name": message.name.clone().unwrap_or_default(),
                            "response": { "content": message.content }
                        }
                    });
                    let grouped = if last_was_tool {
                        contents
                            .last_mut()
                            .and_then(|turn| turn.get_mut("parts"))
                            .and_then(Value::as_array_mut)
                            .map(|parts| parts.push(part.clone()))
                            .is_some()
                    } else {
                        false
                    };
                    if !grouped {
                        contents.push(json!({ "role": "user", "parts": [part] }));
                    }
                    last_was_tool = true;
                }
            }
        }

        let system_instruction = if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n\n"))
        };

        (system_instruction, contents)
    }

    /// Tool list in Gemini `functionDeclarations` format.
    pub fn to_gemini_tools(tools: &[ToolDescriptor]) -> Vec<Value> {
        let declarations: Vec<Value> = tools
            .iter()
            .map(|tool| {
                let mut declaration = json!({
                    "name": tool.name,
                    "description": tool.description_or_default(),
                });
                let schema = sanitize_gemini_schema(&tool.input_schema);
                if has_properties(&schema) {
                    declaration["parameters"] = schema;
                }
                declaration
            })
            .collect();

        if declarations.is_empty() {
            Vec::new()
        } else {
            vec![json!({ "functionDeclarations": declarations })]
        }
    }
}

fn has_properties(schema: &Value) -> bool {
    schema
        .get("properties")
        .and_then(Value::as_object)
        .is_some_and(|props| !props.is_empty())
}

/// Strip JSON-Schema keywords outside Gemini's OpenAPI subset.
pub fn sanitize_gemini_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => {
            let mut cleaned = Map::new();
            for (key, value) in map {
                if GEMINI_UNSUPPORTED_KEYS.contains(&key.as_str()) {
                    continue;
                }
                match key.as_str() {
                    "properties" => {
                        let props = value
                            .as_object()
                            .map(|props| {
                                props
                                    .iter()
                                    .map(|(name, prop)| (name.clone(), sanitize_gemini_schema(prop)))
                                    .collect::<Map<_, _>>()
                            })
                            .unwrap_or_default();
                        cleaned.insert(key.clone(), Value::Object(props));
                    }
                    // `["string", "null"]` → `"string"` + `nullable`
                    "type" if value.is_array() => {
                        let types: Vec<&str> = value
                            .as_array()
                            .map(|items| items.iter().filter_map(Value::as_str).collect())
                            .unwrap_or_default();
                        if let Some(primary) = types.iter().find(|ty| **ty != "null") {
                            cleaned.insert(key.clone(), Value::String((*primary).to_string()));
                        }
                        if types.contains(&"null") {
                            cleaned.insert("nullable".into(), Value::Bool(true));
                        }
                    }
                    _ => {
                        cleaned.insert(key.clone(), sanitize_gemini_schema(value));
                    }
                }
            }
            Value::Object(cleaned)
        }
        Value::Array(items) => Value::Array(items.iter().map(sanitize_gemini_schema).collect()),
        other => other.clone(),
    }
}
