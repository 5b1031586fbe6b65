//! Typed views of MCP `tools/list`, `resources/list`, `resources/read` and
//! `tools/call` payloads.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// A tool advertised by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "inputSchema", default = "empty_object_schema")]
    pub input_schema: Value,
}

fn empty_object_schema() -> Value {
    json!({ "type": "object", "properties": {} })
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: Some(description.into()),
            input_schema: empty_object_schema(),
        }
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }

    pub fn description_or_default(&self) -> &str {
        self.description.as_deref().unwrap_or("No description available.")
    }
}

/// A readable resource advertised by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub uri: String,
    pub name: String,
    #[serde(rename = "mimeType", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ResourceDescriptor {
    pub fn new(uri: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: name.into(),
            mime_type: None,
            description: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn mime_type_or_unknown(&self) -> &str {
        self.mime_type.as_deref().unwrap_or("unknown")
    }
}

/// One entry of a `resources/read` result: either text or base64 binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceContents {
    Text {
        uri: String,
        #[serde(rename = "mimeType", default, skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
        text: String,
    },
    Blob {
        uri: String,
        #[serde(rename = "mimeType", default, skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
        blob: String,
    },
}

impl ResourceContents {
    /// Printable form: text verbatim, binary as a size marker.
    pub fn render(&self) -> String {
        match self {
            ResourceContents::Text { text, .. } => text.clone(),
            ResourceContents::Blob { blob, .. } => {
                format!("[Binary content: {} bytes]", blob_len(blob))
            }
        }
    }
}

/// Decoded size of a base64 payload; the raw length when it does not decode.
fn blob_len(blob: &str) -> usize {
    STANDARD
        .decode(blob.trim())
        .map(|bytes| bytes.len())
        .unwrap_or(blob.len())
}

/// Join every part of a read result the way the console prints it.
pub fn render_resource_contents(contents: &[ResourceContents]) -> String {
    if contents.is_empty() {
        return "No content found".to_string();
    }
    contents
        .iter()
        .map(ResourceContents::render)
        .collect::<Vec<_>>()
        .join("\n")
}

/// One content item of a `tools/call` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolContent {
    Text {
        text: String,
    },
    Image {
        #[serde(rename = "mimeType", default)]
        mime_type: Option<String>,
        data: String,
    },
    Audio {
        #[serde(rename = "mimeType", default)]
        mime_type: Option<String>,
        data: String,
    },
    Resource {
        resource: ResourceContents,
    },
    ResourceLink {
        uri: String,
        #[serde(default)]
        name: Option<String>,
    },
}

impl ToolContent {
    fn render(&self) -> String {
        match self {
            ToolContent::Text { text } => text.clone(),
            ToolContent::Image { mime_type, data } => format!(
                "[Image {}: {} bytes]",
                mime_type.as_deref().unwrap_or("unknown"),
                blob_len(data)
            ),
            ToolContent::Audio { mime_type, data } => format!(
                "[Audio {}: {} bytes]",
                mime_type.as_deref().unwrap_or("unknown"),
                blob_len(data)
            ),
            ToolContent::Resource { resource } => resource.render(),
            ToolContent::ResourceLink { uri, name } => match name {
                Some(name) => format!("[Resource {name}: {uri}]"),
                None => format!("[Resource: {uri}]"),
            },
        }
    }
}

/// Result of a `tools/call` request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ToolCallResult {
    #[serde(default)]
    pub content: Vec<ToolContent>,
    #[serde(rename = "structuredContent", default, skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

impl ToolCallResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            structured_content: None,
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::text(text)
        }
    }

    /// Text fed back to the model as the tool message body.
    pub fn render(&self) -> String {
        let mut body = self
            .content
            .iter()
            .map(ToolContent::render)
            .collect::<Vec<_>>()
            .join("\n");
        if body.trim().is_empty() {
            if let Some(structured) = &self.structured_content {
                body = structured.to_string();
            }
        }
        if self.is_error {
            format!("Error: {body}")
        } else {
            body
        }
    }
}
