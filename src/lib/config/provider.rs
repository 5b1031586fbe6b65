//! # Provider Configuration
//!
//! Configuration types for hosted model providers.
//!
//! | Type | Description | API Key Required |
//! |------|-------------|-----------------|
//! | `gemini` | Google Gemini API | Yes |
//! | `openai` | OpenAI-compatible APIs | Yes |

use serde::{Deserialize, Serialize};

/// Information about an available model from a provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelInfo {
    /// Model identifier used in API calls (e.g., "gemini-2.5-flash")
    pub name: String,
    /// Human-readable display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Configuration for a model provider.
///
/// # Example
///
/// ```toml
/// [[providers]]
/// id = "gemini"
/// type = "gemini"
/// endpoint = "https://generativelanguage.googleapis.com"
/// api_key = "GEMINI_API_KEY"
/// models = ["gemini-2.5-flash"]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelProviderConfig {
    /// Unique identifier for this provider (e.g., "gemini")
    pub id: String,
    /// The provider type determines API format: "gemini" or "openai"
    #[serde(rename = "type")]
    pub provider_type: String,
    /// API endpoint URL
    pub endpoint: String,
    /// Name of the environment variable that holds the API key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Custom API path override (e.g., "v1beta/models" for Gemini)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_path: Option<String>,
    /// List of available models from this provider
    pub models: Vec<ModelInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct RawProviderConfig {
    pub(super) id: String,
    #[serde(rename = "type", default)]
    pub(super) provider_type: String,
    pub(super) endpoint: Option<String>,
    pub(super) api_key: Option<String>,
    #[serde(default)]
    pub(super) api_path: Option<String>,
    #[serde(default)]
    pub(super) models: Vec<RawModelInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(super) enum RawModelInfo {
    Name(String),
    Detailed {
        name: String,
        #[serde(default)]
        display_name: Option<String>,
    },
}

impl From<RawModelInfo> for ModelInfo {
    fn from(value: RawModelInfo) -> Self {
        match value {
            RawModelInfo::Name(name) => Self {
                name,
                display_name: None,
            },
            RawModelInfo::Detailed { name, display_name } => Self { name, display_name },
        }
    }
}

impl From<RawProviderConfig> for ModelProviderConfig {
    fn from(raw: RawProviderConfig) -> Self {
        Self {
            id: raw.id,
            provider_type: raw.provider_type,
            endpoint: raw.endpoint.unwrap_or_default(),
            api_key: raw.api_key,
            api_path: raw.api_path,
            models: raw.models.into_iter().map(ModelInfo::from).collect(),
        }
    }
}

impl ModelProviderConfig {
    /// Ensure a model exists in this provider's model list
    pub fn ensure_model(&mut self, model: &str) {
        if self.models.iter().all(|info| info.name != model) {
            self.models.push(ModelInfo {
                name: model.to_string(),
                display_name: None,
            });
        }
    }

    /// Check if this is a Gemini provider (case-insensitive).
    ///
    /// ```
    /// use lastmile_agent::config::ModelProviderConfig;
    ///
    /// let provider = ModelProviderConfig {
    ///     id: "google".to_string(),
    ///     provider_type: "GEMINI".to_string(),
    ///     endpoint: "https://example.com".to_string(),
    ///     api_key: Some("GEMINI_API_KEY".to_string()),
    ///     api_path: None,
    ///     models: vec![],
    /// };
    /// assert!(provider.is_gemini());
    /// ```
    pub fn is_gemini(&self) -> bool {
        matches!(
            self.provider_type.to_ascii_lowercase().as_str(),
            "gemini" | "google" | "google-ai"
        )
    }
}
