//! Provider factory - creates clients from config

use super::clients::{GeminiClient, OpenAIClient};
use super::traits::ModelClient;
use crate::config::ModelProviderConfig;
use std::env;
use std::sync::Arc;
use tracing::{debug, warn};

/// Resolve API key from environment variable
pub fn resolve_api_key(provider: &str, spec: Option<&str>) -> Option<String> {
    let Some(raw) = spec.map(str::trim) else {
        return None;
    };
    if raw.is_empty() {
        return None;
    }
    match env::var(raw) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(
                provider,
                env_var = raw,
                %err,
                "API key environment variable is not set"
            );
            None
        }
    }
}

/// Factory for creating model clients from provider config.
pub struct ProviderFactory;

impl ProviderFactory {
    /// Creates a model client based on provider type.
    ///
    /// Supported types:
    /// - `gemini`, `google`, `google-ai` → Gemini format
    /// - Others → OpenAI-compatible format (default)
    pub fn create(config: &ModelProviderConfig) -> Arc<dyn ModelClient> {
        debug!(
            provider = config.id.as_str(),
            provider_type = config.provider_type.as_str(),
            "Creating model client"
        );
        if config.is_gemini() {
            Arc::new(GeminiClient::from_config(config))
        } else {
            Arc::new(OpenAIClient::from_config(config))
        }
    }
}
