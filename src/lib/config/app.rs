use super::agent::AgentConfig;
use super::error::ConfigError;
use super::provider::ModelProviderConfig;
use super::server::ServerConfig;
use std::path::Path;

/// Application configuration loaded from client.toml
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub default_provider: String,
    pub model: String,
    pub temperature: f32,
    /// Name of the entry in `servers` the console connects to.
    pub server: String,
    pub servers: Vec<ServerConfig>,
    pub providers: Vec<ModelProviderConfig>,
    pub agent: AgentConfig,
}

impl AppConfig {
    /// Load configuration from a file path (or default path if None)
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        super::loader::load_config(path)
    }

    /// The provider selected by `default_provider`.
    pub fn active_provider(&self) -> Result<&ModelProviderConfig, ConfigError> {
        self.providers
            .iter()
            .find(|provider| provider.id == self.default_provider)
            .ok_or_else(|| ConfigError::ProviderNotFound {
                provider: self.default_provider.clone(),
            })
    }

    /// Look up an MCP server by name, falling back to the configured one.
    pub fn server_config(&self, name: Option<&str>) -> Result<&ServerConfig, ConfigError> {
        let wanted = name.unwrap_or(&self.server);
        self.servers
            .iter()
            .find(|server| server.name == wanted)
            .ok_or_else(|| ConfigError::ServerNotFound {
                server: wanted.to_string(),
            })
    }
}
