pub mod agent;
pub mod app;
pub mod defaults;
pub mod error;
pub mod loader;
pub mod provider;
pub mod server;

pub use crate::constants::CONFIG_PATH;

pub use agent::{AgentConfig, OutputFormat};
pub use app::AppConfig;
pub use error::ConfigError;
pub use provider::{ModelInfo, ModelProviderConfig};
pub use server::ServerConfig;
