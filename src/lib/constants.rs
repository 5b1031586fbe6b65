//! Application constants
//!
//! Single source of truth for paths and protocol values.

/// Default configuration file path
pub const CONFIG_PATH: &str = "config/client.toml";

/// Default environment file path
pub const ENV_PATH: &str = "config/.env";

/// Default Gemini API path (fallback when not specified in config)
pub const DEFAULT_GEMINI_API_PATH: &str = "v1beta/models";

/// MCP protocol revision announced during `initialize`
pub const MCP_PROTOCOL_VERSION: &str = "2025-06-18";
