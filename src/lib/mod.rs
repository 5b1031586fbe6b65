pub mod application;
pub mod cli;
pub mod config;
pub mod constants;
pub mod domain;
pub mod infrastructure;

pub use application::{console, formatter, graph, prompt, tooling};
pub use cli::Cli;
pub use config::{AppConfig, ModelProviderConfig};
pub use domain::types;
pub use infrastructure::model;

use application::console::Console;
use application::graph::{AgentGraph, GraphOptions};
use application::prompt::compose_system_prompt;
use application::tooling::{McpProcess, ToolServerInterface};
use infrastructure::model::ProviderFactory;
use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// Log filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "warn,reqwest=warn,hyper=warn,hyper_util=warn,h2=warn";

pub async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    init_tracing();
    info!("Starting synapse");
    debug!(config = ?cli.config, server = ?cli.server, "CLI arguments parsed");

    let config_path = cli.config.as_deref().map(Path::new);
    let config = AppConfig::load(config_path)?;
    if let Some(path) = config_path {
        info!(path = %path.display(), "Loaded configuration from file");
    } else {
        info!("Loaded configuration from default path");
    }

    let server = config.server_config(cli.server.as_deref())?.clone();
    let provider = config.active_provider()?;
    info!(
        server = server.name.as_str(),
        command = %server.describe(),
        env = server.env.len(),
        "MCP server configuration"
    );
    let model = ProviderFactory::create(provider);
    info!(
        provider = provider.id.as_str(),
        model = config.model.as_str(),
        "Model client ready"
    );

    let process = McpProcess::connect(server).await?;
    let outcome = run_session(&config, model, &process).await;
    process.shutdown().await;
    outcome?;

    info!("Session finished");
    Ok(())
}

async fn run_session(
    config: &AppConfig,
    model: Arc<dyn infrastructure::model::ModelClient>,
    process: &McpProcess,
) -> Result<(), Box<dyn Error>> {
    if let Some(text) = process.instructions().await {
        debug!(
            server = process.server_name(),
            chars = text.len(),
            "Server sent initialize instructions"
        );
    }

    let tools = process.list_tools().await?;
    info!(server = process.server_name(), tools = tools.len(), "Loaded tools");

    let resources = match process.list_resources().await {
        Ok(resources) => resources,
        Err(err) => {
            warn!(%err, "Failed to list resources");
            Vec::new()
        }
    };
    info!(resources = resources.len(), "Found resources");

    let system_prompt = compose_system_prompt(&config.agent, &tools);
    let options = GraphOptions::new(config.model.clone(), system_prompt)
        .with_tools(tools)
        .with_temperature(config.temperature)
        .with_max_cycles(config.agent.max_cycles)
        .with_duplicate_rejection(config.agent.reject_duplicate_tool_calls);

    let tool_server: Arc<dyn ToolServerInterface> = Arc::new(process.clone());
    let graph = AgentGraph::new(model, tool_server.clone(), options);

    let mut console = Console::new(
        graph,
        tool_server,
        config.agent.thread_id.clone(),
        config.agent.output_format,
        tokio::io::stdout(),
    );
    console.print_startup(&resources).await?;
    console.run(BufReader::new(tokio::io::stdin())).await?;
    Ok(())
}

/// Install the stderr `fmt` subscriber once per process.
pub fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_level(true)
            .init();
    });
}
