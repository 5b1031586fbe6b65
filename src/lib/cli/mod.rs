use clap::Parser;

#[derive(Parser, Debug, Default)]
#[command(
    name = "synapse",
    version,
    about = "Last-mile delivery disruption agent backed by an MCP tool server"
)]
pub struct Cli {
    /// Path to the client configuration file
    #[arg(long)]
    pub config: Option<String>,
    /// MCP server to connect to (overrides the `server` key in the config)
    #[arg(long)]
    pub server: Option<String>,
}
