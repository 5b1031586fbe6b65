//! Interactive console: special resource commands plus agent turns.

use crate::application::formatter::ResponseFormatter;
use crate::application::graph::{AgentGraph, GraphError, GraphEvent};
use crate::application::tooling::{
    ResourceDescriptor, ToolServerInterface, render_resource_contents,
};
use crate::config::OutputFormat;
use crate::domain::types::ChatMessage;
use futures::StreamExt;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("console I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// What a line of user input asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Quit,
    ListResources,
    ReadResource(String),
    /// Forwarded to the agent as a user turn.
    Message(String),
    Empty,
}

impl ConsoleCommand {
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return ConsoleCommand::Empty;
        }
        let lowered = trimmed.to_lowercase();
        match lowered.as_str() {
            "quit" | "exit" => ConsoleCommand::Quit,
            "resources" => ConsoleCommand::ListResources,
            _ if lowered.starts_with("read ") => {
                ConsoleCommand::ReadResource(trimmed.get(5..).unwrap_or_default().trim().to_string())
            }
            _ => ConsoleCommand::Message(trimmed.to_string()),
        }
    }
}

enum LoopControl {
    Continue,
    Exit,
}

pub struct Console<W> {
    graph: AgentGraph,
    tools: Arc<dyn ToolServerInterface>,
    thread_id: String,
    output_format: OutputFormat,
    out: W,
}

impl<W> Console<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(
        graph: AgentGraph,
        tools: Arc<dyn ToolServerInterface>,
        thread_id: impl Into<String>,
        output_format: OutputFormat,
        out: W,
    ) -> Self {
        Self {
            graph,
            tools,
            thread_id: thread_id.into(),
            output_format,
            out,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Resource summary and command help shown once after connecting.
    pub async fn print_startup(&mut self, resources: &[ResourceDescriptor]) -> io::Result<()> {
        if !resources.is_empty() {
            write_line(&mut self.out, "\n=== AVAILABLE RESOURCES ===").await?;
            for resource in resources {
                let line = format!(
                    "- {} ({}): {}",
                    resource.uri,
                    resource.mime_type_or_unknown(),
                    resource.name
                );
                write_line(&mut self.out, &line).await?;
            }
        }
        print_help(&mut self.out).await
    }

    /// Read lines until `quit`/`exit` or end of input.
    pub async fn run<R>(&mut self, input: R) -> Result<(), ConsoleError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        loop {
            prompt(&mut self.out).await?;
            let Some(line) = lines.next_line().await? else {
                debug!("Console input closed");
                break;
            };
            match self.handle_line(&line).await? {
                LoopControl::Continue => continue,
                LoopControl::Exit => break,
            }
        }
        self.out.flush().await?;
        Ok(())
    }

    async fn handle_line(&mut self, line: &str) -> Result<LoopControl, ConsoleError> {
        match ConsoleCommand::parse(line) {
            ConsoleCommand::Quit => {
                info!("Console session ended by user");
                Ok(LoopControl::Exit)
            }
            ConsoleCommand::Empty => Ok(LoopControl::Continue),
            ConsoleCommand::Message(text) => {
                self.run_turn(&text).await?;
                Ok(LoopControl::Continue)
            }
            ConsoleCommand::ListResources | ConsoleCommand::ReadResource(_) => {
                self.handle_resource_command(line).await?;
                Ok(LoopControl::Continue)
            }
        }
    }

    /// Handle `resources` and `read <uri>`. Returns `false` when the input
    /// is neither, so the caller forwards it to the agent.
    pub async fn handle_resource_command(&mut self, input: &str) -> io::Result<bool> {
        match ConsoleCommand::parse(input) {
            ConsoleCommand::ListResources => {
                self.list_resources().await?;
                Ok(true)
            }
            ConsoleCommand::ReadResource(uri) => {
                self.read_resource(&uri).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_resources(&mut self) -> io::Result<()> {
        let resources = match self.tools.list_resources().await {
            Ok(resources) => resources,
            Err(err) => {
                warn!(%err, "Failed to list resources");
                write_line(&mut self.out, &format!("[ERROR] Failed to list resources: {err}"))
                    .await?;
                Vec::new()
            }
        };

        if resources.is_empty() {
            return write_line(&mut self.out, "\nNo resources available.").await;
        }

        write_line(&mut self.out, "\n=== AVAILABLE RESOURCES ===").await?;
        for (index, resource) in resources.iter().enumerate() {
            write_line(&mut self.out, &format!("{}. URI: {}", index + 1, resource.uri)).await?;
            write_line(&mut self.out, &format!("   Name: {}", resource.name)).await?;
            write_line(
                &mut self.out,
                &format!("   Type: {}", resource.mime_type_or_unknown()),
            )
            .await?;
            if let Some(description) = resource.description.as_deref().filter(|d| !d.is_empty()) {
                write_line(&mut self.out, &format!("   Description: {description}")).await?;
            }
            write_line(&mut self.out, "").await?;
        }
        Ok(())
    }

    async fn read_resource(&mut self, uri: &str) -> io::Result<()> {
        write_line(&mut self.out, &format!("\n=== READING RESOURCE: {uri} ===")).await?;
        let body = match self.tools.read_resource(uri).await {
            Ok(contents) => render_resource_contents(&contents),
            Err(err) => {
                warn!(uri, %err, "Failed to read resource");
                format!("Error reading resource: {err}")
            }
        };
        write_line(&mut self.out, &body).await
    }

    /// Send one user message through the graph and print formatted blocks
    /// as each model turn completes.
    pub async fn run_turn(&mut self, text: &str) -> Result<(), ConsoleError> {
        write_line(&mut self.out, &format!("\n ----  USER  ---- \n\n {text}")).await?;
        write_line(&mut self.out, "\n ----  LAST MILE AGENT  ---- \n\n").await?;
        self.out.flush().await?;

        let mut formatter = ResponseFormatter::new(self.output_format);
        let mut events = self
            .graph
            .stream(&self.thread_id, vec![ChatMessage::user(text)]);

        while let Some(event) = events.next().await {
            match event {
                Ok(GraphEvent::ModelChunk(chunk)) => {
                    for block in formatter.push(&chunk) {
                        self.out.write_all(block.to_string().as_bytes()).await?;
                        self.out.flush().await?;
                    }
                }
                Ok(GraphEvent::ToolResult(message)) => {
                    debug!(
                        tool = message.name.as_deref().unwrap_or_default(),
                        chars = message.content.len(),
                        "Tool result appended"
                    );
                }
                Ok(GraphEvent::Transition { from, to }) => {
                    debug!(%from, %to, "Graph transition");
                }
                Err(err) if err.is_recoverable() => {
                    warn!(%err, "Graph run stopped early");
                    write_line(&mut self.out, &format!("\n[WARN] {}", err.user_message())).await?;
                }
                Err(err) => return Err(ConsoleError::Graph(err)),
            }
        }
        Ok(())
    }
}

async fn print_help<W: AsyncWrite + Unpin>(out: &mut W) -> io::Result<()> {
    write_line(out, "\nSpecial commands:").await?;
    write_line(out, "- Type 'resources' to list all available MCP resources").await?;
    write_line(out, "- Type 'read <resource_uri>' to read a specific resource").await?;
    write_line(out, "- Type 'quit' or 'exit' to end the session").await?;
    write_line(out, &"-".repeat(60)).await
}

async fn prompt<W: AsyncWrite + Unpin>(out: &mut W) -> io::Result<()> {
    out.write_all(b"\n\nUSER: ").await?;
    out.flush().await
}

async fn write_line<W: AsyncWrite + Unpin>(out: &mut W, line: &str) -> io::Result<()> {
    out.write_all(line.as_bytes()).await?;
    out.write_all(b"\n").await?;
    Ok(())
}
