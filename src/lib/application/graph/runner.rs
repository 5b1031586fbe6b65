use super::checkpoint::MemoryCheckpointer;
use super::error::GraphError;
use super::{GraphEvent, GraphNode, GraphState, route_after_assistant};
use crate::application::tooling::{ToolDescriptor, ToolServerInterface};
use crate::config::defaults::{DEFAULT_MAX_CYCLES, DEFAULT_TEMPERATURE};
use crate::domain::types::{ChatMessage, ToolCall};
use crate::infrastructure::model::{ChunkAccumulator, ModelClient, ModelRequest};
use futures::StreamExt;
use futures::stream::BoxStream;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

pub type GraphEventStream = BoxStream<'static, Result<GraphEvent, GraphError>>;

type EventSender = mpsc::Sender<Result<GraphEvent, GraphError>>;

#[derive(Debug, Clone)]
pub struct GraphOptions {
    pub model: String,
    pub temperature: f32,
    pub system_prompt: String,
    /// Tools offered to the model; fixed for the life of the graph.
    pub tools: Vec<ToolDescriptor>,
    pub max_cycles: usize,
    pub reject_duplicate_tool_calls: bool,
}

impl GraphOptions {
    pub fn new(model: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
            system_prompt: system_prompt.into(),
            tools: Vec::new(),
            max_cycles: DEFAULT_MAX_CYCLES,
            reject_duplicate_tool_calls: true,
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDescriptor>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_cycles(mut self, max_cycles: usize) -> Self {
        self.max_cycles = max_cycles;
        self
    }

    pub fn with_duplicate_rejection(mut self, enabled: bool) -> Self {
        self.reject_duplicate_tool_calls = enabled;
        self
    }
}

/// Compiled assistant/tools graph. Cheap to clone.
#[derive(Clone)]
pub struct AgentGraph {
    inner: Arc<GraphInner>,
}

struct GraphInner {
    model: Arc<dyn ModelClient>,
    tools: Arc<dyn ToolServerInterface>,
    options: GraphOptions,
    checkpointer: MemoryCheckpointer,
}

impl AgentGraph {
    pub fn new(
        model: Arc<dyn ModelClient>,
        tools: Arc<dyn ToolServerInterface>,
        options: GraphOptions,
    ) -> Self {
        Self {
            inner: Arc::new(GraphInner {
                model,
                tools,
                options,
                checkpointer: MemoryCheckpointer::new(),
            }),
        }
    }

    pub fn options(&self) -> &GraphOptions {
        &self.inner.options
    }

    pub fn checkpointer(&self) -> &MemoryCheckpointer {
        &self.inner.checkpointer
    }

    /// Run the graph on a spawned task, yielding events as they happen.
    ///
    /// The stream ends after the run terminates; a failed run yields its
    /// error as the last item. Dropping the stream stops the run at its next
    /// event or before its next tool call.
    pub fn stream(&self, thread_id: &str, input: Vec<ChatMessage>) -> GraphEventStream {
        let (tx, rx) = mpsc::channel(128);
        let inner = self.inner.clone();
        let thread_id = thread_id.to_string();

        tokio::spawn(async move {
            let run_tx = tx.clone();
            let run = tokio::spawn(async move { inner.run(&thread_id, input, Some(&run_tx)).await });
            let outcome = match run.await {
                Ok(result) => result.map(|_| ()),
                Err(join) => Err(GraphError::Aborted(join.to_string())),
            };
            if let Err(err) = outcome {
                let _ = tx.send(Err(err)).await;
            }
        });

        Box::pin(ReceiverStream::new(rx))
    }

    /// Run the graph to completion and return the final thread state.
    pub async fn invoke(
        &self,
        thread_id: &str,
        input: Vec<ChatMessage>,
    ) -> Result<GraphState, GraphError> {
        self.inner.run(thread_id, input, None).await
    }

    pub async fn state(&self, thread_id: &str) -> GraphState {
        self.inner
            .checkpointer
            .load(thread_id)
            .await
            .unwrap_or_default()
    }
}

impl GraphInner {
    async fn run(
        &self,
        thread_id: &str,
        input: Vec<ChatMessage>,
        events: Option<&EventSender>,
    ) -> Result<GraphState, GraphError> {
        let mut state = self.checkpointer.load(thread_id).await.unwrap_or_default();
        state.messages.extend(input);
        self.checkpointer.save(thread_id, &state).await;

        info!(thread_id, messages = state.messages.len(), "Graph run started");

        let mut node = GraphNode::Assistant;
        let mut cycles = 0usize;
        let mut executed: Vec<ToolCall> = Vec::new();

        loop {
            let next = match node {
                GraphNode::Assistant => {
                    cycles += 1;
                    if cycles > self.options.max_cycles {
                        warn!(
                            thread_id,
                            limit = self.options.max_cycles,
                            "Assistant turn limit reached"
                        );
                        return Err(GraphError::CycleLimitExceeded {
                            limit: self.options.max_cycles,
                        });
                    }
                    let message = self.assistant(&state, events).await?;
                    state.messages.push(message);
                    self.checkpointer.save(thread_id, &state).await;
                    route_after_assistant(&state)
                }
                GraphNode::Tools => {
                    self.execute_tools(&mut state, &mut executed, events).await?;
                    self.checkpointer.save(thread_id, &state).await;
                    GraphNode::Assistant
                }
                GraphNode::Terminal => {
                    info!(thread_id, cycles, "Graph run finished");
                    return Ok(state);
                }
            };

            debug!(thread_id, from = %node, to = %next, "Graph transition");
            emit(events, GraphEvent::Transition { from: node, to: next }).await?;
            node = next;
        }
    }

    async fn assistant(
        &self,
        state: &GraphState,
        events: Option<&EventSender>,
    ) -> Result<ChatMessage, GraphError> {
        let mut messages = Vec::with_capacity(state.messages.len() + 1);
        messages.push(ChatMessage::system(self.options.system_prompt.clone()));
        messages.extend(state.messages.iter().cloned());

        let request = ModelRequest {
            model: self.options.model.clone(),
            messages,
            tools: self.options.tools.clone(),
            temperature: self.options.temperature,
        };

        let mut stream = self.model.stream(request).await?;
        let mut turn = ChunkAccumulator::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            turn.push(&chunk);
            emit(events, GraphEvent::ModelChunk(chunk)).await?;
        }

        let message = turn.into_message();
        debug!(
            provider = self.model.id(),
            tool_calls = message.tool_calls.len(),
            chars = message.content.len(),
            "Assistant turn complete"
        );
        Ok(message)
    }

    async fn execute_tools(
        &self,
        state: &mut GraphState,
        executed: &mut Vec<ToolCall>,
        events: Option<&EventSender>,
    ) -> Result<(), GraphError> {
        let calls = state
            .messages
            .last()
            .map(|message| message.tool_calls.clone())
            .unwrap_or_default();

        for call in calls {
            ensure_observed(events)?;
            let content = self.execute_call(&call, executed).await?;
            let message = ChatMessage::tool_result(&call, content);
            state.messages.push(message.clone());
            emit(events, GraphEvent::ToolResult(message)).await?;
        }
        Ok(())
    }

    /// Text of the tool message answering `call`. Only transport-level
    /// failures are returned as errors.
    async fn execute_call(
        &self,
        call: &ToolCall,
        executed: &mut Vec<ToolCall>,
    ) -> Result<String, GraphError> {
        if self.options.reject_duplicate_tool_calls
            && executed.iter().any(|previous| previous.same_request(call))
        {
            warn!(tool = call.name.as_str(), "Rejected duplicate tool call");
            return Ok(format!(
                "Error: {} was already called with these arguments during this case. Use the earlier result instead of calling it again.",
                call.name
            ));
        }

        if !self.options.tools.iter().any(|tool| tool.name == call.name) {
            warn!(tool = call.name.as_str(), "Model requested an unknown tool");
            let names = self
                .options
                .tools
                .iter()
                .map(|tool| tool.name.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            return Ok(format!(
                "Error: {} is not a valid tool, try one of [{names}].",
                call.name
            ));
        }

        executed.push(call.clone());
        info!(tool = call.name.as_str(), call_id = call.id.as_str(), "Invoking tool");
        match self.tools.call_tool(&call.name, call.arguments.clone()).await {
            Ok(result) => {
                if result.is_error {
                    warn!(tool = call.name.as_str(), "Tool reported an error");
                }
                Ok(result.render())
            }
            Err(err) if err.is_server_rejection() => {
                warn!(tool = call.name.as_str(), %err, "Tool call rejected by server");
                Ok(format!("Error: {err}"))
            }
            Err(err) => Err(GraphError::Tool(err)),
        }
    }
}

/// Forward an event to the stream. A dropped receiver stops the run.
async fn emit(events: Option<&EventSender>, event: GraphEvent) -> Result<(), GraphError> {
    let Some(tx) = events else {
        return Ok(());
    };
    tx.send(Ok(event)).await.map_err(|_| {
        debug!("Graph event receiver dropped");
        receiver_dropped()
    })
}

/// No tool runs once the stream has been dropped.
fn ensure_observed(events: Option<&EventSender>) -> Result<(), GraphError> {
    match events {
        Some(tx) if tx.is_closed() => {
            warn!("Graph event receiver dropped before tool execution");
            Err(receiver_dropped())
        }
        _ => Ok(()),
    }
}

fn receiver_dropped() -> GraphError {
    GraphError::Aborted("event stream closed by the consumer".to_string())
}
