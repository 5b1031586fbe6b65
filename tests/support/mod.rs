// Test doubles shared by the integration tests: a scripted model client and
// a stub MCP tool server.
#![allow(dead_code)]

use async_trait::async_trait;
use futures::stream;
use lastmile_agent::model::{
    FinishReason, ModelChunk, ModelClient, ModelError, ModelRequest, ModelStream, ToolCallChunk,
};
use lastmile_agent::tooling::{
    ResourceContents, ResourceDescriptor, ToolCallResult, ToolDescriptor, ToolInvokeError,
    ToolServerInterface,
};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;

/// One scripted model turn.
pub enum Turn {
    Chunks(Vec<ModelChunk>),
    Fail(String),
}

/// Text turn split into two chunks, ending with `Stop`.
pub fn text_turn(text: &str) -> Turn {
    let mid = text.len() / 2;
    let mid = (mid..=text.len())
        .find(|i| text.is_char_boundary(*i))
        .unwrap_or(text.len());
    Turn::Chunks(vec![
        ModelChunk::text(&text[..mid]),
        ModelChunk::text(&text[mid..]),
        ModelChunk::finished(FinishReason::Stop),
    ])
}

/// Turn that requests one tool call, with optional leading text.
pub fn tool_turn(text: &str, id: &str, name: &str, args: &str) -> Turn {
    let mut chunks = Vec::new();
    if !text.is_empty() {
        chunks.push(ModelChunk::text(text));
    }
    chunks.push(ModelChunk::tool_call(ToolCallChunk {
        index: 0,
        id: Some(id.to_string()),
        name: Some(name.to_string()),
        arguments: args.to_string(),
    }));
    chunks.push(ModelChunk::finished(FinishReason::ToolCalls));
    Turn::Chunks(chunks)
}

#[derive(Clone)]
pub struct ScriptedModel {
    turns: Arc<Mutex<VecDeque<Turn>>>,
    repeat: Option<Arc<dyn Fn(usize) -> Turn + Send + Sync>>,
    recordings: Arc<Mutex<Vec<ModelRequest>>>,
}

impl ScriptedModel {
    pub fn new(turns: Vec<Turn>) -> Self {
        Self {
            turns: Arc::new(Mutex::new(turns.into())),
            repeat: None,
            recordings: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Produces `make(n)` for the n-th request, forever.
    pub fn repeating(make: impl Fn(usize) -> Turn + Send + Sync + 'static) -> Self {
        Self {
            turns: Arc::new(Mutex::new(VecDeque::new())),
            repeat: Some(Arc::new(make)),
            recordings: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub async fn requests(&self) -> Vec<ModelRequest> {
        self.recordings.lock().await.clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    fn id(&self) -> &str {
        "scripted"
    }

    async fn stream(&self, request: ModelRequest) -> Result<ModelStream, ModelError> {
        let count = {
            let mut recordings = self.recordings.lock().await;
            recordings.push(request);
            recordings.len()
        };

        let turn = match &self.repeat {
            Some(make) => make(count - 1),
            None => self
                .turns
                .lock()
                .await
                .pop_front()
                .unwrap_or_else(|| Turn::Fail("script exhausted".into())),
        };

        match turn {
            Turn::Chunks(chunks) => Ok(Box::pin(stream::iter(chunks.into_iter().map(Ok)))),
            Turn::Fail(reason) => Err(ModelError::invalid_response("scripted", reason)),
        }
    }
}

#[derive(Clone, Default)]
pub struct StubTools {
    tools: Vec<ToolDescriptor>,
    resources: Vec<ResourceDescriptor>,
    contents: HashMap<String, Vec<ResourceContents>>,
    results: HashMap<String, ToolCallResult>,
    fail_transport: bool,
    fail_listing: bool,
    calls: Arc<Mutex<Vec<(String, Value)>>>,
}

impl StubTools {
    pub fn new(tools: Vec<ToolDescriptor>) -> Self {
        Self {
            tools,
            ..Self::default()
        }
    }

    pub fn with_result(mut self, tool: &str, result: ToolCallResult) -> Self {
        self.results.insert(tool.to_string(), result);
        self
    }

    pub fn with_resources(mut self, resources: Vec<ResourceDescriptor>) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_contents(mut self, uri: &str, contents: Vec<ResourceContents>) -> Self {
        self.contents.insert(uri.to_string(), contents);
        self
    }

    pub fn failing_transport(mut self) -> Self {
        self.fail_transport = true;
        self
    }

    pub fn failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.clone()
    }

    pub async fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl ToolServerInterface for StubTools {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolInvokeError> {
        Ok(self.tools.clone())
    }

    async fn list_resources(&self) -> Result<Vec<ResourceDescriptor>, ToolInvokeError> {
        if self.fail_listing {
            return Err(ToolInvokeError::Terminated {
                server: "stub".into(),
            });
        }
        Ok(self.resources.clone())
    }

    async fn read_resource(&self, uri: &str) -> Result<Vec<ResourceContents>, ToolInvokeError> {
        self.contents
            .get(uri)
            .cloned()
            .ok_or_else(|| ToolInvokeError::Rpc {
                server: "stub".into(),
                code: -32002,
                message: format!("Resource not found: {uri}"),
            })
    }

    async fn call_tool(
        &self,
        tool: &str,
        arguments: Value,
    ) -> Result<ToolCallResult, ToolInvokeError> {
        self.calls.lock().await.push((tool.to_string(), arguments));
        if self.fail_transport {
            return Err(ToolInvokeError::Transport {
                server: "stub".into(),
                message: "broken pipe".into(),
            });
        }
        Ok(self
            .results
            .get(tool)
            .cloned()
            .unwrap_or_else(|| ToolCallResult::text(format!("{tool} ok"))))
    }
}
