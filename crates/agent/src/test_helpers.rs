//! Scripted providers and small tools shared by the loop tests.

use async_trait::async_trait;
use delve_core::error::{ProviderError, ToolError};
use delve_core::provider::{ChunkStream, Provider, ProviderRequest, StreamChunk, ToolCallDelta};
use delve_core::tool::{Tool, ToolRegistry};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, mpsc};

/// One scripted provider call.
pub enum Turn {
    /// Open a stream that yields these items, then ends.
    Stream(Vec<Result<StreamChunk, ProviderError>>),
    /// Refuse to open a stream.
    Refuse(ProviderError),
}

/// A provider that replays one scripted turn per `stream()` call and records
/// every request it receives.
pub struct ScriptedProvider {
    turns: Mutex<VecDeque<Turn>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(turns: Vec<Turn>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkStream, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let turn = self.turns.lock().unwrap().pop_front();
        match turn {
            Some(Turn::Stream(items)) => {
                let (tx, rx) = mpsc::channel(items.len().max(1));
                for item in items {
                    tx.try_send(item).unwrap();
                }
                Ok(rx)
            }
            Some(Turn::Refuse(err)) => Err(err),
            None => Err(ProviderError::InvalidResponse("script exhausted".into())),
        }
    }
}

/// A turn that streams plain text split into the given pieces.
pub fn text_turn(pieces: &[&str]) -> Turn {
    Turn::Stream(pieces.iter().map(|p| Ok(StreamChunk::text(*p))).collect())
}

/// A turn that streams one complete tool call.
pub fn call_turn(id: &str, name: &str, arguments: &str) -> Turn {
    Turn::Stream(vec![Ok(StreamChunk::tool_calls(vec![
        ToolCallDelta::new(0)
            .with_id(id)
            .with_name(name)
            .with_arguments(arguments),
    ]))])
}

pub fn registry_with(tools: Vec<Box<dyn Tool>>) -> ToolRegistry {
    tools
        .into_iter()
        .fold(ToolRegistry::builder(), |b, t| b.register(t))
        .build()
}

/// Returns its arguments unchanged.
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo the arguments back"
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {"text": {"type": "string"}}})
    }

    async fn execute(&self, arguments: Value) -> Result<Value, ToolError> {
        Ok(arguments)
    }
}

/// Always fails.
pub struct FailingTool;

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        "failing"
    }

    fn description(&self) -> &str {
        "Always fails"
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object"})
    }

    async fn execute(&self, _arguments: Value) -> Result<Value, ToolError> {
        Err(ToolError::ExecutionFailed {
            tool_name: "failing".into(),
            reason: "upstream unavailable".into(),
        })
    }
}

/// Fails unless a string `query` argument is present.
pub struct QueryTool;

#[async_trait]
impl Tool for QueryTool {
    fn name(&self) -> &str {
        "lookup"
    }

    fn description(&self) -> &str {
        "Look something up"
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {"query": {"type": "string"}}, "required": ["query"]})
    }

    async fn execute(&self, arguments: Value) -> Result<Value, ToolError> {
        let query = arguments["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;
        Ok(json!({ "query": query }))
    }
}

/// Waits for `release`, then records its arguments.
pub struct GatedTool {
    pub release: Arc<Notify>,
    pub calls: Arc<Mutex<Vec<Value>>>,
}

impl GatedTool {
    pub fn new() -> Self {
        Self {
            release: Arc::new(Notify::new()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl Tool for GatedTool {
    fn name(&self) -> &str {
        "record"
    }

    fn description(&self) -> &str {
        "Record the arguments once released"
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object"})
    }

    async fn execute(&self, arguments: Value) -> Result<Value, ToolError> {
        self.release.notified().await;
        self.calls.lock().unwrap().push(arguments);
        Ok(json!({ "recorded": true }))
    }
}
