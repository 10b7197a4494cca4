//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are what let the research agent act: search an encyclopedia,
//! persist a finished report. The registry is assembled once at startup and
//! then shared read-only by every orchestration run.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::ToolError;
use crate::provider::ToolDefinition;

/// The normalized outcome of one tool call.
///
/// Always produced, success or failure, and always paired with the
/// originating call id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result is for
    pub tool_call_id: String,

    /// JSON-serialized return value, or a failure description
    pub content: String,

    /// Whether the call failed
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
}

impl ToolResult {
    pub fn success(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            error: false,
        }
    }

    pub fn failure(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            error: true,
        }
    }
}

/// The core Tool trait.
///
/// Each built-in tool implements this trait and is registered in the
/// [`ToolRegistry`].
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "wikipedia_search").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with decoded arguments, returning its structured
    /// output.
    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Result of resolving a tool name.
pub enum Lookup<'a> {
    Found(&'a dyn Tool),
    NotFound,
}

/// A frozen registry of available tools.
///
/// The agent loop uses this to:
/// 1. Get tool definitions to send to the LLM, in registration order
/// 2. Resolve a requested tool by name
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    /// A registry with no tools.
    pub fn empty() -> Self {
        Self::builder().build()
    }

    /// Resolve a tool by name.
    pub fn resolve(&self, name: &str) -> Lookup<'_> {
        match self.by_name.get(name) {
            Some(&slot) => Lookup::Found(self.tools[slot].as_ref()),
            None => Lookup::NotFound,
        }
    }

    /// All tool definitions, in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.to_definition()).collect()
    }

    /// All registered tool names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Collects tools before the registry is frozen.
#[derive(Default)]
pub struct ToolRegistryBuilder {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistryBuilder {
    /// Register a tool. A later tool with the same name replaces the earlier
    /// one but keeps its position.
    pub fn register(mut self, tool: Box<dyn Tool>) -> Self {
        match self.tools.iter().position(|t| t.name() == tool.name()) {
            Some(slot) => self.tools[slot] = tool,
            None => self.tools.push(tool),
        }
        self
    }

    /// Freeze the registry and build the name lookup table.
    pub fn build(self) -> ToolRegistry {
        let by_name = self
            .tools
            .iter()
            .enumerate()
            .map(|(slot, tool)| (tool.name().to_string(), slot))
            .collect();
        ToolRegistry {
            tools: self.tools,
            by_name,
        }
    }
}
