//! Tool execution with normalized results.
//!
//! Every call produces a [`ToolResult`] paired with its call id. Malformed
//! arguments, unknown tool names and tool failures never escape as errors.

use delve_core::message::ToolCallRecord;
use delve_core::tool::{Lookup, ToolRegistry, ToolResult};
use serde_json::Value;
use tracing::{debug, warn};

/// The outcome of executing one call.
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub result: ToolResult,
    /// Set when the argument payload was not valid JSON and an empty
    /// argument object was used instead.
    pub decode_error: Option<String>,
}

/// Runs tool calls against a frozen registry.
pub struct ToolExecutor<'a> {
    registry: &'a ToolRegistry,
}

impl<'a> ToolExecutor<'a> {
    pub fn new(registry: &'a ToolRegistry) -> Self {
        Self { registry }
    }

    pub async fn execute(&self, call: &ToolCallRecord) -> Execution {
        let (arguments, decode_error) = match decode_arguments(&call.arguments) {
            Ok(args) => (args, None),
            Err(message) => {
                warn!(tool = %call.name, "Malformed tool arguments, using empty object");
                (empty_arguments(), Some(message))
            }
        };

        let tool = match self.registry.resolve(&call.name) {
            Lookup::Found(tool) => tool,
            Lookup::NotFound => {
                warn!(tool = %call.name, "Model requested an unknown tool");
                return Execution {
                    result: ToolResult::failure(&call.id, format!("Unknown tool: {}", call.name)),
                    decode_error,
                };
            }
        };

        debug!(tool = %call.name, call_id = %call.id, "Executing tool");
        let result = match tool.execute(arguments).await {
            Ok(value) => match serde_json::to_string(&value) {
                Ok(content) => ToolResult::success(&call.id, content),
                Err(e) => failure(call, &e),
            },
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool execution failed");
                failure(call, &e)
            }
        };

        Execution {
            result,
            decode_error,
        }
    }
}

fn failure(call: &ToolCallRecord, cause: &dyn std::fmt::Display) -> ToolResult {
    ToolResult::failure(
        &call.id,
        format!("Error executing tool '{}': {cause}", call.name),
    )
}

fn empty_arguments() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Decode a raw argument payload. A blank payload means "no arguments".
///
/// The error string is the message surfaced to the client.
pub fn decode_arguments(raw: &str) -> Result<Value, String> {
    if raw.trim().is_empty() {
        return Ok(empty_arguments());
    }
    serde_json::from_str(raw)
        .map_err(|_| format!("[Error parsing tool arguments]: Invalid JSON: {raw}"))
}
