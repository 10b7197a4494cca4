//! Events pushed from the research loop to its consumer.
//!
//! Each event has a compact wire form that the gateway forwards verbatim as
//! one SSE `data:` frame:
//! - `TextChunk`         → `{"v": <text>}`
//! - `ToolCallAnnounced` → `{"tc": <tool call>}`
//! - `ToolResult`        → `{"tr": {"tool_call_id", "content", "error"?: true}}`
//! - `Error`             → `{"type": "error", "content": <text>}`
//! - `FinalResponse`     → `{"type": "full_response", "full_response": [<message>...]}`

use delve_core::message::{Message, ToolCallRecord};
use delve_core::tool::ToolResult;
use serde::{Serialize, Serializer};
use serde_json::{Value, json};

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Partial assistant text, forwarded as soon as it arrives.
    TextChunk(String),

    /// A fully reassembled tool call, announced after its stream ends.
    ToolCallAnnounced(ToolCallRecord),

    /// The outcome of executing one announced call.
    ToolResult(ToolResult),

    /// A recoverable problem, or the fatal failure that ended the run.
    Error(String),

    /// Every message appended during the run. Always the last event of a
    /// successful run.
    FinalResponse(Vec<Message>),
}

impl StreamEvent {
    /// Short event name, used for logging.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TextChunk(_) => "chunk",
            Self::ToolCallAnnounced(_) => "tool_call",
            Self::ToolResult(_) => "tool_result",
            Self::Error(_) => "error",
            Self::FinalResponse(_) => "full_response",
        }
    }

    /// The JSON payload sent to clients.
    pub fn to_wire(&self) -> Value {
        match self {
            Self::TextChunk(text) => json!({ "v": text }),
            Self::ToolCallAnnounced(record) => json!({ "tc": record }),
            Self::ToolResult(result) => json!({ "tr": result }),
            Self::Error(message) => json!({ "type": "error", "content": message }),
            Self::FinalResponse(messages) => {
                json!({ "type": "full_response", "full_response": messages })
            }
        }
    }
}

impl Serialize for StreamEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_wire().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_chunk_wire() {
        let json = serde_json::to_string(&StreamEvent::TextChunk("Hello".into())).unwrap();
        assert_eq!(json, r#"{"v":"Hello"}"#);
    }

    #[test]
    fn tool_call_wire_uses_function_shape() {
        let event = StreamEvent::ToolCallAnnounced(ToolCallRecord::new(
            "call_1",
            "wikipedia_search",
            r#"{"query":"Eiffel"}"#,
        ));
        assert_eq!(
            event.to_wire(),
            json!({"tc": {
                "id": "call_1",
                "type": "function",
                "function": {"name": "wikipedia_search", "arguments": "{\"query\":\"Eiffel\"}"}
            }})
        );
    }

    #[test]
    fn tool_result_error_flag_only_when_set() {
        let ok = StreamEvent::ToolResult(ToolResult::success("c1", "{}"));
        assert_eq!(ok.to_wire(), json!({"tr": {"tool_call_id": "c1", "content": "{}"}}));

        let failed = StreamEvent::ToolResult(ToolResult::failure("c2", "Unknown tool: x"));
        assert_eq!(failed.to_wire()["tr"]["error"], true);
    }

    #[test]
    fn error_and_full_response_wire() {
        assert_eq!(
            StreamEvent::Error("boom".into()).to_wire(),
            json!({"type": "error", "content": "boom"})
        );
        let done = StreamEvent::FinalResponse(vec![Message::assistant("Paris.")]);
        assert_eq!(
            done.to_wire(),
            json!({"type": "full_response", "full_response": [{"role": "assistant", "content": "Paris."}]})
        );
    }

    #[test]
    fn event_type_names() {
        assert_eq!(StreamEvent::TextChunk("x".into()).event_type(), "chunk");
        assert_eq!(
            StreamEvent::ToolCallAnnounced(ToolCallRecord::default()).event_type(),
            "tool_call"
        );
        assert_eq!(
            StreamEvent::ToolResult(ToolResult::success("a", "b")).event_type(),
            "tool_result"
        );
        assert_eq!(StreamEvent::Error("x".into()).event_type(), "error");
        assert_eq!(StreamEvent::FinalResponse(vec![]).event_type(), "full_response");
    }
}
