//! Message and Message Log domain types.
//!
//! These are the value objects that flow through the whole system:
//! the caller sends a history → the loop extends it → the provider reads it →
//! the caller receives the appended turns back.

use serde::{Deserialize, Serialize};

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions
    System,
    /// The end user
    User,
    /// The model
    Assistant,
    /// Tool execution result
    Tool,
}

/// A single conversation turn.
///
/// Serializes to `{role, content?, tool_calls?, tool_call_id?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who sent this message
    pub role: Role,

    /// The text content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Tool calls requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRecord>>,

    /// If this is a tool result, which tool call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create an assistant message carrying tool calls.
    ///
    /// An empty call list is stored as `None` so plain answers serialize
    /// without a `tool_calls` key.
    pub fn assistant_with_calls(content: impl Into<String>, calls: Vec<ToolCallRecord>) -> Self {
        let mut msg = Self::assistant(content);
        if !calls.is_empty() {
            msg.tool_calls = Some(calls);
        }
        msg
    }

    /// Create a tool result message.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut msg = Self::new(Role::Tool, content);
        msg.tool_call_id = Some(tool_call_id.into());
        msg
    }

    /// The tool calls on this message, empty when there are none.
    pub fn calls(&self) -> &[ToolCallRecord] {
        self.tool_calls.as_deref().unwrap_or_default()
    }

    /// The text content, empty when absent.
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}

/// A tool call embedded in an assistant message.
///
/// On the wire this takes the function-calling shape
/// `{"id", "type": "function", "function": {"name", "arguments"}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "WireToolCall", from = "WireToolCall")]
pub struct ToolCallRecord {
    /// Unique ID for this tool call
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as an (ideally JSON) string
    pub arguments: String,
}

impl ToolCallRecord {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// A slot that no delta has written to yet.
    pub fn is_placeholder(&self) -> bool {
        self.id.is_empty() && self.name.is_empty() && self.arguments.is_empty()
    }
}

#[derive(Serialize, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: WireFunction,
}

#[derive(Serialize, Deserialize)]
struct WireFunction {
    #[serde(default)]
    name: String,
    #[serde(default)]
    arguments: String,
}

fn function_kind() -> String {
    "function".into()
}

impl From<ToolCallRecord> for WireToolCall {
    fn from(record: ToolCallRecord) -> Self {
        Self {
            id: record.id,
            kind: function_kind(),
            function: WireFunction {
                name: record.name,
                arguments: record.arguments,
            },
        }
    }
}

impl From<WireToolCall> for ToolCallRecord {
    fn from(wire: WireToolCall) -> Self {
        Self {
            id: wire.id,
            name: wire.function.name,
            arguments: wire.function.arguments,
        }
    }
}

/// The append-only conversation state carried across loop iterations.
///
/// Entries supplied by the caller form the prefix; everything pushed after
/// construction is "new" and is what a run reports back.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    messages: Vec<Message>,
    base_len: usize,
}

impl MessageLog {
    /// Start a log from a caller-supplied history.
    pub fn from_history(history: Vec<Message>) -> Self {
        let base_len = history.len();
        Self {
            messages: history,
            base_len,
        }
    }

    /// Prepend `prompt` as a system message unless one is already present.
    ///
    /// The prompt is part of the prefix, never of the appended turns.
    pub fn ensure_system_prompt(&mut self, prompt: &str) {
        if self.messages.iter().any(|m| m.role == Role::System) {
            return;
        }
        self.messages.insert(0, Message::system(prompt));
        self.base_len += 1;
    }

    /// Append a message.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// All messages, prefix included.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Messages appended since the log was created.
    pub fn appended(&self) -> &[Message] {
        &self.messages[self.base_len..]
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Hello, agent!");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.text(), "Hello, agent!");
        assert!(msg.calls().is_empty());
    }

    #[test]
    fn tool_message_omits_empty_fields() {
        let json = serde_json::to_value(Message::tool_result("call_1", "{}")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"role": "tool", "content": "{}", "tool_call_id": "call_1"})
        );
    }

    #[test]
    fn assistant_without_calls_has_no_tool_calls_key() {
        let msg = Message::assistant_with_calls("done", vec![]);
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("tool_calls"));
    }

    #[test]
    fn tool_call_uses_function_shape() {
        let record = ToolCallRecord::new("call_9", "wikipedia_search", r#"{"query":"Rust"}"#);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], "call_9");
        assert_eq!(json["type"], "function");
        assert_eq!(json["function"]["name"], "wikipedia_search");
        assert_eq!(json["function"]["arguments"], r#"{"query":"Rust"}"#);
    }

    #[test]
    fn history_from_client_parses() {
        let raw = r#"[
            {"role": "user", "content": "Who built the Eiffel Tower?"},
            {"role": "assistant", "content": "", "tool_calls": [
                {"id": "c1", "type": "function", "function": {"name": "wikipedia_search", "arguments": "{}"}}
            ]},
            {"role": "tool", "tool_call_id": "c1", "content": "{\"results\":[]}"}
        ]"#;
        let history: Vec<Message> = serde_json::from_str(raw).unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[1].calls()[0].name, "wikipedia_search");
        assert_eq!(history[2].tool_call_id.as_deref(), Some("c1"));
    }

    #[test]
    fn placeholder_detection() {
        assert!(ToolCallRecord::default().is_placeholder());
        assert!(!ToolCallRecord::new("a", "", "").is_placeholder());
    }

    #[test]
    fn log_prepends_system_prompt_once() {
        let mut log = MessageLog::from_history(vec![Message::user("hi")]);
        log.ensure_system_prompt("be thorough");
        log.ensure_system_prompt("be thorough");
        assert_eq!(log.len(), 2);
        assert_eq!(log.messages()[0].role, Role::System);
        assert!(log.appended().is_empty());
    }

    #[test]
    fn log_keeps_existing_system_prompt() {
        let mut log = MessageLog::from_history(vec![
            Message::system("custom"),
            Message::user("hi"),
        ]);
        log.ensure_system_prompt("default");
        assert_eq!(log.len(), 2);
        assert_eq!(log.messages()[0].text(), "custom");
    }

    #[test]
    fn log_reports_appended_messages() {
        let mut log = MessageLog::from_history(vec![Message::user("hi")]);
        log.ensure_system_prompt("sys");
        log.push(Message::assistant("hello"));
        assert_eq!(log.appended().len(), 1);
        assert_eq!(log.appended()[0].text(), "hello");
    }
}
