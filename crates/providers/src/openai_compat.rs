//! OpenAI-compatible streaming provider.
//!
//! Works with Gemini's OpenAI-compatible endpoint, OpenAI, OpenRouter, vLLM,
//! Ollama and anything else that speaks `/chat/completions` with SSE.
//!
//! The provider only decodes the wire format. Tool call deltas are forwarded
//! exactly as received; reassembling them is the agent's job.

use async_trait::async_trait;
use futures::StreamExt;
use delve_core::error::ProviderError;
use delve_core::provider::*;
use serde::Deserialize;
use tracing::{debug, info, trace, warn};

/// An OpenAI-compatible streaming LLM provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        // No overall timeout: a research turn can stream for minutes.
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Gemini through its OpenAI-compatible endpoint (convenience constructor).
    pub fn gemini(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::new(
            "gemini",
            "https://generativelanguage.googleapis.com/v1beta/openai",
            api_key,
        )
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// Build from application config. A missing API key is a configuration
    /// error surfaced at startup, not on the first request.
    pub fn from_config(config: &delve_config::AppConfig) -> Result<Self, ProviderError> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            ProviderError::NotConfigured(
                "no API key (set DELVE_API_KEY, GEMINI_API_KEY or OPENAI_API_KEY)".into(),
            )
        })?;
        let name = if config.api_url.contains("generativelanguage.googleapis.com") {
            "gemini"
        } else {
            "openai-compat"
        };
        Self::new(name, &config.api_url, api_key)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The JSON request body for a streaming completion.
    fn request_body(request: &ProviderRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": request.messages,
            "temperature": request.temperature,
            "stream": true,
            "stream_options": { "include_usage": true },
        });

        if !request.tools.is_empty() {
            let tools: Vec<serde_json::Value> = request
                .tools
                .iter()
                .map(ToolDefinition::to_function_schema)
                .collect();
            body["tools"] = serde_json::json!(tools);
            body["tool_choice"] = serde_json::json!("auto");
        }

        body
    }
}

#[async_trait]
impl delve_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkStream, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(&request);

        debug!(
            provider = %self.name,
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending streaming request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(5);
            return Err(ProviderError::RateLimited { retry_after_secs });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider streaming error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let provider_name = self.name.clone();

        // Read the SSE byte stream and forward decoded chunks.
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut lines = LineBuffer::default();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                lines.extend(&bytes);

                while let Some(line) = lines.next_line() {
                    match parse_sse_line(&line) {
                        SseLine::Skip => {}
                        SseLine::Unparseable(e) => {
                            trace!(
                                provider = %provider_name,
                                line = %line,
                                error = %e,
                                "Ignoring unparseable SSE chunk"
                            );
                        }
                        SseLine::Done => return,
                        SseLine::Chunk(chunk) => {
                            let last = chunk.usage.is_some();
                            if let Some(usage) = &chunk.usage {
                                info!(
                                    provider = %provider_name,
                                    prompt_tokens = usage.prompt_tokens,
                                    completion_tokens = usage.completion_tokens,
                                    total_tokens = usage.total_tokens,
                                    "Stream usage"
                                );
                            }
                            if tx.send(Ok(chunk)).await.is_err() {
                                return; // receiver dropped
                            }
                            if last {
                                return;
                            }
                        }
                    }
                }
            }

            // Body ended without [DONE]; a trailing unterminated line may
            // still hold a chunk.
            if let Some(line) = lines.finish() {
                if let SseLine::Chunk(chunk) = parse_sse_line(&line) {
                    let _ = tx.send(Ok(chunk)).await;
                }
            }
        });

        Ok(rx)
    }
}

/// Splits an incoming byte stream into lines.
///
/// Bytes are buffered rather than decoded per network chunk so multi-byte
/// characters split across chunks survive intact.
#[derive(Default)]
struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    fn next_line(&mut self) -> Option<String> {
        let end = self.buf.iter().position(|&b| b == b'\n')?;
        let raw: Vec<u8> = self.buf.drain(..=end).collect();
        let line = String::from_utf8_lossy(&raw[..end]);
        Some(line.trim_end_matches('\r').to_string())
    }

    fn finish(self) -> Option<String> {
        let rest = String::from_utf8_lossy(&self.buf).trim().to_string();
        (!rest.is_empty()).then_some(rest)
    }
}

/// What one SSE line means to the stream.
#[derive(Debug)]
enum SseLine {
    /// Blank line, comment, or a non-data field.
    Skip,
    /// `data: [DONE]`
    Done,
    Chunk(StreamChunk),
    Unparseable(String),
}

fn parse_sse_line(line: &str) -> SseLine {
    if line.is_empty() || line.starts_with(':') {
        return SseLine::Skip;
    }
    let Some(data) = line.strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let data = data.trim();
    if data == "[DONE]" {
        return SseLine::Done;
    }

    let parsed: StreamResponse = match serde_json::from_str(data) {
        Ok(p) => p,
        Err(e) => return SseLine::Unparseable(e.to_string()),
    };

    let mut chunk = StreamChunk::default();
    if let Some(choice) = parsed.choices.into_iter().next() {
        chunk.content = choice.delta.content.filter(|c| !c.is_empty());
        chunk.finish_reason = choice.finish_reason;
        chunk.tool_calls = choice
            .delta
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| {
                let (name, arguments) = match tc.function {
                    Some(f) => (f.name, f.arguments),
                    None => (None, None),
                };
                ToolCallDelta {
                    index: tc.index,
                    id: tc.id,
                    name,
                    arguments,
                }
            })
            .collect();
    }
    chunk.usage = parsed.usage.map(|u| Usage {
        prompt_tokens: u.prompt_tokens,
        completion_tokens: u.completion_tokens,
        total_tokens: u.total_tokens,
    });

    let empty = chunk.content.is_none()
        && chunk.tool_calls.is_empty()
        && chunk.finish_reason.is_none()
        && chunk.usage.is_none();
    if empty {
        SseLine::Skip
    } else {
        SseLine::Chunk(chunk)
    }
}

// --- Streaming SSE types (internal) ---

/// A single SSE `data: {...}` payload.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<StreamToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct StreamToolCallDelta {
    #[serde(default)]
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<StreamFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use delve_core::{Message, Provider, ToolCallRecord};

    fn chunk(line: &str) -> StreamChunk {
        match parse_sse_line(line) {
            SseLine::Chunk(c) => c,
            other => panic!("expected chunk, got {other:?}"),
        }
    }

    #[test]
    fn gemini_constructor() {
        let provider = OpenAiCompatProvider::gemini("key").unwrap();
        assert_eq!(provider.name(), "gemini");
        assert!(provider.base_url().contains("generativelanguage"));
    }

    #[test]
    fn trailing_slash_trimmed() {
        let provider = OpenAiCompatProvider::new("local", "http://localhost:8080/v1/", "k").unwrap();
        assert_eq!(provider.base_url(), "http://localhost:8080/v1");
    }

    #[test]
    fn from_config_requires_key() {
        let config = delve_config::AppConfig::default();
        let err = OpenAiCompatProvider::from_config(&config).err().unwrap();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }

    #[test]
    fn request_body_shape() {
        let request = ProviderRequest {
            model: "gemini-2.5-pro".into(),
            messages: vec![
                Message::system("sys"),
                Message::assistant_with_calls(
                    "",
                    vec![ToolCallRecord::new("c1", "wikipedia_search", "{}")],
                ),
                Message::tool_result("c1", "{\"success\":true}"),
            ],
            temperature: 0.6,
            tools: vec![ToolDefinition {
                name: "wikipedia_search".into(),
                description: "Search".into(),
                parameters: serde_json::json!({"type": "object"}),
            }],
        };
        let body = OpenAiCompatProvider::request_body(&request);
        assert_eq!(body["stream"], true);
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["messages"][1]["tool_calls"][0]["function"]["name"], "wikipedia_search");
        assert_eq!(body["messages"][2]["tool_call_id"], "c1");
    }

    #[test]
    fn request_body_without_tools_has_no_tool_choice() {
        let request = ProviderRequest {
            model: "m".into(),
            messages: vec![Message::user("hi")],
            temperature: 0.6,
            tools: vec![],
        };
        let body = OpenAiCompatProvider::request_body(&request);
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
    }

    // --- SSE parsing tests ---

    #[test]
    fn parse_content_delta() {
        let c = chunk(r#"data: {"choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#);
        assert_eq!(c.content.as_deref(), Some("Hello"));
        assert!(c.tool_calls.is_empty());
    }

    #[test]
    fn parse_without_space_after_colon() {
        let c = chunk(r#"data:{"choices":[{"delta":{"content":"x"}}]}"#);
        assert_eq!(c.content.as_deref(), Some("x"));
    }

    #[test]
    fn parse_finish_chunk() {
        let c = chunk(r#"data: {"choices":[{"delta":{},"finish_reason":"tool_calls"}]}"#);
        assert_eq!(c.finish_reason.as_deref(), Some("tool_calls"));
        assert!(c.content.is_none());
    }

    #[test]
    fn tool_call_deltas_forwarded_raw() {
        let first = chunk(
            r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_abc","function":{"name":"wikipedia_search","arguments":""}}]}}]}"#,
        );
        assert_eq!(
            first.tool_calls,
            vec![ToolCallDelta::new(0)
                .with_id("call_abc")
                .with_name("wikipedia_search")
                .with_arguments("")]
        );

        let second = chunk(
            r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"query\""}}]}}]}"#,
        );
        assert_eq!(second.tool_calls[0].id, None);
        assert_eq!(second.tool_calls[0].arguments.as_deref(), Some("{\"query\""));
    }

    #[test]
    fn parallel_tool_calls_keep_indices() {
        let c = chunk(
            r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"id":"a","function":{"name":"s"}},{"index":1,"id":"b","function":{"name":"t"}}]}}]}"#,
        );
        assert_eq!(c.tool_calls.len(), 2);
        assert_eq!(c.tool_calls[1].index, 1);
        assert_eq!(c.tool_calls[1].id.as_deref(), Some("b"));
    }

    #[test]
    fn parse_usage_chunk() {
        let c = chunk(
            r#"data: {"choices":[],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#,
        );
        let usage = c.usage.unwrap();
        assert_eq!(usage.prompt_tokens, 10);
        assert_eq!(usage.total_tokens, 15);
    }

    #[test]
    fn done_and_skips() {
        assert!(matches!(parse_sse_line("data: [DONE]"), SseLine::Done));
        assert!(matches!(parse_sse_line(""), SseLine::Skip));
        assert!(matches!(parse_sse_line(": keep-alive"), SseLine::Skip));
        assert!(matches!(parse_sse_line("event: message"), SseLine::Skip));
        assert!(matches!(
            parse_sse_line(r#"data: {"choices":[{"delta":{}}]}"#),
            SseLine::Skip
        ));
        assert!(matches!(parse_sse_line("data: {not json"), SseLine::Unparseable(_)));
    }

    #[test]
    fn line_buffer_handles_split_lines_and_crlf() {
        let mut lines = LineBuffer::default();
        lines.extend(b"data: {\"a\"");
        assert!(lines.next_line().is_none());
        lines.extend(b":1}\r\ndata: [DONE]\n");
        assert_eq!(lines.next_line().as_deref(), Some("data: {\"a\":1}"));
        assert_eq!(lines.next_line().as_deref(), Some("data: [DONE]"));
        assert!(lines.next_line().is_none());
        assert!(lines.finish().is_none());
    }

    #[test]
    fn line_buffer_keeps_split_multibyte_chars() {
        let text = "data: é\n".as_bytes();
        let mut lines = LineBuffer::default();
        lines.extend(&text[..7]);
        lines.extend(&text[7..]);
        assert_eq!(lines.next_line().as_deref(), Some("data: é"));
    }

    #[test]
    fn line_buffer_returns_unterminated_tail() {
        let mut lines = LineBuffer::default();
        lines.extend(b"data: {\"choices\":[]}");
        assert!(lines.next_line().is_none());
        assert_eq!(lines.finish().as_deref(), Some("data: {\"choices\":[]}"));
    }
}
