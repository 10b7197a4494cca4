//! Request handlers.
//!
//! - `GET  /health`         : liveness
//! - `GET  /research`       : latest research summaries
//! - `GET  /research/{id}`  : one research record with its report and logs
//! - `POST /chat`           : run the research loop, streamed as SSE
//! - `POST /transcribe`     : speech to text

use axum::Json;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event as SseEvent, Sse};
use axum::response::{IntoResponse, Response};
use delve_agent::{RunHandle, RunOutcome};
use delve_core::error::TranscriptionError;
use delve_core::message::{Message, Role};
use delve_core::research::ResearchStore;
use delve_core::transcription::TranscriptionRequest;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_stream::{Stream, StreamExt};
use tracing::{error, info, warn};

use crate::SharedContext;

const ACCEPTED_AUDIO_TYPES: [&str; 3] = ["audio/wav", "audio/mpeg", "audio/webm"];

/// An error body in the `{"detail": ...}` shape clients expect.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    fn internal(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, detail)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

// ── Health ────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    service: &'static str,
}

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "delve",
    })
}

// ── Research records ──────────────────────────────────────────────────────

pub async fn list_research_handler(
    State(ctx): State<SharedContext>,
) -> Result<Json<Value>, ApiError> {
    let research = ctx
        .store
        .list_research(ctx.config.store.list_limit, 0)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(Json(json!({ "research": research })))
}

pub async fn get_research_handler(
    State(ctx): State<SharedContext>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    match ctx.store.get_full_research(id).await {
        Ok(Some(research)) => Ok(Json(json!({ "research": research }))),
        Ok(None) => Err(ApiError::new(StatusCode::NOT_FOUND, "Research not found")),
        Err(e) => Err(ApiError::internal(e.to_string())),
    }
}

// ── Chat (SSE) ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    #[serde(default)]
    pub model: Option<String>,
}

/// `POST /chat`: run the research loop and stream its events.
///
/// The loop runs on its own task. A client that disconnects only stops the
/// stream; tools still run and the run's messages are still attached to
/// any research it finalized.
pub async fn chat_handler(
    State(ctx): State<SharedContext>,
    Json(payload): Json<ChatRequest>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    info!(
        messages = payload.messages.len(),
        model = payload.model.as_deref().unwrap_or(ctx.research_loop.model()),
        "Chat request"
    );

    let runner = match payload.model {
        Some(model) => ctx.research_loop.clone().with_model(model),
        None => ctx.research_loop.clone(),
    };
    let RunHandle { events, task } = runner.spawn(payload.messages);
    ctx.runs.spawn(attach_run_logs(ctx.store.clone(), task));

    let stream = events
        .into_stream()
        .map(|event| Ok(SseEvent::default().data(event.to_wire().to_string())));
    Sse::new(stream)
}

/// Wait for a run to finish and store its messages as the logs of every
/// research record it finalized.
async fn attach_run_logs(store: Arc<dyn ResearchStore>, task: JoinHandle<RunOutcome>) {
    let outcome = match task.await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(error = %e, "Research run task failed");
            return;
        }
    };

    let ids = finalized_research_ids(&outcome.new_messages);
    if ids.is_empty() {
        return;
    }
    let logs = match serde_json::to_value(&outcome.new_messages) {
        Ok(logs) => logs,
        Err(e) => {
            warn!(error = %e, "Could not serialize run logs");
            return;
        }
    };
    for id in ids {
        match store.update_details(id, None, Some(logs.clone())).await {
            Ok(true) => info!(research_id = id, "Attached run logs"),
            Ok(false) => warn!(research_id = id, "No details row to attach logs to"),
            Err(e) => warn!(research_id = id, error = %e, "Failed to attach run logs"),
        }
    }
}

/// Research ids reported by successful `final_result_tool` results.
pub fn finalized_research_ids(messages: &[Message]) -> Vec<i64> {
    messages
        .iter()
        .filter(|m| m.role == Role::Tool)
        .filter_map(|m| serde_json::from_str::<Value>(m.text()).ok())
        .filter(|v| v["final_result_tool"] == true)
        .filter_map(|v| v["research_id"].as_i64())
        .collect()
}

// ── Transcription ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TranscribeParams {
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptionResponse {
    pub text: String,
}

struct Upload {
    bytes: Vec<u8>,
    file_name: String,
    content_type: Option<String>,
}

/// `POST /transcribe`: multipart `audio` file plus optional `language`.
pub async fn transcribe_handler(
    State(ctx): State<SharedContext>,
    Query(params): Query<TranscribeParams>,
    mut multipart: Multipart,
) -> Result<Json<TranscriptionResponse>, ApiError> {
    let mut upload = None;
    let mut language = ctx.config.transcription.default_language.clone();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "audio" => {
                let content_type = field.content_type().map(str::to_string);
                let file_name = field.file_name().unwrap_or("audio").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(e.to_string()))?;
                upload = Some(Upload {
                    bytes: bytes.to_vec(),
                    file_name,
                    content_type,
                });
            }
            "language" => {
                language = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(e.to_string()))?;
            }
            _ => {}
        }
    }

    let upload = upload.ok_or_else(|| ApiError::bad_request("Missing audio file"))?;
    let accepted = upload
        .content_type
        .as_deref()
        .is_some_and(|ct| ACCEPTED_AUDIO_TYPES.contains(&ct));
    if !accepted {
        return Err(ApiError::bad_request("Unsupported audio file content type"));
    }

    let request = TranscriptionRequest {
        audio: upload.bytes,
        file_name: upload.file_name,
        language,
        model: params
            .model
            .unwrap_or_else(|| ctx.config.transcription.default_model.clone()),
    };

    match ctx.transcriber.transcribe(request).await {
        Ok(text) => Ok(Json(TranscriptionResponse { text })),
        Err(e @ TranscriptionError::UnsupportedModel(_)) => Err(ApiError::bad_request(e.to_string())),
        Err(e) => {
            warn!(error = %e, "Transcription failed");
            Err(ApiError::internal(e.to_string()))
        }
    }
}
