//! The research orchestration loop.

use delve_core::error::ProviderError;
use delve_core::message::{Message, MessageLog};
use delve_core::provider::{Provider, ProviderRequest, ToolDefinition};
use delve_core::tool::ToolRegistry;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::accumulator::DeltaAccumulator;
use crate::channel::{EventReceiver, EventSender, event_channel};
use crate::executor::ToolExecutor;
use crate::prompt::current_research_prompt;
use crate::stream_event::StreamEvent;

const DEFAULT_TEMPERATURE: f32 = 0.6;

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// The model answered without requesting tools.
    Completed,
    /// The provider could not be reached or its stream broke.
    ProviderFailed(String),
    /// The configured iteration limit was hit.
    IterationLimit,
}

/// What a finished run hands back to whoever spawned it.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub status: RunStatus,
    /// Every message appended during the run, in order.
    pub new_messages: Vec<Message>,
    /// Number of provider requests made.
    pub iterations: u32,
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }
}

/// A spawned run: the event stream plus the task producing it.
pub struct RunHandle {
    pub events: EventReceiver,
    pub task: JoinHandle<RunOutcome>,
}

/// Drives provider requests and tool execution until the model stops
/// calling tools.
///
/// Cheap to clone; the provider and registry are shared.
#[derive(Clone)]
pub struct ResearchLoop {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    model: String,
    temperature: f32,
    system_prompt: Option<String>,
    max_iterations: Option<u32>,
}

impl ResearchLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            tools,
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
            system_prompt: None,
            max_iterations: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Replace the default research prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Stop after `max` provider requests. Unlimited by default.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = Some(max);
        self
    }

    /// Use a different model for this loop.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Names of the tools offered to the model.
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.names()
    }

    /// Run on a background task.
    ///
    /// Dropping the returned receiver does not cancel the run; tool side
    /// effects still complete and the outcome is still available from the
    /// task.
    pub fn spawn(&self, history: Vec<Message>) -> RunHandle {
        let (tx, events) = event_channel();
        let runner = self.clone();
        let task = tokio::spawn(async move {
            let outcome = runner.run(history, &tx).await;
            tx.close();
            outcome
        });
        RunHandle { events, task }
    }

    /// Run to completion on the current task, pushing events to `events`.
    ///
    /// Does not close `events`; the caller owns the sentinel.
    pub async fn run(&self, history: Vec<Message>, events: &EventSender) -> RunOutcome {
        let run_id = Uuid::new_v4();
        let span = info_span!("research_run", %run_id, model = %self.model);
        self.drive(history, events).instrument(span).await
    }

    async fn drive(&self, history: Vec<Message>, events: &EventSender) -> RunOutcome {
        let mut log = MessageLog::from_history(history);
        let prompt = self
            .system_prompt
            .clone()
            .unwrap_or_else(current_research_prompt);
        log.ensure_system_prompt(&prompt);

        info!(
            provider = self.provider.name(),
            messages = log.len(),
            "Starting research run"
        );

        let definitions = self.tools.definitions();
        let executor = ToolExecutor::new(&self.tools);
        let mut iteration: u32 = 0;

        loop {
            if let Some(max) = self.max_iterations {
                if iteration >= max {
                    warn!(iterations = iteration, "Max tool iterations reached");
                    events.send(StreamEvent::Error(format!(
                        "Maximum tool iterations ({max}) reached"
                    )));
                    return finish(RunStatus::IterationLimit, &log, iteration);
                }
            }
            iteration += 1;
            debug!(iteration, "Requesting completion");

            let (text, calls) = match self.stream_turn(&log, &definitions, events).await {
                Ok(turn) => turn,
                Err(e) => {
                    warn!(iteration, error = %e, "Provider call failed");
                    events.send(StreamEvent::Error(format!("[Error during API call]: {e}")));
                    return finish(RunStatus::ProviderFailed(e.to_string()), &log, iteration);
                }
            };

            log.push(Message::assistant_with_calls(text, calls.clone()));
            for call in &calls {
                events.send(StreamEvent::ToolCallAnnounced(call.clone()));
            }

            if calls.is_empty() {
                info!(iterations = iteration, "Research run complete");
                events.send(StreamEvent::FinalResponse(log.appended().to_vec()));
                return finish(RunStatus::Completed, &log, iteration);
            }

            debug!(iteration, tool_count = calls.len(), "Executing tool calls");
            for call in &calls {
                let execution = executor.execute(call).await;
                if let Some(message) = execution.decode_error {
                    events.send(StreamEvent::Error(message));
                }
                let result = execution.result;
                log.push(Message::tool_result(&result.tool_call_id, &result.content));
                events.send(StreamEvent::ToolResult(result));
            }
        }
    }

    /// One REQUESTING + STREAMING pass. Text fragments are forwarded as they
    /// arrive; tool calls are only returned once the stream has ended.
    async fn stream_turn(
        &self,
        log: &MessageLog,
        definitions: &[ToolDefinition],
        events: &EventSender,
    ) -> Result<(String, Vec<delve_core::message::ToolCallRecord>), ProviderError> {
        let request = ProviderRequest {
            model: self.model.clone(),
            messages: log.messages().to_vec(),
            temperature: self.temperature,
            tools: definitions.to_vec(),
        };

        let mut stream = self.provider.stream(request).await?;
        let mut acc = DeltaAccumulator::new();

        while let Some(item) = stream.recv().await {
            let chunk = item?;
            if let Some(text) = chunk.content.as_deref().filter(|t| !t.is_empty()) {
                events.send(StreamEvent::TextChunk(text.to_string()));
            }
            acc.absorb(&chunk);
        }

        Ok(acc.finish())
    }
}

fn finish(status: RunStatus, log: &MessageLog, iterations: u32) -> RunOutcome {
    RunOutcome {
        status,
        new_messages: log.appended().to_vec(),
        iterations,
    }
}
