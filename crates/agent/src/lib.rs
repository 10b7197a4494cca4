//! The Delve research loop.
//!
//! Drives the REQUESTING → STREAMING → EXECUTING_TOOLS cycle against a
//! streaming [`Provider`](delve_core::provider::Provider), reassembling
//! fragmented tool calls, executing them through the shared
//! [`ToolRegistry`](delve_core::tool::ToolRegistry), and pushing
//! [`StreamEvent`]s to a detachable consumer.

pub mod accumulator;
pub mod channel;
pub mod executor;
pub mod loop_runner;
pub mod prompt;
pub mod stream_event;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use accumulator::DeltaAccumulator;
pub use channel::{EventReceiver, EventSender, event_channel};
pub use executor::{Execution, ToolExecutor};
pub use loop_runner::{ResearchLoop, RunHandle, RunOutcome, RunStatus};
pub use prompt::research_system_prompt;
pub use stream_event::StreamEvent;
