//! # Delve Core
//!
//! Domain types, traits, and error definitions for the Delve research agent.
//! This crate has **no framework dependencies**: it defines the domain model
//! that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator of the orchestration loop is a trait here:
//! the completion [`Provider`], the [`Tool`]s behind the [`ToolRegistry`],
//! the [`ResearchStore`] and the [`Transcriber`]. Implementations live in
//! their respective crates so the loop can be driven by scripted stand-ins
//! in tests.

pub mod error;
pub mod message;
pub mod provider;
pub mod research;
pub mod tool;
pub mod transcription;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use message::{Message, MessageLog, Role, ToolCallRecord};
pub use provider::{ChunkStream, Provider, ProviderRequest, StreamChunk, ToolCallDelta, ToolDefinition};
pub use research::{FullResearch, NewResearch, ResearchDetails, ResearchPatch, ResearchStore, ResearchSummary};
pub use tool::{Lookup, Tool, ToolRegistry, ToolRegistryBuilder, ToolResult};
pub use transcription::{TranscriptionRequest, Transcriber};
