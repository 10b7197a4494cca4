//! Provider implementations for Delve.
//!
//! The completion provider implements `delve_core::Provider`; speech-to-text
//! implements `delve_core::Transcriber`.

pub mod openai_compat;
pub mod transcription;

pub use openai_compat::OpenAiCompatProvider;
pub use transcription::GroqTranscriber;
