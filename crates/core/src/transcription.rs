//! Transcriber trait: speech-to-text for voice queries.

use async_trait::async_trait;

use crate::error::TranscriptionError;

/// An audio clip to transcribe.
#[derive(Debug, Clone)]
pub struct TranscriptionRequest {
    /// Raw audio bytes
    pub audio: Vec<u8>,

    /// Original file name, forwarded to the service for format sniffing
    pub file_name: String,

    /// ISO-639-1 language hint (e.g., "en")
    pub language: String,

    /// Model identifier (e.g., "whisper-large-v3")
    pub model: String,
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    fn name(&self) -> &str;

    /// Models this transcriber accepts, lowercase.
    fn supported_models(&self) -> &[&str];

    /// Transcribe the clip and return the recognized text.
    async fn transcribe(&self, request: TranscriptionRequest) -> Result<String, TranscriptionError>;
}
