//! Speech-to-text through Groq's Whisper API.

use async_trait::async_trait;
use delve_core::error::TranscriptionError;
use delve_core::transcription::{Transcriber, TranscriptionRequest};
use serde::Deserialize;
use tracing::{debug, warn};

/// Models Groq serves for transcription.
pub const SUPPORTED_MODELS: &[&str] = &["whisper-large-v3", "whisper-large-v3-turbo"];

/// Voice transcription through Groq's OpenAI-compatible audio endpoint.
pub struct GroqTranscriber {
    api_key: Option<String>,
    api_url: String,
    client: reqwest::Client,
}

impl GroqTranscriber {
    pub fn new(api_key: Option<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key,
            api_url: format!(
                "{}/audio/transcriptions",
                base_url.into().trim_end_matches('/')
            ),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &delve_config::TranscriptionConfig) -> Self {
        Self::new(config.api_key.clone(), &config.api_url)
    }

    /// Normalize a model name, rejecting ones Groq does not serve.
    pub fn resolve_model(model: &str) -> Result<String, TranscriptionError> {
        let model = model.to_lowercase();
        if SUPPORTED_MODELS.contains(&model.as_str()) {
            Ok(model)
        } else {
            Err(TranscriptionError::UnsupportedModel(model))
        }
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[async_trait]
impl Transcriber for GroqTranscriber {
    fn name(&self) -> &str {
        "groq"
    }

    fn supported_models(&self) -> &[&str] {
        SUPPORTED_MODELS
    }

    async fn transcribe(&self, request: TranscriptionRequest) -> Result<String, TranscriptionError> {
        let model = Self::resolve_model(&request.model)?;
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| TranscriptionError::NotConfigured("GROQ_API_KEY is not set".into()))?;

        debug!(
            model = %model,
            language = %request.language,
            bytes = request.audio.len(),
            "Sending transcription request"
        );

        let file_part = reqwest::multipart::Part::bytes(request.audio)
            .file_name(request.file_name)
            .mime_str("application/octet-stream")
            .map_err(|e| TranscriptionError::Request(e.to_string()))?;

        let form = reqwest::multipart::Form::new()
            .part("file", file_part)
            .text("model", model)
            .text("language", request.language)
            .text("response_format", "json");

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {api_key}"))
            .multipart(form)
            .timeout(std::time::Duration::from_secs(60))
            .send()
            .await
            .map_err(|e| TranscriptionError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(%status, body = %body, "Groq transcription failed");
            return Err(TranscriptionError::Request(format!("HTTP {status}: {body}")));
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| TranscriptionError::InvalidResponse(e.to_string()))?;

        Ok(parsed.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_names_are_case_insensitive() {
        assert_eq!(
            GroqTranscriber::resolve_model("Whisper-Large-V3").unwrap(),
            "whisper-large-v3"
        );
        assert!(GroqTranscriber::resolve_model("whisper-large-v3-turbo").is_ok());
    }

    #[test]
    fn unknown_model_rejected() {
        let err = GroqTranscriber::resolve_model("distil-whisper").unwrap_err();
        assert_eq!(err.to_string(), "Unknown model: distil-whisper");
    }

    #[test]
    fn endpoint_from_base_url() {
        let t = GroqTranscriber::new(None, "https://api.groq.com/openai/v1/");
        assert_eq!(t.api_url, "https://api.groq.com/openai/v1/audio/transcriptions");
    }

    #[tokio::test]
    async fn missing_key_is_not_configured() {
        let t = GroqTranscriber::new(None, "https://api.groq.com/openai/v1");
        let err = t
            .transcribe(TranscriptionRequest {
                audio: vec![0u8; 4],
                file_name: "clip.webm".into(),
                language: "en".into(),
                model: "whisper-large-v3".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TranscriptionError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn model_checked_before_key() {
        let t = GroqTranscriber::new(None, "https://api.groq.com/openai/v1");
        let err = t
            .transcribe(TranscriptionRequest {
                audio: vec![],
                file_name: "clip.wav".into(),
                language: "en".into(),
                model: "tiny".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TranscriptionError::UnsupportedModel(_)));
    }
}
