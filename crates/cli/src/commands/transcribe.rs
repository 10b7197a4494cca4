//! `delve transcribe`: Transcribe an audio file.

use delve_config::AppConfig;
use delve_core::transcription::{Transcriber, TranscriptionRequest};
use delve_providers::GroqTranscriber;
use std::path::PathBuf;

pub async fn run(
    config: AppConfig,
    file: PathBuf,
    language: Option<String>,
    model: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let audio = tokio::fs::read(&file)
        .await
        .map_err(|e| format!("Failed to read {}: {e}", file.display()))?;
    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "audio".into());

    let transcriber = GroqTranscriber::from_config(&config.transcription);
    let text = transcriber
        .transcribe(TranscriptionRequest {
            audio,
            file_name,
            language: language.unwrap_or(config.transcription.default_language),
            model: model.unwrap_or(config.transcription.default_model),
        })
        .await?;

    println!("{text}");
    Ok(())
}
