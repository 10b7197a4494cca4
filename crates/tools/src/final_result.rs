//! Final result tool: the agent's last action in a research run.
//!
//! Persists the summary row and the finalized report through the
//! [`ResearchStore`] and hands the finalized record back to the model (and,
//! via the tool-result event, to the client).

use async_trait::async_trait;
use delve_core::error::ToolError;
use delve_core::research::{NewResearch, ResearchStore};
use delve_core::tool::Tool;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::info;

use crate::ToolKind;

pub struct FinalResultTool {
    store: Arc<dyn ResearchStore>,
}

impl FinalResultTool {
    pub fn new(store: Arc<dyn ResearchStore>) -> Self {
        Self { store }
    }
}

fn string_field(args: &Value, key: &str) -> String {
    args[key].as_str().unwrap_or_default().to_string()
}

fn array_field(args: &Value, key: &str) -> Value {
    match &args[key] {
        Value::Array(items) => Value::Array(items.clone()),
        _ => Value::Array(Vec::new()),
    }
}

#[async_trait]
impl Tool for FinalResultTool {
    fn name(&self) -> &str {
        ToolKind::FinalResult.name()
    }

    fn description(&self) -> &str {
        "The final summary of the deep research task with all findings consolidated."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "title": {
                    "type": "string",
                    "description": "A short title for the research topic (just a few words)"
                },
                "keywords": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Array of relevant keywords and key terms related to the research topic"
                },
                "thumbnail": {
                    "type": "string",
                    "format": "uri",
                    "description": "A single thumbnail image URL that represents the research topic (if available)"
                },
                "images": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "url": { "type": "string", "format": "uri", "description": "The image URL" },
                            "description": { "type": "string", "description": "Description or caption for the image" }
                        },
                        "required": ["url"]
                    },
                    "description": "Array of images with URLs and descriptions that illustrate the research topic"
                },
                "introduction": {
                    "type": "string",
                    "description": "A brief introduction (150-250 words) explaining the research topic, methodology, and approach"
                },
                "content": {
                    "type": "string",
                    "description": "Detailed content from all research conducted, including all findings, data, and analysis"
                },
                "conclusion": {
                    "type": "string",
                    "description": "Conclusions drawn from the research, including implications, limitations, and future directions"
                },
                "references": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "title": { "type": "string", "description": "Title of the reference source" },
                            "url": { "type": "string", "description": "URL or source location" },
                            "type": { "type": "string", "description": "Type of source (e.g., 'wikipedia', 'academic_paper', 'website', etc.)" },
                            "accessed_date": { "type": "string", "description": "Date when the source was accessed (ISO format)" }
                        },
                        "required": ["title", "type"]
                    },
                    "description": "Array of references and sources used in the research"
                }
            },
            "required": ["title", "keywords", "introduction", "content", "conclusion", "references"]
        })
    }

    async fn execute(&self, arguments: Value) -> Result<Value, ToolError> {
        if !arguments.is_object() {
            return Err(ToolError::InvalidArguments(
                "final_result_tool expects a JSON object".into(),
            ));
        }

        let title = string_field(&arguments, "title");
        let thumbnail = string_field(&arguments, "thumbnail");
        let keywords: Vec<String> = arguments["keywords"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|k| k.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        let failed = |e: delve_core::error::StoreError| ToolError::ExecutionFailed {
            tool_name: ToolKind::FinalResult.name().into(),
            reason: e.to_string(),
        };

        let research_id = self
            .store
            .insert_research(NewResearch {
                title: title.clone(),
                thumbnail: thumbnail.clone(),
                keywords: keywords.clone(),
            })
            .await
            .map_err(failed)?;

        let record = json!({
            "final_result_tool": true,
            "result": "Final result tool called and executed successfully",
            "research_id": research_id,
            "title": title,
            "keywords": keywords,
            "introduction": string_field(&arguments, "introduction"),
            "content": string_field(&arguments, "content"),
            "conclusion": string_field(&arguments, "conclusion"),
            "references": array_field(&arguments, "references"),
            "thumbnail": thumbnail,
            "images": array_field(&arguments, "images"),
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "success": true,
            "processed": true,
        });

        self.store
            .upsert_details(research_id, record.clone(), Value::Array(Vec::new()))
            .await
            .map_err(failed)?;

        info!(research_id, title = %record["title"], "Research finalized");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delve_store::InMemoryStore;

    fn report() -> Value {
        json!({
            "title": "Eiffel Tower",
            "keywords": ["Paris", "wrought iron"],
            "thumbnail": "https://upload.wikimedia.org/eiffel.jpg",
            "images": [{"url": "https://upload.wikimedia.org/a.jpg", "description": "At night"}],
            "introduction": "Intro",
            "content": "Body",
            "conclusion": "Done",
            "references": [{"title": "Eiffel Tower", "type": "wikipedia"}]
        })
    }

    #[tokio::test]
    async fn persists_summary_and_details() {
        let store = Arc::new(InMemoryStore::new());
        let tool = FinalResultTool::new(store.clone());

        let out = tool.execute(report()).await.unwrap();
        assert_eq!(out["final_result_tool"], true);
        assert_eq!(out["success"], true);
        let id = out["research_id"].as_i64().unwrap();

        let full = store.get_full_research(id).await.unwrap().unwrap();
        assert_eq!(full.summary.title, "Eiffel Tower");
        assert_eq!(full.summary.keywords, vec!["Paris", "wrought iron"]);
        assert_eq!(full.details.unwrap()["content"], "Body");
        assert_eq!(full.logs.unwrap(), json!([]));
    }

    #[tokio::test]
    async fn timestamp_is_current() {
        let store = Arc::new(InMemoryStore::new());
        let out = FinalResultTool::new(store).execute(report()).await.unwrap();
        let ts = chrono::DateTime::parse_from_rfc3339(out["timestamp"].as_str().unwrap()).unwrap();
        let age = chrono::Utc::now().signed_duration_since(ts);
        assert!(age.num_seconds() < 60);
    }

    #[tokio::test]
    async fn missing_optional_fields_default() {
        let store = Arc::new(InMemoryStore::new());
        let out = FinalResultTool::new(store)
            .execute(json!({"title": "Bare"}))
            .await
            .unwrap();
        assert_eq!(out["images"], json!([]));
        assert_eq!(out["thumbnail"], "");
        assert_eq!(out["keywords"], json!([]));
    }

    #[tokio::test]
    async fn non_object_arguments_rejected() {
        let store = Arc::new(InMemoryStore::new());
        let err = FinalResultTool::new(store)
            .execute(json!("just a string"))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
