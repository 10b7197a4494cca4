//! ResearchStore trait: persistence for finished research reports.
//!
//! A research record has two halves: a summary row (title, thumbnail,
//! keywords) written by the final-result tool, and a details row holding the
//! structured report plus the conversation log that produced it.
//!
//! Field names on the wire follow the client contract (`researchID`,
//! `created_at`, ...), so these types are serialized straight into HTTP
//! responses.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Fields for a new research summary row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewResearch {
    pub title: String,

    #[serde(default)]
    pub thumbnail: String,

    #[serde(default)]
    pub keywords: Vec<String>,
}

/// A partial update to a research summary. `None` fields are left alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchPatch {
    pub title: Option<String>,
    pub thumbnail: Option<String>,
    pub keywords: Option<Vec<String>>,
}

impl ResearchPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.thumbnail.is_none() && self.keywords.is_none()
    }
}

/// A research summary row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchSummary {
    #[serde(rename = "researchID")]
    pub research_id: i64,

    pub title: String,

    #[serde(default)]
    pub thumbnail: Option<String>,

    #[serde(default)]
    pub keywords: Vec<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// The structured report and run log attached to a research record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchDetails {
    #[serde(rename = "researchID")]
    pub research_id: i64,

    /// The finalized report as produced by the final-result tool
    pub details: serde_json::Value,

    /// The conversation that produced the report
    pub logs: serde_json::Value,

    pub created_at: DateTime<Utc>,
}

/// A summary merged with its details, when they exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullResearch {
    #[serde(flatten)]
    pub summary: ResearchSummary,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details_created_at: Option<DateTime<Utc>>,
}

impl FullResearch {
    /// Merge a summary with its (optional) details row.
    pub fn assemble(summary: ResearchSummary, details: Option<ResearchDetails>) -> Self {
        match details {
            Some(d) => Self {
                summary,
                details: Some(d.details),
                logs: Some(d.logs),
                details_created_at: Some(d.created_at),
            },
            None => Self {
                summary,
                details: None,
                logs: None,
                details_created_at: None,
            },
        }
    }
}

/// The core ResearchStore trait.
///
/// Implementations: SQLite (production), in-memory (tests, ephemeral runs).
#[async_trait]
pub trait ResearchStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// Insert a new summary row and return its id.
    async fn insert_research(&self, research: NewResearch) -> Result<i64, StoreError>;

    /// Apply a partial update, bumping `updated_at`. An empty patch is a no-op.
    async fn update_research(&self, id: i64, patch: ResearchPatch) -> Result<(), StoreError>;

    async fn get_research(&self, id: i64) -> Result<Option<ResearchSummary>, StoreError>;

    /// List summaries, newest first.
    async fn list_research(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ResearchSummary>, StoreError>;

    /// Insert the details row, or overwrite it if one already exists.
    async fn upsert_details(
        &self,
        id: i64,
        details: serde_json::Value,
        logs: serde_json::Value,
    ) -> Result<(), StoreError>;

    /// Update fields of an existing details row.
    ///
    /// Returns `false` when both fields are `None` or no row exists.
    async fn update_details(
        &self,
        id: i64,
        details: Option<serde_json::Value>,
        logs: Option<serde_json::Value>,
    ) -> Result<bool, StoreError>;

    async fn get_details(&self, id: i64) -> Result<Option<ResearchDetails>, StoreError>;

    /// Summary plus details and logs when present.
    async fn get_full_research(&self, id: i64) -> Result<Option<FullResearch>, StoreError> {
        let Some(summary) = self.get_research(id).await? else {
            return Ok(None);
        };
        let details = self.get_details(id).await?;
        Ok(Some(FullResearch::assemble(summary, details)))
    }

    /// Release any held resources. Further calls may fail.
    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> ResearchSummary {
        let now = Utc::now();
        ResearchSummary {
            research_id: 7,
            title: "Eiffel Tower".into(),
            thumbnail: Some("https://example.org/t.jpg".into()),
            keywords: vec!["paris".into(), "iron".into()],
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn summary_uses_client_field_names() {
        let json = serde_json::to_value(summary()).unwrap();
        assert_eq!(json["researchID"], 7);
        assert!(json.get("research_id").is_none());
        assert!(json.get("created_at").is_some());
    }

    #[test]
    fn full_research_flattens_summary() {
        let full = FullResearch::assemble(summary(), None);
        let json = serde_json::to_value(&full).unwrap();
        assert_eq!(json["title"], "Eiffel Tower");
        assert!(json.get("details").is_none());
        assert!(json.get("logs").is_none());
    }

    #[test]
    fn full_research_carries_details() {
        let details = ResearchDetails {
            research_id: 7,
            details: serde_json::json!({"introduction": "..."}),
            logs: serde_json::json!([{"role": "user", "content": "hi"}]),
            created_at: Utc::now(),
        };
        let full = FullResearch::assemble(summary(), Some(details));
        let json = serde_json::to_value(&full).unwrap();
        assert_eq!(json["details"]["introduction"], "...");
        assert_eq!(json["logs"][0]["role"], "user");
        assert!(json.get("details_created_at").is_some());
    }

    #[test]
    fn empty_patch_detected() {
        assert!(ResearchPatch::default().is_empty());
        let patch = ResearchPatch {
            title: Some("x".into()),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }
}
