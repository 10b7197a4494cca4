//! In-memory store: useful for testing and ephemeral sessions.

use async_trait::async_trait;
use chrono::Utc;
use delve_core::error::StoreError;
use delve_core::research::{
    NewResearch, ResearchDetails, ResearchPatch, ResearchStore, ResearchSummary,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    next_id: i64,
    research: BTreeMap<i64, ResearchSummary>,
    details: BTreeMap<i64, ResearchDetails>,
}

/// An in-memory store keyed by research id.
/// Nothing survives the process.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored summaries.
    pub async fn count(&self) -> usize {
        self.tables.read().await.research.len()
    }
}

#[async_trait]
impl ResearchStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn insert_research(&self, research: NewResearch) -> Result<i64, StoreError> {
        let mut tables = self.tables.write().await;
        tables.next_id += 1;
        let id = tables.next_id;
        let now = Utc::now();
        tables.research.insert(
            id,
            ResearchSummary {
                research_id: id,
                title: research.title,
                thumbnail: Some(research.thumbnail),
                keywords: research.keywords,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn update_research(&self, id: i64, patch: ResearchPatch) -> Result<(), StoreError> {
        if patch.is_empty() {
            return Ok(());
        }
        let mut tables = self.tables.write().await;
        if let Some(row) = tables.research.get_mut(&id) {
            if let Some(title) = patch.title {
                row.title = title;
            }
            if let Some(thumbnail) = patch.thumbnail {
                row.thumbnail = Some(thumbnail);
            }
            if let Some(keywords) = patch.keywords {
                row.keywords = keywords;
            }
            row.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn get_research(&self, id: i64) -> Result<Option<ResearchSummary>, StoreError> {
        Ok(self.tables.read().await.research.get(&id).cloned())
    }

    async fn list_research(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ResearchSummary>, StoreError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<ResearchSummary> = tables.research.values().cloned().collect();
        rows.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(b.research_id.cmp(&a.research_id))
        });
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }

    async fn upsert_details(
        &self,
        id: i64,
        details: serde_json::Value,
        logs: serde_json::Value,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.research.contains_key(&id) {
            return Err(StoreError::NotFound(id));
        }
        match tables.details.get_mut(&id) {
            Some(row) => {
                row.details = details;
                row.logs = logs;
            }
            None => {
                tables.details.insert(
                    id,
                    ResearchDetails {
                        research_id: id,
                        details,
                        logs,
                        created_at: Utc::now(),
                    },
                );
            }
        }
        Ok(())
    }

    async fn update_details(
        &self,
        id: i64,
        details: Option<serde_json::Value>,
        logs: Option<serde_json::Value>,
    ) -> Result<bool, StoreError> {
        if details.is_none() && logs.is_none() {
            return Ok(false);
        }
        let mut tables = self.tables.write().await;
        let Some(row) = tables.details.get_mut(&id) else {
            return Ok(false);
        };
        if let Some(details) = details {
            row.details = details;
        }
        if let Some(logs) = logs {
            row.logs = logs;
        }
        Ok(true)
    }

    async fn get_details(&self, id: i64) -> Result<Option<ResearchDetails>, StoreError> {
        Ok(self.tables.read().await.details.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn research(title: &str) -> NewResearch {
        NewResearch {
            title: title.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn ids_are_sequential() {
        let store = InMemoryStore::new();
        assert_eq!(store.insert_research(research("a")).await.unwrap(), 1);
        assert_eq!(store.insert_research(research("b")).await.unwrap(), 2);
        assert_eq!(store.count().await, 2);
    }

    #[tokio::test]
    async fn list_newest_first() {
        let store = InMemoryStore::new();
        for t in ["first", "second", "third"] {
            store.insert_research(research(t)).await.unwrap();
        }
        let titles: Vec<String> = store
            .list_research(2, 0)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.title)
            .collect();
        assert_eq!(titles, vec!["third", "second"]);
    }

    #[tokio::test]
    async fn patch_updates_keywords() {
        let store = InMemoryStore::new();
        let id = store.insert_research(research("t")).await.unwrap();
        store
            .update_research(
                id,
                ResearchPatch {
                    keywords: Some(vec!["k".into()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let row = store.get_research(id).await.unwrap().unwrap();
        assert_eq!(row.keywords, vec!["k"]);
        assert_eq!(row.title, "t");
    }

    #[tokio::test]
    async fn details_lifecycle() {
        let store = InMemoryStore::new();
        let id = store.insert_research(research("t")).await.unwrap();

        assert!(!store.update_details(id, None, Some(json!([]))).await.unwrap());
        store.upsert_details(id, json!({"a": 1}), json!([])).await.unwrap();
        assert!(store.update_details(id, Some(json!({"a": 2})), None).await.unwrap());

        let full = store.get_full_research(id).await.unwrap().unwrap();
        assert_eq!(full.details.unwrap()["a"], 2);
        assert_eq!(full.logs.unwrap(), json!([]));
    }

    #[tokio::test]
    async fn details_for_unknown_research_rejected() {
        let store = InMemoryStore::new();
        assert!(matches!(
            store.upsert_details(5, json!({}), json!([])).await,
            Err(StoreError::NotFound(5))
        ));
    }
}
