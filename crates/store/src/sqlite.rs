//! SQLite research store.
//!
//! Two tables:
//! - `research`: one summary row per finished report
//! - `research_details`: the report body and run log, keyed by `researchID`
//!
//! JSON columns (`keywords`, `details`, `logs`) are stored as TEXT;
//! timestamps as RFC 3339 TEXT.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use delve_core::error::StoreError;
use delve_core::research::{
    NewResearch, ResearchDetails, ResearchPatch, ResearchStore, ResearchSummary,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// A production SQLite research store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database file at `path`, running migrations.
    ///
    /// Missing parent directories are created.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StoreError::Storage(format!("Cannot create {}: {e}", parent.display()))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite research store initialized at {}", path.display());
        Ok(store)
    }

    /// An ephemeral in-process database.
    ///
    /// Limited to one connection: every `:memory:` connection is its own
    /// database.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite URL: {e}")))?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create tables and indexes if they do not exist.
    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS research (
                researchID  INTEGER PRIMARY KEY AUTOINCREMENT,
                title       TEXT NOT NULL,
                thumbnail   TEXT,
                keywords    TEXT NOT NULL DEFAULT '[]',
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("research table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS research_details (
                researchID  INTEGER PRIMARY KEY,
                details     TEXT NOT NULL,
                logs        TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                FOREIGN KEY (researchID) REFERENCES research (researchID)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("research_details table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_research_created_at ON research(created_at DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("created_at index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    /// Fixed-width timestamps so TEXT ordering matches time ordering.
    fn now() -> String {
        Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn parse_time(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    fn to_json_text<T: serde::Serialize + ?Sized>(value: &T, what: &str) -> Result<String, StoreError> {
        serde_json::to_string(value)
            .map_err(|e| StoreError::Storage(format!("{what} serialization: {e}")))
    }

    /// Parse a `ResearchSummary` from a SQLite row.
    fn row_to_summary(row: &sqlx::sqlite::SqliteRow) -> Result<ResearchSummary, StoreError> {
        let research_id: i64 = row
            .try_get("researchID")
            .map_err(|e| StoreError::QueryFailed(format!("researchID column: {e}")))?;
        let title: String = row
            .try_get("title")
            .map_err(|e| StoreError::QueryFailed(format!("title column: {e}")))?;
        let thumbnail: Option<String> = row
            .try_get("thumbnail")
            .map_err(|e| StoreError::QueryFailed(format!("thumbnail column: {e}")))?;
        let keywords_json: String = row
            .try_get("keywords")
            .map_err(|e| StoreError::QueryFailed(format!("keywords column: {e}")))?;
        let created_at: String = row
            .try_get("created_at")
            .map_err(|e| StoreError::QueryFailed(format!("created_at column: {e}")))?;
        let updated_at: String = row
            .try_get("updated_at")
            .map_err(|e| StoreError::QueryFailed(format!("updated_at column: {e}")))?;

        Ok(ResearchSummary {
            research_id,
            title,
            thumbnail,
            keywords: serde_json::from_str(&keywords_json).unwrap_or_default(),
            created_at: Self::parse_time(&created_at),
            updated_at: Self::parse_time(&updated_at),
        })
    }

    fn row_to_details(row: &sqlx::sqlite::SqliteRow) -> Result<ResearchDetails, StoreError> {
        let research_id: i64 = row
            .try_get("researchID")
            .map_err(|e| StoreError::QueryFailed(format!("researchID column: {e}")))?;
        let details: String = row
            .try_get("details")
            .map_err(|e| StoreError::QueryFailed(format!("details column: {e}")))?;
        let logs: String = row
            .try_get("logs")
            .map_err(|e| StoreError::QueryFailed(format!("logs column: {e}")))?;
        let created_at: String = row
            .try_get("created_at")
            .map_err(|e| StoreError::QueryFailed(format!("created_at column: {e}")))?;

        Ok(ResearchDetails {
            research_id,
            details: serde_json::from_str(&details)
                .unwrap_or_else(|_| serde_json::Value::Object(Default::default())),
            logs: serde_json::from_str(&logs)
                .unwrap_or_else(|_| serde_json::Value::Array(Vec::new())),
            created_at: Self::parse_time(&created_at),
        })
    }

    async fn research_exists(&self, id: i64) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM research WHERE researchID = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("exists: {e}")))?;
        Ok(row.is_some())
    }
}

#[async_trait]
impl ResearchStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn insert_research(&self, research: NewResearch) -> Result<i64, StoreError> {
        let keywords = Self::to_json_text(&research.keywords, "Keywords")?;
        let now = Self::now();

        let result = sqlx::query(
            r#"
            INSERT INTO research (title, thumbnail, keywords, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            "#,
        )
        .bind(&research.title)
        .bind(&research.thumbnail)
        .bind(&keywords)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT failed: {e}")))?;

        let id = result.last_insert_rowid();
        debug!(research_id = id, title = %research.title, "Stored research");
        Ok(id)
    }

    async fn update_research(&self, id: i64, patch: ResearchPatch) -> Result<(), StoreError> {
        if patch.is_empty() {
            return Ok(());
        }

        let keywords = patch
            .keywords
            .as_ref()
            .map(|k| Self::to_json_text(k, "Keywords"))
            .transpose()?;

        sqlx::query(
            r#"
            UPDATE research SET
                title      = COALESCE(?1, title),
                thumbnail  = COALESCE(?2, thumbnail),
                keywords   = COALESCE(?3, keywords),
                updated_at = ?4
            WHERE researchID = ?5
            "#,
        )
        .bind(&patch.title)
        .bind(&patch.thumbnail)
        .bind(&keywords)
        .bind(Self::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("UPDATE failed: {e}")))?;

        Ok(())
    }

    async fn get_research(&self, id: i64) -> Result<Option<ResearchSummary>, StoreError> {
        let row = sqlx::query("SELECT * FROM research WHERE researchID = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("get: {e}")))?;

        row.as_ref().map(Self::row_to_summary).transpose()
    }

    async fn list_research(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ResearchSummary>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM research ORDER BY created_at DESC, researchID DESC LIMIT ?1 OFFSET ?2",
        )
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("list: {e}")))?;

        rows.iter().map(Self::row_to_summary).collect()
    }

    async fn upsert_details(
        &self,
        id: i64,
        details: serde_json::Value,
        logs: serde_json::Value,
    ) -> Result<(), StoreError> {
        if !self.research_exists(id).await? {
            return Err(StoreError::NotFound(id));
        }

        let details = Self::to_json_text(&details, "Details")?;
        let logs = Self::to_json_text(&logs, "Logs")?;

        sqlx::query(
            r#"
            INSERT INTO research_details (researchID, details, logs, created_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(researchID) DO UPDATE SET
                details = excluded.details,
                logs = excluded.logs
            "#,
        )
        .bind(id)
        .bind(&details)
        .bind(&logs)
        .bind(Self::now())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("details upsert failed: {e}")))?;

        debug!(research_id = id, "Stored research details");
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

        let details = details
            .as_ref()
            .map(|d| Self::to_json_text(d, "Details"))
            .transpose()?;
        let logs = logs
            .as_ref()
            .map(|l| Self::to_json_text(l, "Logs"))
            .transpose()?;

        let result = sqlx::query(
            r#"
            UPDATE research_details SET
                details = COALESCE(?1, details),
                logs    = COALESCE(?2, logs)
            WHERE researchID = ?3
            "#,
        )
        .bind(&details)
        .bind(&logs)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("details update failed: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_details(&self, id: i64) -> Result<Option<ResearchDetails>, StoreError> {
        let row = sqlx::query("SELECT * FROM research_details WHERE researchID = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("get details: {e}")))?;

        row.as_ref().map(Self::row_to_details).transpose()
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("SQLite research store closed");
    }
}
