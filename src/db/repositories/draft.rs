//! Draft repository
//!
//! Database operations for drafts.
//!
//! Drafts for an existing row are keyed by `(content_type, original_id)`,
//! one per row; drafts of rows not created yet have no `original_id` and
//! are addressed by their own id. Every write bumps `version`; a write that
//! names the version it started from fails if another write got there first.

use crate::db::DynDatabasePool;
use crate::models::{ContentKind, Draft};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Result of a versioned draft write
#[derive(Debug, Clone, PartialEq)]
pub enum DraftWrite {
    Written(Draft),
    NotFound,
    /// The stored version differs from the expected one
    Stale { current: i64 },
}

/// Draft repository trait
#[async_trait]
pub trait DraftRepository: Send + Sync {
    /// List drafts of one kind, most recently edited first
    async fn list(&self, kind: ContentKind) -> Result<Vec<Draft>>;

    /// Get draft by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Draft>>;

    /// Get the draft attached to an existing row
    async fn get_for_original(&self, kind: ContentKind, original_id: i64) -> Result<Option<Draft>>;

    /// Create a new draft at version 1. Returns `None` if the row already
    /// has a draft.
    async fn create(&self, kind: ContentKind, original_id: Option<i64>, data: &Value)
        -> Result<Option<Draft>>;

    /// Replace a draft's data and bump its version
    async fn update(&self, id: i64, data: &Value, expected_version: Option<i64>)
        -> Result<DraftWrite>;

    /// Delete a draft
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Delete a draft only if it is still at `version`
    async fn delete_at_version(&self, id: i64, version: i64) -> Result<bool>;
}

/// SQLx-based draft repository implementation
pub struct SqlxDraftRepository {
    pool: DynDatabasePool,
}

impl SqlxDraftRepository {
    /// Create a new SQLx draft repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn DraftRepository> {
        Arc::new(Self::new(pool))
    }
}

macro_rules! dispatch {
    ($pool:expr, $sqlite:ident, $mysql:ident ($($arg:expr),*)) => {
        match ($pool.as_sqlite(), $pool.as_mysql()) {
            (Some(p), _) => $sqlite(p, $($arg),*).await,
            (_, Some(p)) => $mysql(p, $($arg),*).await,
            _ => anyhow::bail!("Database pool exposes no backend"),
        }
    };
}

#[async_trait]
impl DraftRepository for SqlxDraftRepository {
    async fn list(&self, kind: ContentKind) -> Result<Vec<Draft>> {
        dispatch!(self.pool, list_sqlite, list_mysql(kind))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Draft>> {
        dispatch!(self.pool, get_by_id_sqlite, get_by_id_mysql(id))
    }

    async fn get_for_original(&self, kind: ContentKind, original_id: i64) -> Result<Option<Draft>> {
        dispatch!(
            self.pool,
            get_for_original_sqlite,
            get_for_original_mysql(kind, original_id)
        )
    }

    async fn create(
        &self,
        kind: ContentKind,
        original_id: Option<i64>,
        data: &Value,
    ) -> Result<Option<Draft>> {
        dispatch!(self.pool, create_sqlite, create_mysql(kind, original_id, data))
    }

    async fn update(
        &self,
        id: i64,
        data: &Value,
        expected_version: Option<i64>,
    ) -> Result<DraftWrite> {
        dispatch!(
            self.pool,
            update_sqlite,
            update_mysql(id, data, expected_version)
        )
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        dispatch!(self.pool, delete_sqlite, delete_mysql(id, None))
    }

    async fn delete_at_version(&self, id: i64, version: i64) -> Result<bool> {
        dispatch!(self.pool, delete_sqlite, delete_mysql(id, Some(version)))
    }
}

const DRAFT_COLUMNS: &str = "id, content_type, original_id, data, version, created_at, updated_at";

fn parse_kind(raw: &str) -> Result<ContentKind> {
    raw.parse()
        .with_context(|| format!("Draft has unknown content type: {}", raw))
}

fn parse_data(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or(Value::Null)
}

/// A second draft for the same row
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(e) if e.is_unique_violation())
}

const INSERT_SQL: &str = r#"
    INSERT INTO drafts (content_type, original_id, data, version, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?)
"#;

const DELETE_SQL: &str = "DELETE FROM drafts WHERE id = ? AND (? IS NULL OR version = ?)";

// ============================================================================
// SQLite implementations
// ============================================================================

fn row_to_draft_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Draft> {
    let content_type: String = row.try_get("content_type")?;
    let data: String = row.try_get("data")?;
    Ok(Draft {
        id: row.try_get("id")?,
        content_type: parse_kind(&content_type)?,
        original_id: row.try_get("original_id")?,
        data: parse_data(&data),
        version: row.try_get("version")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

async fn list_sqlite(pool: &SqlitePool, kind: ContentKind) -> Result<Vec<Draft>> {
    let sql = format!(
        "SELECT {} FROM drafts WHERE content_type = ? ORDER BY updated_at DESC, id DESC",
        DRAFT_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(kind.as_str())
        .fetch_all(pool)
        .await
        .context("Failed to list drafts")?;

    rows.iter().map(row_to_draft_sqlite).collect()
}

async fn get_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Draft>> {
    let sql = format!("SELECT {} FROM drafts WHERE id = ?", DRAFT_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get draft by ID")?;

    row.as_ref().map(row_to_draft_sqlite).transpose()
}

async fn get_for_original_sqlite(
    pool: &SqlitePool,
    kind: ContentKind,
    original_id: i64,
) -> Result<Option<Draft>> {
    let sql = format!(
        "SELECT {} FROM drafts WHERE content_type = ? AND original_id = ? ORDER BY id LIMIT 1",
        DRAFT_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(kind.as_str())
        .bind(original_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get draft for row")?;

    row.as_ref().map(row_to_draft_sqlite).transpose()
}

async fn create_sqlite(
    pool: &SqlitePool,
    kind: ContentKind,
    original_id: Option<i64>,
    data: &Value,
) -> Result<Option<Draft>> {
    let mut draft = Draft::new(kind, original_id, data.clone());

    let result = sqlx::query(INSERT_SQL)
        .bind(kind.as_str())
        .bind(original_id)
        .bind(data.to_string())
        .bind(draft.version)
        .bind(draft.created_at)
        .bind(draft.updated_at)
        .execute(pool)
        .await;
    let result = match result {
        Ok(result) => result,
        Err(e) if is_unique_violation(&e) => return Ok(None),
        Err(e) => return Err(e).context("Failed to create draft"),
    };

    draft.id = result.last_insert_rowid();
    Ok(Some(draft))
}

/// One conditional UPDATE, so concurrent saves never hold a read lock
/// while waiting to write
async fn update_sqlite(
    pool: &SqlitePool,
    id: i64,
    data: &Value,
    expected_version: Option<i64>,
) -> Result<DraftWrite> {
    let sql = format!(
        "UPDATE drafts SET data = ?, version = version + 1, updated_at = ? \
         WHERE id = ? AND (? IS NULL OR version = ?) RETURNING {}",
        DRAFT_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(data.to_string())
        .bind(Utc::now())
        .bind(id)
        .bind(expected_version)
        .bind(expected_version)
        .fetch_optional(pool)
        .await
        .context("Failed to update draft")?;
    if let Some(row) = row {
        return Ok(DraftWrite::Written(row_to_draft_sqlite(&row)?));
    }

    let current: Option<i64> = sqlx::query_scalar("SELECT version FROM drafts WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to read draft version")?;
    Ok(match current {
        Some(current) => DraftWrite::Stale { current },
        None => DraftWrite::NotFound,
    })
}

async fn delete_sqlite(pool: &SqlitePool, id: i64, version: Option<i64>) -> Result<bool> {
    let result = sqlx::query(DELETE_SQL)
        .bind(id)
        .bind(version)
        .bind(version)
        .execute(pool)
        .await
        .context("Failed to delete draft")?;
    Ok(result.rows_affected() > 0)
}

// ============================================================================
// MySQL implementations
// ============================================================================

fn row_to_draft_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Draft> {
    let content_type: String = row.try_get("content_type")?;
    let data: String = row.try_get("data")?;
    Ok(Draft {
        id: row.try_get("id")?,
        content_type: parse_kind(&content_type)?,
        original_id: row.try_get("original_id")?,
        data: parse_data(&data),
        version: row.try_get("version")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

async fn list_mysql(pool: &MySqlPool, kind: ContentKind) -> Result<Vec<Draft>> {
    let sql = format!(
        "SELECT {} FROM drafts WHERE content_type = ? ORDER BY updated_at DESC, id DESC",
        DRAFT_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(kind.as_str())
        .fetch_all(pool)
        .await
        .context("Failed to list drafts")?;

    rows.iter().map(row_to_draft_mysql).collect()
}

async fn get_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Draft>> {
    let sql = format!("SELECT {} FROM drafts WHERE id = ?", DRAFT_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get draft by ID")?;

    row.as_ref().map(row_to_draft_mysql).transpose()
}

async fn get_for_original_mysql(
    pool: &MySqlPool,
    kind: ContentKind,
    original_id: i64,
) -> Result<Option<Draft>> {
    let sql = format!(
        "SELECT {} FROM drafts WHERE content_type = ? AND original_id = ? ORDER BY id LIMIT 1",
        DRAFT_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(kind.as_str())
        .bind(original_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get draft for row")?;

    row.as_ref().map(row_to_draft_mysql).transpose()
}

async fn create_mysql(
    pool: &MySqlPool,
    kind: ContentKind,
    original_id: Option<i64>,
    data: &Value,
) -> Result<Option<Draft>> {
    let mut draft = Draft::new(kind, original_id, data.clone());

    let result = sqlx::query(INSERT_SQL)
        .bind(kind.as_str())
        .bind(original_id)
        .bind(data.to_string())
        .bind(draft.version)
        .bind(draft.created_at)
        .bind(draft.updated_at)
        .execute(pool)
        .await;
    let result = match result {
        Ok(result) => result,
        Err(e) if is_unique_violation(&e) => return Ok(None),
        Err(e) => return Err(e).context("Failed to create draft"),
    };

    draft.id = result.last_insert_id() as i64;
    Ok(Some(draft))
}

async fn update_mysql(
    pool: &MySqlPool,
    id: i64,
    data: &Value,
    expected_version: Option<i64>,
) -> Result<DraftWrite> {
    let mut tx = pool.begin().await?;

    let current: Option<i64> =
        sqlx::query_scalar("SELECT version FROM drafts WHERE id = ? FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .context("Failed to read draft version")?;
    let Some(current) = current else {
        return Ok(DraftWrite::NotFound);
    };
    if expected_version.is_some_and(|v| v != current) {
        return Ok(DraftWrite::Stale { current });
    }

    sqlx::query("UPDATE drafts SET data = ?, version = ?, updated_at = ? WHERE id = ?")
        .bind(data.to_string())
        .bind(current + 1)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to update draft")?;

    let sql = format!("SELECT {} FROM drafts WHERE id = ?", DRAFT_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to reload draft")?;
    let draft = row_to_draft_mysql(&row)?;
    tx.commit().await?;

    Ok(DraftWrite::Written(draft))
}

async fn delete_mysql(pool: &MySqlPool, id: i64, version: Option<i64>) -> Result<bool> {
    let result = sqlx::query(DELETE_SQL)
        .bind(id)
        .bind(version)
        .bind(version)
        .execute(pool)
        .await
        .context("Failed to delete draft")?;
    Ok(result.rows_affected() > 0)
}
