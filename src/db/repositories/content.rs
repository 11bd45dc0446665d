//! Content repository
//!
//! Schema-driven data access for every content table. Queries are built
//! from an [`EntitySchema`] instead of being written per table; the SQL is
//! shared by both backends (both use `?` placeholders), and the per-backend
//! bodies are generated from one template by `content_backend!`.
//!
//! Every mutation that touches more than one row runs in one transaction:
//! appends, scope compaction after delete or regrouping, reorders,
//! clearing a singleton flag, and a package's listing summaries.

use crate::db::DynDatabasePool;
use crate::models::{
    position_updates, ContentKind, ContentRecord, EntitySchema, FieldDef, FieldKind, Fields,
    OrderChange, OrderError, PackageListing,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::Row;
use std::sync::Arc;

/// Row selection for [`ContentRepository::list`]
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    /// Restrict to one ordering scope (destination region)
    pub group: Option<String>,
    /// Only rows with the visibility flag set
    pub only_flagged: bool,
}

/// Content repository trait
#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// List rows ordered by `(group, position, id)`
    async fn list(&self, schema: &EntitySchema, filter: &ListFilter) -> Result<Vec<ContentRecord>>;

    /// Get a row by ID
    async fn get_by_id(&self, schema: &EntitySchema, id: i64) -> Result<Option<ContentRecord>>;

    /// Insert a fully populated row at the end of its scope. Package rows
    /// get their listing summaries in the same transaction, as do the
    /// other writes below.
    async fn create(&self, schema: &EntitySchema, fields: &Fields) -> Result<ContentRecord>;

    /// Apply a partial update. Returns `None` if the row doesn't exist.
    async fn update(
        &self,
        schema: &EntitySchema,
        id: i64,
        changes: &Fields,
    ) -> Result<Option<ContentRecord>>;

    /// Delete a row, its drafts and (packages) its listings, then compact
    /// the remaining positions of its scope
    async fn delete(&self, schema: &EntitySchema, id: i64) -> Result<bool>;

    /// Set the visibility flag, or flip it when `value` is `None`
    async fn set_flag(
        &self,
        schema: &EntitySchema,
        id: i64,
        value: Option<bool>,
    ) -> Result<Option<ContentRecord>>;

    /// Rewrite the positions of one scope. The outer error is a database
    /// failure, the inner one a rejected order.
    async fn reorder(
        &self,
        schema: &EntitySchema,
        change: &OrderChange,
        group: Option<&str>,
    ) -> Result<Result<Vec<i64>, OrderError>>;

    /// Insert many rows in one transaction, appended in order
    async fn insert_batch(&self, schema: &EntitySchema, rows: &[Fields]) -> Result<Vec<i64>>;
}

/// SQLx-based content repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxContentRepository {
    pool: DynDatabasePool,
}

impl SqlxContentRepository {
    /// Create a new SQLx content repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ContentRepository> {
        Arc::new(Self::new(pool))
    }
}

macro_rules! dispatch {
    ($pool:expr, $func:ident($($arg:expr),*)) => {
        match ($pool.as_sqlite(), $pool.as_mysql()) {
            (Some(p), _) => sqlite::$func(p, $($arg),*).await,
            (_, Some(p)) => mysql::$func(p, $($arg),*).await,
            _ => anyhow::bail!("Database pool exposes no backend"),
        }
    };
}

#[async_trait]
impl ContentRepository for SqlxContentRepository {
    async fn list(&self, schema: &EntitySchema, filter: &ListFilter) -> Result<Vec<ContentRecord>> {
        dispatch!(self.pool, list(schema, filter))
    }

    async fn get_by_id(&self, schema: &EntitySchema, id: i64) -> Result<Option<ContentRecord>> {
        dispatch!(self.pool, fetch_by_id(schema, id))
    }

    async fn create(&self, schema: &EntitySchema, fields: &Fields) -> Result<ContentRecord> {
        dispatch!(self.pool, create(schema, fields))
    }

    async fn update(
        &self,
        schema: &EntitySchema,
        id: i64,
        changes: &Fields,
    ) -> Result<Option<ContentRecord>> {
        dispatch!(self.pool, update(schema, id, changes))
    }

    async fn delete(&self, schema: &EntitySchema, id: i64) -> Result<bool> {
        dispatch!(self.pool, delete(schema, id))
    }

    async fn set_flag(
        &self,
        schema: &EntitySchema,
        id: i64,
        value: Option<bool>,
    ) -> Result<Option<ContentRecord>> {
        dispatch!(self.pool, set_flag(schema, id, value))
    }

    async fn reorder(
        &self,
        schema: &EntitySchema,
        change: &OrderChange,
        group: Option<&str>,
    ) -> Result<Result<Vec<i64>, OrderError>> {
        dispatch!(self.pool, reorder(schema, change, group))
    }

    async fn insert_batch(&self, schema: &EntitySchema, rows: &[Fields]) -> Result<Vec<i64>> {
        dispatch!(self.pool, insert_batch(schema, rows))
    }
}

// ============================================================================
// Value conversion and SQL building
// ============================================================================

/// A bindable column value
#[derive(Debug, Clone, PartialEq)]
enum SqlValue {
    Null,
    Text(String),
    Integer(i64),
    Number(f64),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
}

macro_rules! bind_value {
    ($query:ident, $value:expr) => {
        match $value {
            SqlValue::Null => $query.bind(None::<String>),
            SqlValue::Text(v) => $query.bind(v),
            SqlValue::Integer(v) => $query.bind(v),
            SqlValue::Number(v) => $query.bind(v),
            SqlValue::Boolean(v) => $query.bind(v),
            SqlValue::Timestamp(v) => $query.bind(v),
        }
    };
}

/// Convert a JSON field value to its column representation.
///
/// Values are expected to be validated already; anything that still
/// doesn't fit the column is stored as text rather than dropped.
fn to_sql_value(field: &FieldDef, value: Option<&Value>) -> SqlValue {
    let value = match value {
        None | Some(Value::Null) => {
            return match field.kind {
                FieldKind::List => SqlValue::Text("[]".to_string()),
                _ => SqlValue::Null,
            }
        }
        Some(v) => v,
    };

    match field.kind {
        FieldKind::Text => match value {
            Value::String(s) => SqlValue::Text(s.clone()),
            other => SqlValue::Text(other.to_string()),
        },
        FieldKind::Integer => value
            .as_i64()
            .or_else(|| value.as_f64().map(|f| f as i64))
            .map(SqlValue::Integer)
            .unwrap_or(SqlValue::Null),
        FieldKind::Number => value.as_f64().map(SqlValue::Number).unwrap_or(SqlValue::Null),
        FieldKind::Boolean => value.as_bool().map(SqlValue::Boolean).unwrap_or(SqlValue::Null),
        FieldKind::List | FieldKind::Json => SqlValue::Text(value.to_string()),
    }
}

/// Decode a JSON text column. Lists fall back to `[]`, JSON to null.
fn from_json_text(field: &FieldDef, raw: Option<String>) -> Value {
    let parsed = raw
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .and_then(|s| serde_json::from_str::<Value>(s).ok());

    match field.kind {
        FieldKind::List => match parsed {
            Some(Value::Array(items)) => Value::Array(items),
            _ => Value::Array(Vec::new()),
        },
        _ => parsed.unwrap_or(Value::Null),
    }
}

/// WHERE clause restricting to one ordering scope
fn scope_clause(schema: &EntitySchema, group: Option<&str>) -> (String, Vec<SqlValue>) {
    match (schema.group_field, group) {
        (Some(column), Some(value)) => (
            format!(" WHERE {} = ?", column),
            vec![SqlValue::Text(value.to_string())],
        ),
        _ => (String::new(), Vec::new()),
    }
}

fn list_query(schema: &EntitySchema, filter: &ListFilter) -> (String, Vec<SqlValue>) {
    let mut conditions = Vec::new();
    let mut binds = Vec::new();

    if let (Some(column), Some(group)) = (schema.group_field, filter.group.as_ref()) {
        conditions.push(format!("{} = ?", column));
        binds.push(SqlValue::Text(group.clone()));
    }
    if filter.only_flagged {
        conditions.push(format!("{} = ?", schema.flag_field));
        binds.push(SqlValue::Boolean(true));
    }

    let mut sql = format!("SELECT {} FROM {}", schema.select_list(), schema.table);
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    match schema.group_field {
        Some(column) if filter.group.is_none() => {
            sql.push_str(&format!(" ORDER BY {}, position, id", column))
        }
        _ => sql.push_str(" ORDER BY position, id"),
    }

    (sql, binds)
}

fn insert_query(
    schema: &EntitySchema,
    position: i32,
    fields: &Fields,
    now: DateTime<Utc>,
) -> (String, Vec<SqlValue>) {
    let mut columns = vec!["position"];
    let mut binds = vec![SqlValue::Integer(i64::from(position))];

    for field in schema.fields {
        columns.push(field.name);
        binds.push(to_sql_value(field, fields.get(field.name)));
    }
    columns.extend(["created_at", "updated_at"]);
    binds.extend([SqlValue::Timestamp(now), SqlValue::Timestamp(now)]);

    let placeholders = vec!["?"; columns.len()].join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        schema.table,
        columns.join(", "),
        placeholders
    );
    (sql, binds)
}

/// SET assignments for a partial update; unknown keys are ignored
fn update_assignments(schema: &EntitySchema, changes: &Fields) -> (Vec<String>, Vec<SqlValue>) {
    let mut assignments = Vec::new();
    let mut binds = Vec::new();

    for field in schema.fields {
        if let Some(value) = changes.get(field.name) {
            assignments.push(format!("{} = ?", field.name));
            binds.push(to_sql_value(field, Some(value)));
        }
    }

    (assignments, binds)
}

/// Whether a write turns the flag on
fn sets_flag(schema: &EntitySchema, fields: &Fields) -> bool {
    fields
        .get(schema.flag_field)
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Fill the publish stamp on insert when the row is created published
fn stamp_on_insert(schema: &EntitySchema, fields: &Fields, now: DateTime<Utc>) -> Option<Fields> {
    let stamp = schema.publish_stamp?;
    let empty = fields
        .get(stamp)
        .and_then(Value::as_str)
        .map_or(true, |s| s.trim().is_empty());
    if !(sets_flag(schema, fields) && empty) {
        return None;
    }
    let mut stamped = fields.clone();
    stamped.insert(stamp.to_string(), Value::String(now.to_rfc3339()));
    Some(stamped)
}

// ============================================================================
// Backend implementations
// ============================================================================

macro_rules! content_backend {
    ($module:ident, $db:ty, $pool:ty, $row:ty, |$done:ident| $last_id:expr) => {
        mod $module {
            use super::*;

            fn decode_row(schema: &EntitySchema, row: &$row) -> Result<ContentRecord> {
                let mut fields = Fields::new();
                for field in schema.fields {
                    let name = field.name;
                    let value = match field.kind {
                        FieldKind::Text => row
                            .try_get::<Option<String>, _>(name)?
                            .map(Value::String)
                            .unwrap_or(Value::Null),
                        FieldKind::Integer => row
                            .try_get::<Option<i64>, _>(name)?
                            .map(Value::from)
                            .unwrap_or(Value::Null),
                        FieldKind::Number => row
                            .try_get::<Option<f64>, _>(name)?
                            .map(Value::from)
                            .unwrap_or(Value::Null),
                        FieldKind::Boolean => row
                            .try_get::<Option<bool>, _>(name)?
                            .map(Value::Bool)
                            .unwrap_or(Value::Null),
                        FieldKind::List | FieldKind::Json => {
                            from_json_text(field, row.try_get::<Option<String>, _>(name)?)
                        }
                    };
                    fields.insert(name.to_string(), value);
                }

                Ok(ContentRecord {
                    id: row.try_get("id")?,
                    position: row.try_get("position")?,
                    fields,
                    created_at: row.try_get("created_at")?,
                    updated_at: row.try_get("updated_at")?,
                })
            }

            async fn execute<'e, E>(executor: E, sql: &str, binds: Vec<SqlValue>) -> Result<u64>
            where
                E: sqlx::Executor<'e, Database = $db>,
            {
                let mut query = sqlx::query(sql);
                for value in binds {
                    query = bind_value!(query, value);
                }
                let result = query
                    .execute(executor)
                    .await
                    .with_context(|| format!("Failed to execute: {}", sql))?;
                Ok(result.rows_affected())
            }

            pub(super) async fn list(
                pool: &$pool,
                schema: &EntitySchema,
                filter: &ListFilter,
            ) -> Result<Vec<ContentRecord>> {
                let (sql, binds) = list_query(schema, filter);
                let mut query = sqlx::query(&sql);
                for value in binds {
                    query = bind_value!(query, value);
                }
                let rows = query
                    .fetch_all(pool)
                    .await
                    .with_context(|| format!("Failed to list {}", schema.table))?;

                rows.iter().map(|row| decode_row(schema, row)).collect()
            }

            pub(super) async fn fetch_by_id<'e, E>(
                executor: E,
                schema: &EntitySchema,
                id: i64,
            ) -> Result<Option<ContentRecord>>
            where
                E: sqlx::Executor<'e, Database = $db>,
            {
                let sql = format!(
                    "SELECT {} FROM {} WHERE id = ?",
                    schema.select_list(),
                    schema.table
                );
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(executor)
                    .await
                    .with_context(|| format!("Failed to get {} row {}", schema.table, id))?;

                row.map(|r| decode_row(schema, &r)).transpose()
            }

            async fn next_position<'e, E>(
                executor: E,
                schema: &EntitySchema,
                group: Option<&str>,
            ) -> Result<i32>
            where
                E: sqlx::Executor<'e, Database = $db>,
            {
                let (clause, binds) = scope_clause(schema, group);
                let sql = format!(
                    "SELECT COALESCE(MAX(position), -1) + 1 FROM {}{}",
                    schema.table, clause
                );
                let mut query = sqlx::query(&sql);
                for value in binds {
                    query = bind_value!(query, value);
                }
                let row = query
                    .fetch_one(executor)
                    .await
                    .with_context(|| format!("Failed to read next position in {}", schema.table))?;
                let next: i64 = row.try_get(0)?;
                Ok(next as i32)
            }

            async fn scope_positions<'e, E>(
                executor: E,
                schema: &EntitySchema,
                group: Option<&str>,
            ) -> Result<Vec<(i64, i32)>>
            where
                E: sqlx::Executor<'e, Database = $db>,
            {
                let (clause, binds) = scope_clause(schema, group);
                let sql = format!(
                    "SELECT id, position FROM {}{} ORDER BY position, id",
                    schema.table, clause
                );
                let mut query = sqlx::query(&sql);
                for value in binds {
                    query = bind_value!(query, value);
                }
                let rows = query
                    .fetch_all(executor)
                    .await
                    .with_context(|| format!("Failed to read positions of {}", schema.table))?;

                rows.iter()
                    .map(|row| Ok((row.try_get("id")?, row.try_get("position")?)))
                    .collect()
            }

            async fn write_positions(
                tx: &mut sqlx::Transaction<'_, $db>,
                schema: &EntitySchema,
                updates: &[(i64, i32)],
            ) -> Result<()> {
                let sql = format!("UPDATE {} SET position = ? WHERE id = ?", schema.table);
                for &(id, position) in updates {
                    sqlx::query(&sql)
                        .bind(position)
                        .bind(id)
                        .execute(&mut **tx)
                        .await
                        .with_context(|| format!("Failed to move {} row {}", schema.table, id))?;
                }
                Ok(())
            }

            /// Renumber a scope to `0..n`, keeping its current order
            async fn compact_scope(
                tx: &mut sqlx::Transaction<'_, $db>,
                schema: &EntitySchema,
                group: Option<&str>,
            ) -> Result<()> {
                let current = scope_positions(&mut **tx, schema, group).await?;
                let order: Vec<i64> = current.iter().map(|(id, _)| *id).collect();
                write_positions(tx, schema, &position_updates(&current, &order)).await
            }

            async fn clear_flag_except(
                tx: &mut sqlx::Transaction<'_, $db>,
                schema: &EntitySchema,
                keep: Option<i64>,
                now: DateTime<Utc>,
            ) -> Result<()> {
                let flag = schema.flag_field;
                let mut sql = format!(
                    "UPDATE {} SET {} = ?, updated_at = ? WHERE {} = ?",
                    schema.table, flag, flag
                );
                let mut binds = vec![
                    SqlValue::Boolean(false),
                    SqlValue::Timestamp(now),
                    SqlValue::Boolean(true),
                ];
                if let Some(id) = keep {
                    sql.push_str(" AND id <> ?");
                    binds.push(SqlValue::Integer(id));
                }
                execute(&mut **tx, &sql, binds).await?;
                Ok(())
            }

            /// Mirror a package row into its listings
            async fn publish_listings(
                tx: &mut sqlx::Transaction<'_, $db>,
                schema: &EntitySchema,
                record: &ContentRecord,
            ) -> Result<()> {
                if schema.kind != ContentKind::Package {
                    return Ok(());
                }
                let listings = PackageListing::for_package(record);
                crate::db::repositories::listing::$module::replace_in_tx(tx, record.id, &listings)
                    .await
                    .with_context(|| format!("Failed to sync listings of package {}", record.id))
            }

            async fn insert_row(
                tx: &mut sqlx::Transaction<'_, $db>,
                schema: &EntitySchema,
                fields: &Fields,
                now: DateTime<Utc>,
            ) -> Result<i64> {
                let stamped = stamp_on_insert(schema, fields, now);
                let fields = stamped.as_ref().unwrap_or(fields);

                if schema.singleton_flag && sets_flag(schema, fields) {
                    clear_flag_except(tx, schema, None, now).await?;
                }

                let group = schema
                    .group_field
                    .map(|g| fields.get(g).and_then(Value::as_str).unwrap_or_default());
                let position = next_position(&mut **tx, schema, group).await?;

                let (sql, binds) = insert_query(schema, position, fields, now);
                let mut query = sqlx::query(&sql);
                for value in binds {
                    query = bind_value!(query, value);
                }
                let $done = query
                    .execute(&mut **tx)
                    .await
                    .with_context(|| format!("Failed to insert into {}", schema.table))?;
                Ok($last_id)
            }

            pub(super) async fn create(
                pool: &$pool,
                schema: &EntitySchema,
                fields: &Fields,
            ) -> Result<ContentRecord> {
                let now = Utc::now();
                let mut tx = pool.begin().await?;
                let id = insert_row(&mut tx, schema, fields, now).await?;
                let record = fetch_by_id(&mut *tx, schema, id)
                    .await?
                    .with_context(|| format!("Inserted {} row {} not found", schema.table, id))?;
                publish_listings(&mut tx, schema, &record).await?;
                tx.commit().await?;
                Ok(record)
            }

            pub(super) async fn insert_batch(
                pool: &$pool,
                schema: &EntitySchema,
                rows: &[Fields],
            ) -> Result<Vec<i64>> {
                let now = Utc::now();
                let mut tx = pool.begin().await?;
                let mut ids = Vec::with_capacity(rows.len());
                for fields in rows {
                    let id = insert_row(&mut tx, schema, fields, now).await?;
                    if schema.kind == ContentKind::Package {
                        let record = fetch_by_id(&mut *tx, schema, id).await?.with_context(|| {
                            format!("Inserted {} row {} not found", schema.table, id)
                        })?;
                        publish_listings(&mut tx, schema, &record).await?;
                    }
                    ids.push(id);
                }
                tx.commit().await?;
                Ok(ids)
            }

            pub(super) async fn update(
                pool: &$pool,
                schema: &EntitySchema,
                id: i64,
                changes: &Fields,
            ) -> Result<Option<ContentRecord>> {
                let now = Utc::now();
                let mut tx = pool.begin().await?;
                let Some(existing) = fetch_by_id(&mut *tx, schema, id).await? else {
                    return Ok(None);
                };

                let (mut assignments, mut binds) = update_assignments(schema, changes);

                let old_group = existing.group(schema);
                let new_group = schema.group_field.and_then(|g| {
                    changes.get(g).and_then(Value::as_str).map(str::to_string)
                });
                let regrouped = match (&old_group, &new_group) {
                    (Some(old), Some(new)) => old != new,
                    _ => false,
                };
                if regrouped {
                    let position = next_position(&mut *tx, schema, new_group.as_deref()).await?;
                    assignments.push("position = ?".to_string());
                    binds.push(SqlValue::Integer(i64::from(position)));
                }

                let activating = sets_flag(schema, changes);
                if let Some(stamp) = schema.publish_stamp {
                    let supplied = changes
                        .get(stamp)
                        .and_then(Value::as_str)
                        .is_some_and(|s| !s.trim().is_empty());
                    if activating && !supplied {
                        assignments.push(format!("{stamp} = COALESCE(NULLIF({stamp}, ''), ?)"));
                        binds.push(SqlValue::Text(now.to_rfc3339()));
                    }
                }
                if schema.singleton_flag && activating {
                    clear_flag_except(&mut tx, schema, Some(id), now).await?;
                }

                assignments.push("updated_at = ?".to_string());
                binds.push(SqlValue::Timestamp(now));
                binds.push(SqlValue::Integer(id));
                let sql = format!(
                    "UPDATE {} SET {} WHERE id = ?",
                    schema.table,
                    assignments.join(", ")
                );
                execute(&mut *tx, &sql, binds).await?;

                if regrouped {
                    compact_scope(&mut tx, schema, old_group.as_deref()).await?;
                }

                let record = fetch_by_id(&mut *tx, schema, id).await?;
                if let Some(record) = &record {
                    publish_listings(&mut tx, schema, record).await?;
                }
                tx.commit().await?;
                Ok(record)
            }

            pub(super) async fn delete(
                pool: &$pool,
                schema: &EntitySchema,
                id: i64,
            ) -> Result<bool> {
                let mut tx = pool.begin().await?;
                let Some(existing) = fetch_by_id(&mut *tx, schema, id).await? else {
                    return Ok(false);
                };

                sqlx::query("DELETE FROM drafts WHERE content_type = ? AND original_id = ?")
                    .bind(schema.kind.as_str())
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to delete drafts of removed row")?;

                if schema.kind == ContentKind::Package {
                    sqlx::query("DELETE FROM package_listings WHERE package_id = ?")
                        .bind(id)
                        .execute(&mut *tx)
                        .await
                        .context("Failed to delete package listings")?;
                }

                let sql = format!("DELETE FROM {} WHERE id = ?", schema.table);
                sqlx::query(&sql)
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .with_context(|| format!("Failed to delete {} row {}", schema.table, id))?;

                compact_scope(&mut tx, schema, existing.group(schema).as_deref()).await?;
                tx.commit().await?;
                Ok(true)
            }

            pub(super) async fn set_flag(
                pool: &$pool,
                schema: &EntitySchema,
                id: i64,
                value: Option<bool>,
            ) -> Result<Option<ContentRecord>> {
                let now = Utc::now();
                let mut tx = pool.begin().await?;
                let Some(existing) = fetch_by_id(&mut *tx, schema, id).await? else {
                    return Ok(None);
                };
                let value = value.unwrap_or(!existing.flag(schema));

                if schema.singleton_flag && value {
                    clear_flag_except(&mut tx, schema, Some(id), now).await?;
                }

                let flag = schema.flag_field;
                let mut assignments = vec![format!("{} = ?", flag)];
                let mut binds = vec![SqlValue::Boolean(value)];
                if let (Some(stamp), true) = (schema.publish_stamp, value) {
                    assignments.push(format!("{stamp} = COALESCE(NULLIF({stamp}, ''), ?)"));
                    binds.push(SqlValue::Text(now.to_rfc3339()));
                }
                assignments.push("updated_at = ?".to_string());
                binds.push(SqlValue::Timestamp(now));
                binds.push(SqlValue::Integer(id));

                let sql = format!(
                    "UPDATE {} SET {} WHERE id = ?",
                    schema.table,
                    assignments.join(", ")
                );
                execute(&mut *tx, &sql, binds).await?;

                let record = fetch_by_id(&mut *tx, schema, id).await?;
                if let Some(record) = &record {
                    publish_listings(&mut tx, schema, record).await?;
                }
                tx.commit().await?;
                Ok(record)
            }

            pub(super) async fn reorder(
                pool: &$pool,
                schema: &EntitySchema,
                change: &OrderChange,
                group: Option<&str>,
            ) -> Result<Result<Vec<i64>, OrderError>> {
                let mut tx = pool.begin().await?;

                let scope = match (schema.group_field, group) {
                    (None, _) => None,
                    (Some(_), Some(group)) => Some(group.to_string()),
                    (Some(_), None) => {
                        let Some(anchor) = change.anchor() else {
                            return Ok(Err(OrderError::NotAPermutation));
                        };
                        match fetch_by_id(&mut *tx, schema, anchor).await? {
                            Some(record) => record.group(schema),
                            None => return Ok(Err(OrderError::UnknownId(anchor))),
                        }
                    }
                };

                let current = scope_positions(&mut *tx, schema, scope.as_deref()).await?;
                let ids: Vec<i64> = current.iter().map(|(id, _)| *id).collect();
                let order = match change.apply(&ids) {
                    Ok(order) => order,
                    Err(e) => return Ok(Err(e)),
                };

                write_positions(&mut tx, schema, &position_updates(&current, &order)).await?;
                tx.commit().await?;
                Ok(Ok(order))
            }
        }
    };
}

content_backend!(
    sqlite,
    sqlx::Sqlite,
    sqlx::SqlitePool,
    sqlx::sqlite::SqliteRow,
    |done| done.last_insert_rowid()
);

content_backend!(
    mysql,
    sqlx::MySql,
    sqlx::MySqlPool,
    sqlx::mysql::MySqlRow,
    |done| done.last_insert_id() as i64
);
