//! Content service
//!
//! Business logic shared by every content kind:
//! - Validation and normalization of submitted fields against the schema
//! - Create/update/delete with ordering kept dense
//! - Visibility flags, including singleton kinds (one active popup)
//! - Manual ordering (move one row, or replace a scope's order)
//! - Cached public read models, invalidated on every mutation

use crate::cache::{keys, CacheLayer, SharedCache};
use crate::db::repositories::{ContentRepository, ListFilter};
use crate::models::{
    ContentKind, ContentRecord, EntitySchema, FieldDef, FieldKind, Fields, ListingTarget,
    MoveDirection, MoveInput, OrderChange, ReorderInput,
};
use anyhow::Context;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// Columns the database owns; accepted in input and ignored
const READ_ONLY_FIELDS: [&str; 4] = ["id", "position", "created_at", "updated_at"];

/// Package field holding listing targets
const PUBLISH_TO_FIELD: &str = "publish_to";

/// Error types for content service operations
#[derive(Debug, thiserror::Error)]
pub enum ContentServiceError {
    /// Row not found
    #[error("{0}")]
    NotFound(String),

    /// Validation error
    #[error("{0}")]
    ValidationError(String),

    /// Conflicting concurrent change
    #[error("{0}")]
    Conflict(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl ContentServiceError {
    fn not_found(kind: ContentKind, id: i64) -> Self {
        Self::NotFound(format!("{} row {} not found", kind, id))
    }
}

/// Content service for every content kind
pub struct ContentService {
    repo: Arc<dyn ContentRepository>,
    cache: SharedCache,
}

impl ContentService {
    pub fn new(repo: Arc<dyn ContentRepository>, cache: SharedCache) -> Self {
        Self { repo, cache }
    }

    /// All rows of a kind, optionally restricted to one group
    pub async fn list(
        &self,
        kind: ContentKind,
        group: Option<String>,
    ) -> Result<Vec<ContentRecord>, ContentServiceError> {
        let filter = ListFilter {
            group,
            only_flagged: false,
        };
        self.repo
            .list(kind.schema(), &filter)
            .await
            .with_context(|| format!("Failed to list {}", kind))
            .map_err(Into::into)
    }

    /// Rows with the visibility flag set, for the public site
    pub async fn list_visible(
        &self,
        kind: ContentKind,
    ) -> Result<Vec<ContentRecord>, ContentServiceError> {
        let cache_key = keys::visible_content(kind);
        if let Ok(Some(cached)) = self.cache.get::<Vec<ContentRecord>>(&cache_key).await {
            return Ok(cached);
        }

        let filter = ListFilter {
            group: None,
            only_flagged: true,
        };
        let records = self
            .repo
            .list(kind.schema(), &filter)
            .await
            .with_context(|| format!("Failed to list visible {}", kind))?;

        if let Err(e) = self.cache.set(&cache_key, &records).await {
            tracing::warn!("Failed to cache {}: {}", cache_key, e);
        }
        Ok(records)
    }

    pub async fn get(
        &self,
        kind: ContentKind,
        id: i64,
    ) -> Result<ContentRecord, ContentServiceError> {
        self.repo
            .get_by_id(kind.schema(), id)
            .await
            .with_context(|| format!("Failed to get {} row {}", kind, id))?
            .ok_or_else(|| ContentServiceError::not_found(kind, id))
    }

    /// The row currently holding a singleton flag (the active popup)
    pub async fn active_singleton(
        &self,
        kind: ContentKind,
    ) -> Result<Option<ContentRecord>, ContentServiceError> {
        if !kind.schema().singleton_flag {
            return Err(ContentServiceError::ValidationError(format!(
                "{} has no single active row",
                kind
            )));
        }

        let cache_key = keys::active_popup();
        if let Ok(Some(cached)) = self.cache.get::<Option<ContentRecord>>(&cache_key).await {
            return Ok(cached);
        }

        let active = self.list_visible(kind).await?.into_iter().next();
        if let Err(e) = self.cache.set(&cache_key, &active).await {
            tracing::warn!("Failed to cache {}: {}", cache_key, e);
        }
        Ok(active)
    }

    pub async fn create(
        &self,
        kind: ContentKind,
        input: &Fields,
    ) -> Result<ContentRecord, ContentServiceError> {
        let schema = kind.schema();
        let fields = prepare_create(schema, input)?;

        let record = self
            .repo
            .create(schema, &fields)
            .await
            .with_context(|| format!("Failed to create {} row", kind))?;

        tracing::info!("Created {} row {}", kind, record.id);
        self.invalidate(kind).await;
        Ok(record)
    }

    /// Partial update: only supplied fields change
    pub async fn update(
        &self,
        kind: ContentKind,
        id: i64,
        input: &Fields,
    ) -> Result<ContentRecord, ContentServiceError> {
        let schema = kind.schema();
        let mut changes = prepare_update(schema, input)?;
        if blank_slug(schema, &changes) {
            let existing = self.get(kind, id).await?;
            fill_slug(schema, &mut changes, Some(existing.title(schema)));
        }

        let record = self
            .repo
            .update(schema, id, &changes)
            .await
            .with_context(|| format!("Failed to update {} row {}", kind, id))?
            .ok_or_else(|| ContentServiceError::not_found(kind, id))?;

        tracing::info!("Updated {} row {}", kind, id);
        self.invalidate(kind).await;
        Ok(record)
    }

    /// Delete a row together with its drafts and listings
    pub async fn delete(&self, kind: ContentKind, id: i64) -> Result<(), ContentServiceError> {
        let deleted = self
            .repo
            .delete(kind.schema(), id)
            .await
            .with_context(|| format!("Failed to delete {} row {}", kind, id))?;
        if !deleted {
            return Err(ContentServiceError::not_found(kind, id));
        }

        tracing::info!("Deleted {} row {}", kind, id);
        self.invalidate(kind).await;
        Ok(())
    }

    /// Flip the visibility flag
    pub async fn toggle(
        &self,
        kind: ContentKind,
        id: i64,
    ) -> Result<ContentRecord, ContentServiceError> {
        self.write_flag(kind, id, None).await
    }

    /// Set the visibility flag explicitly
    pub async fn set_flag(
        &self,
        kind: ContentKind,
        id: i64,
        value: bool,
    ) -> Result<ContentRecord, ContentServiceError> {
        self.write_flag(kind, id, Some(value)).await
    }

    async fn write_flag(
        &self,
        kind: ContentKind,
        id: i64,
        value: Option<bool>,
    ) -> Result<ContentRecord, ContentServiceError> {
        let schema = kind.schema();
        let record = self
            .repo
            .set_flag(schema, id, value)
            .await
            .with_context(|| format!("Failed to set {} on {} row {}", schema.flag_field, kind, id))?
            .ok_or_else(|| ContentServiceError::not_found(kind, id))?;

        tracing::info!(
            "Set {} = {} on {} row {}",
            schema.flag_field,
            record.flag(schema),
            kind,
            id
        );
        self.invalidate(kind).await;
        Ok(record)
    }

    /// Move one row within its scope; returns the scope in its new order
    pub async fn move_item(
        &self,
        kind: ContentKind,
        id: i64,
        input: &MoveInput,
    ) -> Result<Vec<ContentRecord>, ContentServiceError> {
        let record = self.get(kind, id).await?;
        let change = match input {
            MoveInput::Step {
                direction: MoveDirection::Up,
            } => OrderChange::MoveUp(id),
            MoveInput::Step {
                direction: MoveDirection::Down,
            } => OrderChange::MoveDown(id),
            MoveInput::To { to } => OrderChange::MoveTo(id, *to),
        };

        let group = record.group(kind.schema());
        self.apply_order(kind, &change, group).await
    }

    /// Replace the order of a whole scope
    pub async fn reorder(
        &self,
        kind: ContentKind,
        input: &ReorderInput,
    ) -> Result<Vec<ContentRecord>, ContentServiceError> {
        let schema = kind.schema();
        let group = match schema.group_field {
            None => None,
            Some(_) => match &input.group {
                Some(group) => Some(group.clone()),
                None => match input.ids.first() {
                    Some(&anchor) => self.get(kind, anchor).await?.group(schema),
                    None => {
                        return Err(ContentServiceError::ValidationError(format!(
                            "Reordering {} needs a group or at least one id",
                            kind
                        )))
                    }
                },
            },
        };

        self.apply_order(kind, &OrderChange::Replace(input.ids.clone()), group)
            .await
    }

    async fn apply_order(
        &self,
        kind: ContentKind,
        change: &OrderChange,
        group: Option<String>,
    ) -> Result<Vec<ContentRecord>, ContentServiceError> {
        let schema = kind.schema();
        self.repo
            .reorder(schema, change, group.as_deref())
            .await
            .with_context(|| format!("Failed to reorder {}", kind))?
            .map_err(|e| ContentServiceError::ValidationError(e.to_string()))?;

        tracing::info!("Reordered {} ({:?})", kind, change);
        self.invalidate(kind).await;
        self.list(kind, group).await
    }

    /// Insert already prepared rows in one transaction (CSV import)
    pub async fn insert_prepared(
        &self,
        kind: ContentKind,
        rows: &[Fields],
    ) -> Result<Vec<i64>, ContentServiceError> {
        let schema = kind.schema();
        let ids = self
            .repo
            .insert_batch(schema, rows)
            .await
            .with_context(|| format!("Failed to insert {} rows into {}", rows.len(), kind))?;

        self.invalidate(kind).await;
        Ok(ids)
    }

    /// Drop cached read models derived from a kind
    async fn invalidate(&self, kind: ContentKind) {
        let mut results = vec![self.cache.delete(&keys::visible_content(kind)).await];
        if kind.schema().singleton_flag {
            results.push(self.cache.delete(&keys::active_popup()).await);
        }
        if kind == ContentKind::Package {
            results.push(self.cache.delete_pattern(keys::ALL_LISTINGS).await);
        }

        for result in results {
            if let Err(e) = result {
                tracing::warn!("Failed to invalidate cache for {}: {}", kind, e);
            }
        }
    }
}

// ============================================================================
// Validation
// ============================================================================

fn validation(message: impl Into<String>) -> ContentServiceError {
    ContentServiceError::ValidationError(message.into())
}

fn check_known_fields(schema: &EntitySchema, input: &Fields) -> Result<(), ContentServiceError> {
    let unknown: Vec<&str> = input
        .keys()
        .map(String::as_str)
        .filter(|k| !schema.has_field(k) && !READ_ONLY_FIELDS.contains(k))
        .collect();
    if unknown.is_empty() {
        Ok(())
    } else {
        Err(validation(format!(
            "Unknown field(s) for {}: {}",
            schema.kind,
            unknown.join(", ")
        )))
    }
}

/// Check a value's JSON type against its field and normalize it.
///
/// Null becomes the field default. Lists are trimmed with empty entries
/// dropped; package listing targets are parsed and deduplicated.
fn normalize_value(
    schema: &EntitySchema,
    field: &FieldDef,
    value: &Value,
) -> Result<Value, ContentServiceError> {
    let wrong_type = |expected: &str| {
        validation(format!("Field '{}' must be {}", field.name, expected))
    };

    let normalized = match (field.kind, value) {
        (_, Value::Null) => field.default.to_value(),
        (FieldKind::Text, Value::String(_)) => value.clone(),
        (FieldKind::Text, _) => return Err(wrong_type("a string")),
        (FieldKind::Integer, Value::Number(n)) => match n.as_i64() {
            Some(i) => Value::from(i),
            None => match n.as_f64() {
                Some(f) if f.fract() == 0.0 => Value::from(f as i64),
                _ => return Err(wrong_type("a whole number")),
            },
        },
        (FieldKind::Integer, _) => return Err(wrong_type("a whole number")),
        (FieldKind::Number, Value::Number(n)) => {
            Value::from(n.as_f64().ok_or_else(|| wrong_type("a number"))?)
        }
        (FieldKind::Number, _) => return Err(wrong_type("a number")),
        (FieldKind::Boolean, Value::Bool(_)) => value.clone(),
        (FieldKind::Boolean, _) => return Err(wrong_type("true or false")),
        (FieldKind::List, Value::Array(items)) => {
            let mut entries = Vec::with_capacity(items.len());
            for item in items {
                let text = item.as_str().ok_or_else(|| wrong_type("a list of strings"))?;
                let text = text.trim();
                if !text.is_empty() {
                    entries.push(text.to_string());
                }
            }
            Value::from(entries)
        }
        (FieldKind::List, _) => return Err(wrong_type("a list of strings")),
        (FieldKind::Json, _) => value.clone(),
    };

    if schema.kind == ContentKind::Package && field.name == PUBLISH_TO_FIELD {
        return normalize_targets(&normalized);
    }
    Ok(normalized)
}

fn normalize_targets(value: &Value) -> Result<Value, ContentServiceError> {
    let mut seen = HashSet::new();
    let mut targets = Vec::new();
    for entry in value.as_array().into_iter().flatten().filter_map(Value::as_str) {
        let target: ListingTarget = entry
            .parse()
            .map_err(|_| validation(format!("Unknown listing target: {}", entry)))?;
        if seen.insert(target) {
            targets.push(target.as_str());
        }
    }
    Ok(Value::from(targets))
}

/// A required text field must be non-blank
fn check_required(field: &FieldDef, value: &Value) -> Result<(), ContentServiceError> {
    if !field.required {
        return Ok(());
    }
    let present = match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    };
    if present {
        Ok(())
    } else {
        Err(validation(format!("Field '{}' cannot be empty", field.name)))
    }
}

/// Validate a full row for insertion and fill defaults
pub fn prepare_create(schema: &EntitySchema, input: &Fields) -> Result<Fields, ContentServiceError> {
    check_known_fields(schema, input)?;

    let mut fields = Fields::new();
    for field in schema.fields {
        let value = match input.get(field.name) {
            Some(value) => normalize_value(schema, field, value)?,
            None => field.default.to_value(),
        };
        check_required(field, &value)?;
        fields.insert(field.name.to_string(), value);
    }

    let title = fields.get(schema.title_field).and_then(Value::as_str).map(str::to_string);
    fill_slug(schema, &mut fields, title.as_deref());
    Ok(fields)
}

/// Validate the supplied subset of a row for a partial update
pub fn prepare_update(schema: &EntitySchema, input: &Fields) -> Result<Fields, ContentServiceError> {
    check_known_fields(schema, input)?;

    let mut changes = Fields::new();
    for field in schema.fields {
        if let Some(value) = input.get(field.name) {
            let value = normalize_value(schema, field, value)?;
            check_required(field, &value)?;
            changes.insert(field.name.to_string(), value);
        }
    }

    if changes.contains_key("slug") {
        let title = changes.get(schema.title_field).and_then(Value::as_str).map(str::to_string);
        fill_slug(schema, &mut changes, title.as_deref());
    }
    Ok(changes)
}

/// Whether `fields` sets the slug to nothing
fn blank_slug(schema: &EntitySchema, fields: &Fields) -> bool {
    schema.has_field("slug")
        && fields
            .get("slug")
            .map_or(false, |v| v.as_str().map_or(true, |s| s.trim().is_empty()))
}

/// Derive an empty slug from the title
fn fill_slug(schema: &EntitySchema, fields: &mut Fields, title: Option<&str>) {
    if !schema.has_field("slug") {
        return;
    }
    let blank = fields
        .get("slug")
        .and_then(Value::as_str)
        .map_or(true, |s| s.trim().is_empty());
    if !blank {
        return;
    }
    if let Some(title) = title {
        let slug = generate_slug(title);
        if !slug.is_empty() {
            fields.insert("slug".to_string(), Value::String(slug));
        }
    }
}

/// Generate a URL slug: lowercase, runs of separators collapsed to `-`
pub fn generate_slug(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;

    for c in title.trim().to_lowercase().chars() {
        if c.is_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::repositories::{SqlxContentRepository, SqlxListingRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::services::package::PackageService;
    use proptest::prelude::*;
    use serde_json::json;

    async fn services() -> (ContentService, PackageService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let cache = Arc::new(MemoryCache::new());
        let packages = PackageService::new(SqlxListingRepository::boxed(pool.clone()), cache.clone());
        let content = ContentService::new(SqlxContentRepository::boxed(pool), cache);
        (content, packages)
    }

    async fn service() -> ContentService {
        services().await.0
    }

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn titles(records: &[ContentRecord], kind: ContentKind) -> Vec<String> {
        records
            .iter()
            .map(|r| r.title(kind.schema()).to_string())
            .collect()
    }

    #[test]
    fn test_generate_slug() {
        assert_eq!(generate_slug("10 Things to do in Bali!"), "10-things-to-do-in-bali");
        assert_eq!(generate_slug("  Kerala -- Backwaters  "), "kerala-backwaters");
        assert_eq!(generate_slug("!!!"), "");
    }

    #[test]
    fn test_prepare_create_fills_defaults() {
        let schema = ContentKind::Destination.schema();
        let prepared = prepare_create(schema, &fields(json!({"name": "Goa", "region": "India"}))).unwrap();

        assert_eq!(prepared["rating"], json!(5.0));
        assert_eq!(prepared["starting_price"], json!(0.0));
        assert_eq!(prepared["is_active"], json!(true));
        assert_eq!(prepared["images"], json!([]));
        assert_eq!(prepared["slug"], json!("goa"));
        assert_eq!(prepared["tagline"], Value::Null);
    }

    #[test]
    fn test_empty_title_rejected() {
        let schema = ContentKind::Banner.schema();
        let err = prepare_create(schema, &fields(json!({"title": "   ", "image_url": "a.jpg"}))).unwrap_err();
        assert!(matches!(err, ContentServiceError::ValidationError(m) if m.contains("title")));

        let err = prepare_update(schema, &fields(json!({"title": ""}))).unwrap_err();
        assert!(matches!(err, ContentServiceError::ValidationError(_)));
    }

    #[test]
    fn test_missing_required_field_rejected() {
        let schema = ContentKind::Banner.schema();
        let err = prepare_create(schema, &fields(json!({"title": "Sale"}))).unwrap_err();
        assert!(matches!(err, ContentServiceError::ValidationError(m) if m.contains("image_url")));
    }

    #[test]
    fn test_wrong_types_and_unknown_fields_rejected() {
        let schema = ContentKind::Offer.schema();
        for input in [
            json!({"title": "A", "discount_percent": "15"}),
            json!({"title": "A", "discount_percent": 1.5}),
            json!({"title": "A", "is_active": "yes"}),
            json!({"title": "A", "destinations": "Paris"}),
            json!({"title": "A", "destinations": [1, 2]}),
            json!({"title": 42}),
            json!({"title": "A", "colour": "red"}),
        ] {
            let result = prepare_create(schema, &fields(input.clone()));
            assert!(
                matches!(result, Err(ContentServiceError::ValidationError(_))),
                "accepted {}",
                input
            );
        }
    }

    #[test]
    fn test_read_only_fields_are_ignored() {
        let schema = ContentKind::Partner.schema();
        let changes = prepare_update(
            schema,
            &fields(json!({"id": 9, "position": 3, "name": "Skyways", "created_at": "x"})),
        )
        .unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes["name"], "Skyways");
    }

    #[test]
    fn test_lists_trimmed_and_targets_normalized() {
        let schema = ContentKind::Package.schema();
        let prepared = prepare_create(
            schema,
            &fields(json!({
                "title": "Kerala",
                "destination": "Kerala",
                "includes": [" Hotel ", "", "Breakfast"],
                "publish_to": ["Featured", "group_tours", "featured"],
            })),
        )
        .unwrap();
        assert_eq!(prepared["includes"], json!(["Hotel", "Breakfast"]));
        assert_eq!(prepared["publish_to"], json!(["featured", "group-tours"]));

        let err = prepare_create(
            schema,
            &fields(json!({"title": "K", "destination": "K", "publish_to": ["bestsellers"]})),
        )
        .unwrap_err();
        assert!(matches!(err, ContentServiceError::ValidationError(m) if m.contains("bestsellers")));
    }

    #[tokio::test]
    async fn test_create_update_delete_flow() {
        let service = service().await;
        let kind = ContentKind::Offer;

        let created = service
            .create(kind, &fields(json!({"title": "Early bird", "discount_percent": 15})))
            .await
            .unwrap();
        assert_eq!(created.fields["discount_percent"], json!(15));

        let updated = service
            .update(kind, created.id, &fields(json!({"terms": "Non refundable"})))
            .await
            .unwrap();
        assert_eq!(updated.text("title"), Some("Early bird"));
        assert_eq!(updated.text("terms"), Some("Non refundable"));

        service.delete(kind, created.id).await.unwrap();
        assert!(matches!(
            service.get(kind, created.id).await,
            Err(ContentServiceError::NotFound(_))
        ));
        assert!(matches!(
            service.delete(kind, created.id).await,
            Err(ContentServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_visible_list_is_invalidated_on_toggle() {
        let service = service().await;
        let kind = ContentKind::Partner;
        let a = service.create(kind, &fields(json!({"name": "A"}))).await.unwrap();
        service.create(kind, &fields(json!({"name": "B"}))).await.unwrap();

        assert_eq!(service.list_visible(kind).await.unwrap().len(), 2);
        service.toggle(kind, a.id).await.unwrap();
        assert_eq!(titles(&service.list_visible(kind).await.unwrap(), kind), vec!["B"]);

        service.set_flag(kind, a.id, true).await.unwrap();
        assert_eq!(service.list_visible(kind).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_activating_popup_leaves_exactly_one() {
        let service = service().await;
        let kind = ContentKind::Popup;
        let first = service
            .create(kind, &fields(json!({"title": "First", "is_active": true})))
            .await
            .unwrap();
        let second = service
            .create(kind, &fields(json!({"title": "Second"})))
            .await
            .unwrap();
        assert!(!second.flag(kind.schema()));
        assert_eq!(service.active_singleton(kind).await.unwrap().map(|p| p.id), Some(first.id));

        service.set_flag(kind, second.id, true).await.unwrap();
        assert_eq!(service.list_visible(kind).await.unwrap().len(), 1);
        assert_eq!(service.active_singleton(kind).await.unwrap().map(|p| p.id), Some(second.id));

        service.toggle(kind, second.id).await.unwrap();
        assert!(service.active_singleton(kind).await.unwrap().is_none());

        assert!(matches!(
            service.active_singleton(ContentKind::Banner).await,
            Err(ContentServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_move_and_reorder() {
        let service = service().await;
        let kind = ContentKind::Banner;
        let mut ids = Vec::new();
        for title in ["A", "B", "C"] {
            let created = service
                .create(kind, &fields(json!({"title": title, "image_url": "x.jpg"})))
                .await
                .unwrap();
            ids.push(created.id);
        }

        let moved = service
            .move_item(kind, ids[0], &MoveInput::Step { direction: MoveDirection::Down })
            .await
            .unwrap();
        assert_eq!(titles(&moved, kind), vec!["B", "A", "C"]);
        let positions: Vec<i32> = moved.iter().map(|r| r.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);

        let edge = service
            .move_item(kind, ids[2], &MoveInput::Step { direction: MoveDirection::Down })
            .await
            .unwrap();
        assert_eq!(titles(&edge, kind), vec!["B", "A", "C"]);

        let reordered = service
            .reorder(kind, &ReorderInput { ids: vec![ids[2], ids[1], ids[0]], group: None })
            .await
            .unwrap();
        assert_eq!(titles(&reordered, kind), vec!["C", "B", "A"]);

        let rejected = service
            .reorder(kind, &ReorderInput { ids: vec![ids[2], ids[1]], group: None })
            .await;
        assert!(matches!(rejected, Err(ContentServiceError::ValidationError(_))));
        assert_eq!(titles(&service.list(kind, None).await.unwrap(), kind), vec!["C", "B", "A"]);

        assert!(matches!(
            service.move_item(kind, 999, &MoveInput::To { to: 0 }).await,
            Err(ContentServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reorder_grouped_kind_stays_in_region() {
        let service = service().await;
        let kind = ContentKind::Destination;
        let goa = service
            .create(kind, &fields(json!({"name": "Goa", "region": "India"})))
            .await
            .unwrap();
        service
            .create(kind, &fields(json!({"name": "Bali", "region": "Asia"})))
            .await
            .unwrap();
        let kerala = service
            .create(kind, &fields(json!({"name": "Kerala", "region": "India"})))
            .await
            .unwrap();

        let india = service
            .reorder(kind, &ReorderInput { ids: vec![kerala.id, goa.id], group: None })
            .await
            .unwrap();
        assert_eq!(titles(&india, kind), vec!["Kerala", "Goa"]);

        let all = service.list(kind, None).await.unwrap();
        assert_eq!(titles(&all, kind), vec!["Bali", "Kerala", "Goa"]);
    }

    #[tokio::test]
    async fn test_package_publication_mirrors_publish_to() {
        let (service, packages) = services().await;
        let kind = ContentKind::Package;
        let package = service
            .create(
                kind,
                &fields(json!({
                    "title": "Magical Kerala",
                    "destination": "Kerala",
                    "publish_to": ["featured", "honeymoon"],
                })),
            )
            .await
            .unwrap();
        assert_eq!(
            packages.targets_for(package.id).await.unwrap(),
            vec![ListingTarget::Featured, ListingTarget::Honeymoon]
        );

        service
            .update(kind, package.id, &fields(json!({"publish_to": ["trending"]})))
            .await
            .unwrap();
        assert_eq!(
            packages.targets_for(package.id).await.unwrap(),
            vec![ListingTarget::Trending]
        );

        let trending = packages.list_listing(ListingTarget::Trending).await.unwrap();
        assert_eq!(trending.len(), 1);

        service.toggle(kind, package.id).await.unwrap();
        assert!(packages.targets_for(package.id).await.unwrap().is_empty());
        // Shared cache was invalidated by the write
        assert!(packages.list_listing(ListingTarget::Trending).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_slug_update_derives_from_stored_title() {
        let service = service().await;
        let kind = ContentKind::Destination;
        let goa = service
            .create(kind, &fields(json!({"name": "Goa", "region": "India", "slug": "goa-beaches"})))
            .await
            .unwrap();
        assert_eq!(goa.text("slug"), Some("goa-beaches"));

        let reset = service
            .update(kind, goa.id, &fields(json!({"slug": ""})))
            .await
            .unwrap();
        assert_eq!(reset.text("slug"), Some("goa"));

        let renamed = service
            .update(kind, goa.id, &fields(json!({"slug": " ", "name": "North Goa"})))
            .await
            .unwrap();
        assert_eq!(renamed.text("slug"), Some("north-goa"));

        assert!(matches!(
            service.update(kind, 999, &fields(json!({"slug": ""}))).await,
            Err(ContentServiceError::NotFound(_))
        ));
    }

    proptest! {
        #[test]
        fn slug_has_no_edge_or_double_hyphens(title in "[ A-Za-z0-9!?_-]{0,40}") {
            let slug = generate_slug(&title);
            prop_assert!(!slug.starts_with('-'));
            prop_assert!(!slug.ends_with('-'));
            prop_assert!(!slug.contains("--"));
            prop_assert!(slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        }
    }
}
