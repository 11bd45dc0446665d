//! Draft service
//!
//! Drafts stage form data before it reaches the content tables:
//! - Saving a draft of an existing row reuses that row's draft
//! - Saves naming an `expected_version` fail on a stale version
//! - Publishing validates the data, writes the row and drops the draft,
//!   unless the draft was saved again in the meantime

use crate::db::repositories::{DraftRepository, DraftWrite};
use crate::models::{ContentKind, ContentRecord, Draft, Fields, SaveDraftInput, UpdateDraftInput};
use crate::services::content::{ContentService, ContentServiceError};
use anyhow::Context;
use serde_json::Value;
use std::sync::Arc;

/// Error types for draft service operations
#[derive(Debug, thiserror::Error)]
pub enum DraftServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    ValidationError(String),

    /// Another save got there first
    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<ContentServiceError> for DraftServiceError {
    fn from(err: ContentServiceError) -> Self {
        match err {
            ContentServiceError::NotFound(m) => Self::NotFound(m),
            ContentServiceError::ValidationError(m) => Self::ValidationError(m),
            ContentServiceError::Conflict(m) => Self::Conflict(m),
            ContentServiceError::InternalError(e) => Self::InternalError(e),
        }
    }
}

fn stale(id: i64, current: i64) -> DraftServiceError {
    DraftServiceError::Conflict(format!(
        "Draft {} was changed by someone else (now at version {})",
        id, current
    ))
}

pub struct DraftService {
    repo: Arc<dyn DraftRepository>,
    content: Arc<ContentService>,
}

impl DraftService {
    pub fn new(repo: Arc<dyn DraftRepository>, content: Arc<ContentService>) -> Self {
        Self { repo, content }
    }

    pub async fn list(&self, kind: ContentKind) -> Result<Vec<Draft>, DraftServiceError> {
        self.repo
            .list(kind)
            .await
            .with_context(|| format!("Failed to list {} drafts", kind))
            .map_err(Into::into)
    }

    pub async fn get(&self, kind: ContentKind, id: i64) -> Result<Draft, DraftServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get draft")?
            .filter(|d| d.content_type == kind)
            .ok_or_else(|| DraftServiceError::NotFound(format!("{} draft {} not found", kind, id)))
    }

    /// Save form data as a draft.
    ///
    /// With an `original_id` the row's existing draft is updated (or created
    /// on first save); without one a new draft is created.
    pub async fn save(
        &self,
        kind: ContentKind,
        input: &SaveDraftInput,
    ) -> Result<Draft, DraftServiceError> {
        ensure_object(&input.data)?;

        let Some(original_id) = input.original_id else {
            let draft = self.create(kind, None, &input.data).await?;
            tracing::info!("Created {} draft {}", kind, draft.id);
            return Ok(draft);
        };

        // The row must still exist; a draft of a deleted row can't be published
        self.content.get(kind, original_id).await?;

        let existing = self
            .repo
            .get_for_original(kind, original_id)
            .await
            .context("Failed to look up draft")?;

        match existing {
            Some(draft) => self.write(draft.id, &input.data, input.expected_version).await,
            None => {
                if let Some(expected) = input.expected_version {
                    return Err(DraftServiceError::Conflict(format!(
                        "Draft of {} row {} no longer exists (expected version {})",
                        kind, original_id, expected
                    )));
                }
                let draft = self.create(kind, Some(original_id), &input.data).await?;
                tracing::info!("Created {} draft {} for row {}", kind, draft.id, original_id);
                Ok(draft)
            }
        }
    }

    async fn create(
        &self,
        kind: ContentKind,
        original_id: Option<i64>,
        data: &Value,
    ) -> Result<Draft, DraftServiceError> {
        self.repo
            .create(kind, original_id, data)
            .await
            .context("Failed to create draft")?
            .ok_or_else(|| {
                DraftServiceError::Conflict(format!(
                    "{} row {} already has a draft",
                    kind,
                    original_id.unwrap_or_default()
                ))
            })
    }

    pub async fn update(
        &self,
        kind: ContentKind,
        id: i64,
        input: &UpdateDraftInput,
    ) -> Result<Draft, DraftServiceError> {
        ensure_object(&input.data)?;
        self.get(kind, id).await?;
        self.write(id, &input.data, input.expected_version).await
    }

    async fn write(
        &self,
        id: i64,
        data: &Value,
        expected_version: Option<i64>,
    ) -> Result<Draft, DraftServiceError> {
        match self
            .repo
            .update(id, data, expected_version)
            .await
            .context("Failed to update draft")?
        {
            DraftWrite::Written(draft) => {
                tracing::debug!("Saved draft {} at version {}", id, draft.version);
                Ok(draft)
            }
            DraftWrite::NotFound => Err(DraftServiceError::NotFound(format!(
                "Draft {} not found",
                id
            ))),
            DraftWrite::Stale { current } => {
                tracing::warn!(
                    "Rejected stale save of draft {} (expected {:?}, current {})",
                    id,
                    expected_version,
                    current
                );
                Err(stale(id, current))
            }
        }
    }

    pub async fn delete(&self, kind: ContentKind, id: i64) -> Result<(), DraftServiceError> {
        self.get(kind, id).await?;
        self.repo.delete(id).await.context("Failed to delete draft")?;
        tracing::info!("Deleted {} draft {}", kind, id);
        Ok(())
    }

    /// Write a draft into its content table and remove it.
    ///
    /// A draft of an existing row updates that row; otherwise a new row is
    /// created. `expected_version` guards against publishing data that
    /// changed since the caller last saw it. A save that lands while the
    /// row is being written keeps its draft and the publish reports a
    /// conflict.
    pub async fn publish(
        &self,
        kind: ContentKind,
        id: i64,
        expected_version: Option<i64>,
    ) -> Result<ContentRecord, DraftServiceError> {
        let draft = self.get(kind, id).await?;
        if let Some(expected) = expected_version {
            if expected != draft.version {
                return Err(stale(id, draft.version));
            }
        }

        let fields = as_fields(&draft.data)?;
        let record = match draft.original_id {
            Some(original_id) => self.content.update(kind, original_id, &fields).await?,
            None => self.content.create(kind, &fields).await?,
        };

        let removed = self
            .repo
            .delete_at_version(draft.id, draft.version)
            .await
            .context("Failed to remove published draft")?;
        if !removed {
            tracing::warn!(
                "{} draft {} changed while version {} was published to row {}",
                kind,
                id,
                draft.version,
                record.id
            );
            return Err(DraftServiceError::Conflict(format!(
                "Draft {} was saved again while version {} was being published to row {}; the newer draft was kept",
                id, draft.version, record.id
            )));
        }
        tracing::info!("Published {} draft {} as row {}", kind, id, record.id);
        Ok(record)
    }
}

fn ensure_object(data: &Value) -> Result<(), DraftServiceError> {
    if data.is_object() {
        Ok(())
    } else {
        Err(DraftServiceError::ValidationError(
            "Draft data must be a JSON object".to_string(),
        ))
    }
}

fn as_fields(data: &Value) -> Result<Fields, DraftServiceError> {
    match data {
        Value::Object(map) => Ok(map.clone()),
        _ => Err(DraftServiceError::ValidationError(
            "Draft data must be a JSON object".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::repositories::{SqlxContentRepository, SqlxDraftRepository};
    use crate::db::{create_test_pool, migrations};
    use async_trait::async_trait;
    use serde_json::json;

    async fn services_with(
        wrap: fn(Arc<dyn DraftRepository>) -> Arc<dyn DraftRepository>,
    ) -> (Arc<ContentService>, DraftService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let content = Arc::new(ContentService::new(
            SqlxContentRepository::boxed(pool.clone()),
            Arc::new(MemoryCache::new()),
        ));
        let drafts = DraftService::new(wrap(SqlxDraftRepository::boxed(pool)), content.clone());
        (content, drafts)
    }

    async fn services() -> (Arc<ContentService>, DraftService) {
        services_with(|repo| repo).await
    }

    /// What a second editor does in the middle of our call
    enum Race {
        /// Saves the draft just before a publish removes it
        SaveDuringPublish,
        /// Creates the row's first draft right after our lookup
        FirstSave,
    }

    struct RacingEditor {
        inner: Arc<dyn DraftRepository>,
        race: Race,
    }

    #[async_trait]
    impl DraftRepository for RacingEditor {
        async fn list(&self, kind: ContentKind) -> anyhow::Result<Vec<Draft>> {
            self.inner.list(kind).await
        }

        async fn get_by_id(&self, id: i64) -> anyhow::Result<Option<Draft>> {
            self.inner.get_by_id(id).await
        }

        async fn get_for_original(
            &self,
            kind: ContentKind,
            original_id: i64,
        ) -> anyhow::Result<Option<Draft>> {
            let found = self.inner.get_for_original(kind, original_id).await?;
            if let (Race::FirstSave, None) = (&self.race, &found) {
                self.inner
                    .create(kind, Some(original_id), &json!({"name": "Other editor"}))
                    .await?;
            }
            Ok(found)
        }

        async fn create(
            &self,
            kind: ContentKind,
            original_id: Option<i64>,
            data: &Value,
        ) -> anyhow::Result<Option<Draft>> {
            self.inner.create(kind, original_id, data).await
        }

        async fn update(
            &self,
            id: i64,
            data: &Value,
            expected_version: Option<i64>,
        ) -> anyhow::Result<DraftWrite> {
            self.inner.update(id, data, expected_version).await
        }

        async fn delete(&self, id: i64) -> anyhow::Result<bool> {
            self.inner.delete(id).await
        }

        async fn delete_at_version(&self, id: i64, version: i64) -> anyhow::Result<bool> {
            if let Race::SaveDuringPublish = self.race {
                let write = self
                    .inner
                    .update(id, &json!({"name": "Skyways Airlines"}), Some(version))
                    .await?;
                assert!(matches!(write, DraftWrite::Written(_)));
            }
            self.inner.delete_at_version(id, version).await
        }
    }

    fn save(original_id: Option<i64>, data: Value, expected_version: Option<i64>) -> SaveDraftInput {
        SaveDraftInput {
            original_id,
            data,
            expected_version,
        }
    }

    #[tokio::test]
    async fn test_publish_new_draft_creates_row() {
        let (content, drafts) = services().await;
        let kind = ContentKind::Partner;

        let draft = drafts
            .save(kind, &save(None, json!({"name": "Skyways"}), None))
            .await
            .unwrap();
        let record = drafts.publish(kind, draft.id, Some(1)).await.unwrap();

        assert_eq!(record.text("name"), Some("Skyways"));
        assert_eq!(content.list(kind, None).await.unwrap().len(), 1);
        assert!(drafts.list(kind).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_draft_of_existing_row_is_reused() {
        let (content, drafts) = services().await;
        let kind = ContentKind::Partner;
        let Value::Object(input) = json!({"name": "Skyways"}) else {
            unreachable!()
        };
        let row = content.create(kind, &input).await.unwrap();

        let first = drafts
            .save(kind, &save(Some(row.id), json!({"name": "Skyways Air"}), None))
            .await
            .unwrap();
        let second = drafts
            .save(kind, &save(Some(row.id), json!({"name": "Skyways Airlines"}), Some(1)))
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.version, 2);

        let published = drafts.publish(kind, second.id, None).await.unwrap();
        assert_eq!(published.id, row.id);
        assert_eq!(published.text("name"), Some("Skyways Airlines"));
    }

    #[tokio::test]
    async fn test_save_during_publish_keeps_newer_draft() {
        let (content, drafts) = services_with(|inner| -> Arc<dyn DraftRepository> {
            Arc::new(RacingEditor { inner, race: Race::SaveDuringPublish })
        })
        .await;
        let kind = ContentKind::Partner;
        let Value::Object(input) = json!({"name": "Skyways"}) else {
            unreachable!()
        };
        let row = content.create(kind, &input).await.unwrap();
        let draft = drafts
            .save(kind, &save(Some(row.id), json!({"name": "Skyways Air"}), None))
            .await
            .unwrap();

        let result = drafts.publish(kind, draft.id, Some(1)).await;
        assert!(matches!(result, Err(DraftServiceError::Conflict(_))));

        let kept = drafts.get(kind, draft.id).await.unwrap();
        assert_eq!(kept.version, 2);
        assert_eq!(kept.data["name"], "Skyways Airlines");
        assert_eq!(content.get(kind, row.id).await.unwrap().text("name"), Some("Skyways Air"));
    }

    #[tokio::test]
    async fn test_concurrent_first_save_conflicts() {
        let (content, drafts) = services_with(|inner| -> Arc<dyn DraftRepository> {
            Arc::new(RacingEditor { inner, race: Race::FirstSave })
        })
        .await;
        let kind = ContentKind::Partner;
        let Value::Object(input) = json!({"name": "Skyways"}) else {
            unreachable!()
        };
        let row = content.create(kind, &input).await.unwrap();

        let result = drafts
            .save(kind, &save(Some(row.id), json!({"name": "Skyways Air"}), None))
            .await;
        assert!(matches!(result, Err(DraftServiceError::Conflict(_))));

        let listed = drafts.list(kind).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].data["name"], "Other editor");
    }

    #[tokio::test]
    async fn test_stale_save_conflicts() {
        let (_content, drafts) = services().await;
        let kind = ContentKind::Offer;
        let draft = drafts
            .save(kind, &save(None, json!({"title": "A"}), None))
            .await
            .unwrap();

        let editor_a = UpdateDraftInput { data: json!({"title": "B"}), expected_version: Some(1) };
        let editor_b = UpdateDraftInput { data: json!({"title": "C"}), expected_version: Some(1) };
        drafts.update(kind, draft.id, &editor_a).await.unwrap();
        let result = drafts.update(kind, draft.id, &editor_b).await;
        assert!(matches!(result, Err(DraftServiceError::Conflict(_))));

        assert_eq!(drafts.get(kind, draft.id).await.unwrap().data["title"], "B");
        assert!(matches!(
            drafts.publish(kind, draft.id, Some(1)).await,
            Err(DraftServiceError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_draft_is_kept_on_publish() {
        let (_content, drafts) = services().await;
        let kind = ContentKind::Banner;
        let draft = drafts
            .save(kind, &save(None, json!({"title": ""}), None))
            .await
            .unwrap();

        let result = drafts.publish(kind, draft.id, None).await;
        assert!(matches!(result, Err(DraftServiceError::ValidationError(_))));
        assert!(drafts.get(kind, draft.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_kind_mismatch_and_missing_rows() {
        let (_content, drafts) = services().await;
        let draft = drafts
            .save(ContentKind::Offer, &save(None, json!({}), None))
            .await
            .unwrap();

        assert!(matches!(
            drafts.get(ContentKind::Banner, draft.id).await,
            Err(DraftServiceError::NotFound(_))
        ));
        assert!(matches!(
            drafts.save(ContentKind::Offer, &save(Some(99), json!({}), None)).await,
            Err(DraftServiceError::NotFound(_))
        ));
        assert!(matches!(
            drafts.save(ContentKind::Offer, &save(None, json!([1]), None)).await,
            Err(DraftServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_deleting_row_removes_its_draft() {
        let (content, drafts) = services().await;
        let kind = ContentKind::Partner;
        let Value::Object(input) = json!({"name": "Skyways"}) else {
            unreachable!()
        };
        let row = content.create(kind, &input).await.unwrap();
        let draft = drafts
            .save(kind, &save(Some(row.id), json!({"name": "X"}), None))
            .await
            .unwrap();

        content.delete(kind, row.id).await.unwrap();
        assert!(matches!(
            drafts.get(kind, draft.id).await,
            Err(DraftServiceError::NotFound(_))
        ));
    }
}
