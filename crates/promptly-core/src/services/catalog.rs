//! Catalog reads and the item write path.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use super::entries::{EntriesEditor, append_entry, decode_catalog};
use super::projection::{feed, flatten, newest_first, order_by_request};
use super::subscriptions::Resolver;
use crate::domain::collections::CATALOG;
use crate::domain::{
    ANONYMOUS, AuthorCatalog, AuthorSnapshot, Caller, Comment, ContentItem, Counters, Identity,
    ItemDraft, ItemPatch, ProjectedItem, generate_item_id, project,
};
use crate::error::{DomainError, StoreError};
use crate::ports::{DocPath, DocumentStore, FieldOp, FieldUpdates};

/// Catalog service - feed projections plus create/update/delete of items.
///
/// Reads never fail: store errors are logged and produce empty results.
#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn DocumentStore>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    async fn catalogs(&self) -> Result<Vec<AuthorCatalog>, StoreError> {
        let docs = self.store.list(CATALOG).await?;
        Ok(docs
            .iter()
            .filter_map(|doc| match decode_catalog(doc) {
                Ok(catalog) => Some(catalog),
                Err(e) => {
                    tracing::warn!(
                        author_id = %doc.path.id,
                        error = %e,
                        "Skipping malformed catalog"
                    );
                    None
                }
            })
            .collect())
    }

    async fn catalogs_or_empty(&self, operation: &'static str) -> Vec<AuthorCatalog> {
        self.catalogs().await.unwrap_or_else(|e| {
            tracing::warn!(operation, error = %e, "Catalog scan failed");
            Vec::new()
        })
    }

    /// Visible items of every author, newest first.
    pub async fn list_all(&self, limit: usize) -> Vec<ProjectedItem> {
        feed(&self.catalogs_or_empty("list_all").await, limit)
    }

    pub async fn search(&self, query: &str, limit: usize) -> Vec<ProjectedItem> {
        let query = query.trim();
        let mut hits: Vec<ProjectedItem> = feed(&self.catalogs_or_empty("search").await, usize::MAX)
            .into_iter()
            .filter(|view| query.is_empty() || view.item.matches(query))
            .collect();
        hits.truncate(limit);
        hits
    }

    /// All items of one author, hidden ones included, newest first.
    pub async fn get_by_author(&self, author_id: &str) -> Vec<ProjectedItem> {
        match EntriesEditor::load(self.store.as_ref(), author_id).await {
            Ok(Some(editor)) => {
                let root = editor.root();
                let mut items: Vec<ProjectedItem> = editor
                    .entries()
                    .iter()
                    .map(|item| project(item, &root))
                    .collect();
                newest_first(&mut items);
                items
            }
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(author_id = %author_id, error = %e, "Failed to read catalog");
                Vec::new()
            }
        }
    }

    /// Linear scan over every catalog; there is no item index.
    pub async fn get_by_id(&self, item_id: &str) -> Option<ProjectedItem> {
        self.catalogs_or_empty("get_by_id")
            .await
            .iter()
            .find_map(|catalog| {
                catalog
                    .find(item_id)
                    .map(|item| project(item, &catalog.root()))
            })
    }

    /// Requested items ordered by descending position in `ids`.
    pub async fn get_by_ids(&self, ids: &[String]) -> Vec<ProjectedItem> {
        if ids.is_empty() {
            return Vec::new();
        }
        let catalogs = self.catalogs_or_empty("get_by_ids").await;
        order_by_request(flatten(&catalogs), ids)
    }

    /// Author id of the catalog holding `item_id`.
    pub async fn locate(&self, item_id: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .catalogs()
            .await?
            .into_iter()
            .find(|catalog| catalog.find(item_id).is_some())
            .map(|catalog| catalog.author_id))
    }

    pub async fn create(
        &self,
        caller: &Caller,
        draft: ItemDraft,
    ) -> Result<ContentItem, DomainError> {
        let identity = caller.require()?;
        if draft.title.trim().is_empty() {
            return Err(DomainError::Validation("title must not be empty".to_string()));
        }
        if draft.body.trim().is_empty() {
            return Err(DomainError::Validation("prompt must not be empty".to_string()));
        }

        let item = ContentItem::new(draft, Utc::now());
        self.append(&author_snapshot(identity), &item).await?;

        tracing::info!(author_id = %identity.user_id, item_id = %item.id, "Prompt created");
        Ok(item)
    }

    /// Merge-writes the author root and appends `item`, creating the
    /// catalog if needed. Appending an identical item again is a no-op.
    pub async fn append(
        &self,
        root: &AuthorSnapshot,
        item: &ContentItem,
    ) -> Result<(), StoreError> {
        let mut updates = root_updates(root)?;
        updates.push(append_entry(item)?);
        self.store.merge(&DocPath::new(CATALOG, &root.id), updates).await
    }

    /// Returns `false` when the caller has no catalog or no such item.
    pub async fn update(
        &self,
        caller: &Caller,
        item_id: &str,
        patch: ItemPatch,
    ) -> Result<bool, DomainError> {
        let identity = caller.require()?;
        self.edit(&identity.user_id, item_id, move |item| item.apply(patch))
            .await
    }

    pub async fn delete(&self, caller: &Caller, item_id: &str) -> Result<bool, DomainError> {
        let identity = caller.require()?;
        let Some(mut editor) = EntriesEditor::load(self.store.as_ref(), &identity.user_id).await?
        else {
            tracing::debug!(author_id = %identity.user_id, "No catalog to delete from");
            return Ok(false);
        };

        if editor.retain(|item| item.id != item_id) == 0 {
            return Ok(false);
        }
        editor.save(self.store.as_ref()).await?;

        tracing::info!(author_id = %identity.user_id, item_id = %item_id, "Prompt deleted");
        Ok(true)
    }

    pub async fn record_view(&self, item_id: &str) -> Result<(), DomainError> {
        self.bump(item_id, |counters| counters.views += 1).await
    }

    pub async fn record_download(&self, item_id: &str) -> Result<(), DomainError> {
        self.bump(item_id, |counters| counters.downloads += 1).await
    }

    pub async fn add_comment(
        &self,
        caller: &Caller,
        item_id: &str,
        body: &str,
    ) -> Result<Comment, DomainError> {
        let identity = caller.require()?;
        let body = body.trim();
        if body.is_empty() {
            return Err(DomainError::Validation("comment must not be empty".to_string()));
        }

        let now = Utc::now();
        let comment = Comment {
            id: generate_item_id(now),
            author_id: identity.user_id.clone(),
            author_name: identity
                .name
                .clone()
                .unwrap_or_else(|| ANONYMOUS.to_string()),
            body: body.to_string(),
            created_at: now,
        };

        let owner = self.owner_of(item_id).await?;
        let stored = comment.clone();
        if !self
            .edit(&owner, item_id, move |item| item.comments.push(stored))
            .await?
        {
            return Err(DomainError::not_found("prompt", item_id));
        }
        Ok(comment)
    }

    /// Rewrites the root fields of an existing catalog. Returns `false`
    /// if the author has none.
    pub async fn refresh_author(&self, root: &AuthorSnapshot) -> Result<bool, StoreError> {
        let path = DocPath::new(CATALOG, &root.id);
        match self.store.update(&path, root_updates(root)?).await {
            Ok(()) => Ok(true),
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn owner_of(&self, item_id: &str) -> Result<String, DomainError> {
        self.locate(item_id)
            .await?
            .ok_or_else(|| DomainError::not_found("prompt", item_id))
    }

    async fn bump<F>(&self, item_id: &str, change: F) -> Result<(), DomainError>
    where
        F: FnOnce(&mut Counters) + Send,
    {
        let owner = self.owner_of(item_id).await?;
        if self
            .edit(&owner, item_id, move |item| change(&mut item.counters))
            .await?
        {
            Ok(())
        } else {
            Err(DomainError::not_found("prompt", item_id))
        }
    }

    async fn edit<F>(&self, author_id: &str, item_id: &str, edit: F) -> Result<bool, DomainError>
    where
        F: FnOnce(&mut ContentItem) + Send,
    {
        let Some(mut editor) = EntriesEditor::load(self.store.as_ref(), author_id).await? else {
            return Ok(false);
        };
        if !editor.modify(item_id, edit) {
            return Ok(false);
        }
        editor.save(self.store.as_ref()).await?;
        Ok(true)
    }
}

#[async_trait]
impl Resolver for CatalogService {
    async fn resolve(&self, item_id: &str) -> Option<String> {
        self.locate(item_id).await.unwrap_or_else(|e| {
            tracing::warn!(item_id = %item_id, error = %e, "Owner lookup failed");
            None
        })
    }
}

pub fn author_snapshot(identity: &Identity) -> AuthorSnapshot {
    AuthorSnapshot {
        id: identity.user_id.clone(),
        name: identity.name.clone(),
        username: identity.username.clone(),
        avatar: identity.avatar.clone(),
    }
}

fn root_updates(root: &AuthorSnapshot) -> Result<FieldUpdates, StoreError> {
    Ok(vec![
        ("authorId".to_string(), FieldOp::set(&root.id)?),
        ("author".to_string(), FieldOp::set(&root.name)?),
        ("authorUsername".to_string(), FieldOp::set(&root.username)?),
        ("authorAvatar".to_string(), FieldOp::set(&root.avatar)?),
        ("authorDetails".to_string(), FieldOp::set(root)?),
    ])
}
