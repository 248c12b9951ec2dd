//! Like/unlike: the only operation that commits two aggregates atomically.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use super::activity::ActivityLog;
use super::catalog::CatalogService;
use super::entries::EntriesEditor;
use crate::domain::account_fields::LIKED_PROMPTS;
use crate::domain::collections::{ACCOUNTS, CATALOG};
use crate::domain::{ActivityEntry, Caller, UserAccount};
use crate::error::{DomainError, StoreError};
use crate::ports::{DocPath, DocumentStore, FieldOp, Write};

/// Attempts before a contended toggle gives up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

pub struct LikeService {
    store: Arc<dyn DocumentStore>,
    catalog: CatalogService,
    activity: ActivityLog,
    max_attempts: u32,
}

impl LikeService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            catalog: CatalogService::new(store.clone()),
            activity: ActivityLog::new(store.clone()),
            store,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Flips the caller's like on `item_id` and returns the new state.
    pub async fn toggle_like(&self, caller: &Caller, item_id: &str) -> Result<bool, DomainError> {
        let user_id = &caller.require()?.user_id;
        let owner_id = self
            .catalog
            .locate(item_id)
            .await?
            .ok_or_else(|| DomainError::not_found("prompt", item_id))?;

        for attempt in 1..=self.max_attempts {
            match self.try_toggle(user_id, &owner_id, item_id).await {
                Ok(liked) => {
                    tracing::debug!(
                        user_id = %user_id,
                        item_id = %item_id,
                        liked,
                        attempt,
                        "Like toggled"
                    );
                    if liked {
                        self.activity.append_detached(
                            user_id,
                            ActivityEntry::new("like", format!("Liked prompt {item_id}")),
                        );
                    }
                    return Ok(liked);
                }
                Err(DomainError::Store(StoreError::Conflict(path))) => {
                    tracing::debug!(
                        item_id = %item_id,
                        attempt,
                        max_attempts = self.max_attempts,
                        conflicting = %path,
                        "Like transaction conflicted, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(5 * attempt as u64)).await;
                }
                Err(e) => return Err(e),
            }
        }

        tracing::warn!(
            item_id = %item_id,
            attempts = self.max_attempts,
            "Like transaction gave up"
        );
        Err(DomainError::TransactionConflict {
            attempts: self.max_attempts,
        })
    }

    /// One read-compute-commit round. Both writes carry the versions that
    /// were read, so any interleaved change aborts the commit.
    async fn try_toggle(
        &self,
        user_id: &str,
        owner_id: &str,
        item_id: &str,
    ) -> Result<bool, DomainError> {
        let account_path = DocPath::new(ACCOUNTS, user_id);
        let catalog_path = DocPath::new(CATALOG, owner_id);

        let account_doc = self
            .store
            .get(&account_path)
            .await?
            .ok_or_else(|| DomainError::not_found("account", user_id))?;
        let catalog_doc = self
            .store
            .get(&catalog_path)
            .await?
            .ok_or_else(|| DomainError::not_found("catalog", owner_id))?;

        let account: UserAccount = account_doc.decode()?;
        let mut editor = EntriesEditor::from_document(&catalog_doc)?;
        let was_liked = account.has_liked(item_id);

        let found = editor.modify(item_id, |item| {
            if was_liked {
                if item.liked_by.remove(user_id) {
                    item.counters.likes = item.counters.likes.saturating_sub(1);
                }
            } else if item.liked_by.insert(user_id.to_string()) {
                item.counters.likes += 1;
            }
        });
        if !found {
            return Err(DomainError::not_found("prompt", item_id));
        }

        let liked_op = if was_liked {
            FieldOp::ArrayRemove(vec![Value::from(item_id)])
        } else {
            FieldOp::ArrayUnion(vec![Value::from(item_id)])
        };

        self.store
            .commit(vec![
                editor.into_guarded_write()?,
                Write::update(account_path, vec![(LIKED_PROMPTS.to_string(), liked_op)])
                    .at_version(account_doc.version),
            ])
            .await?;

        Ok(!was_liked)
    }
}
