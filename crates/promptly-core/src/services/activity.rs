//! Append-only activity history: `accounts[userId]/history`.

use std::sync::Arc;

use crate::domain::ActivityEntry;
use crate::domain::collections::{ACCOUNTS, HISTORY};
use crate::error::StoreError;
use crate::ports::{DocPath, DocumentStore, to_fields};

#[derive(Clone)]
pub struct ActivityLog {
    store: Arc<dyn DocumentStore>,
}

impl ActivityLog {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn append(&self, user_id: &str, entry: &ActivityEntry) -> Result<(), StoreError> {
        let collection = history_collection(user_id);
        self.store.add(&collection, to_fields(entry)?).await?;
        Ok(())
    }

    /// Fire-and-forget append. A failure is logged and goes nowhere else.
    pub fn append_detached(&self, user_id: &str, entry: ActivityEntry) {
        let log = self.clone();
        let user_id = user_id.to_string();
        tokio::spawn(async move {
            if let Err(e) = log.append(&user_id, &entry).await {
                tracing::warn!(
                    user_id = %user_id,
                    action = %entry.action,
                    error = %e,
                    "Failed to record activity"
                );
            }
        });
    }

    /// Newest entries first.
    pub async fn recent(&self, user_id: &str, limit: usize) -> Vec<ActivityEntry> {
        let docs = match self.store.list(&history_collection(user_id)).await {
            Ok(docs) => docs,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Failed to read activity");
                return Vec::new();
            }
        };

        let mut entries: Vec<ActivityEntry> = docs
            .iter()
            .filter_map(|doc| doc.decode().ok())
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries.truncate(limit);
        entries
    }

    /// Paths of every stored entry, for account termination.
    pub async fn paths(&self, user_id: &str) -> Result<Vec<DocPath>, StoreError> {
        Ok(self
            .store
            .list(&history_collection(user_id))
            .await?
            .into_iter()
            .map(|doc| doc.path)
            .collect())
    }
}

fn history_collection(user_id: &str) -> String {
    DocPath::new(ACCOUNTS, user_id).subcollection(HISTORY)
}
