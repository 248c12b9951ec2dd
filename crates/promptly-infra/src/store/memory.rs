//! In-memory document store implementation.
//!
//! Used when no database is configured, and by the test suite.
//! Works within a single process only.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use promptly_core::error::StoreError;
use promptly_core::ports::{
    DocPath, Document, DocumentStore, Fields, ListenerId, Snapshot, SnapshotHandler, Write,
};

use super::feed::ChangeFeed;

/// Deleted documents stay as tombstones so versions keep growing when the
/// path is written again.
#[derive(Debug, Clone)]
struct Stored {
    version: u64,
    data: Option<Fields>,
}

/// In-memory document store.
pub struct InMemoryDocumentStore {
    documents: RwLock<BTreeMap<DocPath, Stored>>,
    feed: ChangeFeed,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(BTreeMap::new()),
            feed: ChangeFeed::new(),
        }
    }

    /// Number of open listeners.
    pub async fn listener_count(&self) -> usize {
        self.feed.listener_count().await
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError> {
        let documents = self.documents.read().await;
        Ok(documents.get(path).and_then(|stored| {
            stored.data.as_ref().map(|data| Document {
                path: path.clone(),
                version: stored.version,
                data: data.clone(),
            })
        }))
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let documents = self.documents.read().await;
        Ok(documents
            .iter()
            .filter(|(path, _)| path.collection == collection)
            .filter_map(|(path, stored)| {
                stored.data.as_ref().map(|data| Document {
                    path: path.clone(),
                    version: stored.version,
                    data: data.clone(),
                })
            })
            .collect())
    }

    async fn commit(&self, writes: Vec<Write>) -> Result<(), StoreError> {
        if writes.is_empty() {
            return Ok(());
        }

        let mut documents = self.documents.write().await;

        // Validate and stage every write before touching the map.
        let mut staged: BTreeMap<DocPath, Stored> = BTreeMap::new();
        for write in &writes {
            let current = staged
                .get(&write.path)
                .or_else(|| documents.get(&write.path));
            let version = current.map_or(0, |stored| stored.version);
            write.check_version(version)?;
            let data = write.apply(current.and_then(|stored| stored.data.as_ref()))?;
            staged.insert(
                write.path.clone(),
                Stored {
                    version: version + 1,
                    data,
                },
            );
        }

        let snapshots: Vec<Snapshot> = staged
            .iter()
            .map(|(path, stored)| Snapshot {
                path: path.clone(),
                version: stored.version,
                data: stored.data.clone(),
            })
            .collect();
        documents.extend(staged);

        tracing::debug!(writes = writes.len(), "Commit applied");
        // Published under the write lock so listeners see commits in order.
        self.feed.publish(&snapshots).await;
        Ok(())
    }

    async fn listen(
        &self,
        path: &DocPath,
        handler: SnapshotHandler,
    ) -> Result<ListenerId, StoreError> {
        // The write lock keeps commits out between the initial read and
        // registration.
        let documents = self.documents.write().await;
        let initial = match documents.get(path) {
            Some(stored) => Snapshot {
                path: path.clone(),
                version: stored.version,
                data: stored.data.clone(),
            },
            None => Snapshot {
                path: path.clone(),
                version: 0,
                data: None,
            },
        };
        Ok(self.feed.register(initial, handler).await)
    }

    async fn unlisten(&self, id: ListenerId) {
        self.feed.remove(id).await;
    }
}
