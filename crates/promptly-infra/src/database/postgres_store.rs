//! PostgreSQL document store.
//!
//! Documents live in one `documents` table as JSONB. Commits run in a
//! database transaction that row-locks every existing target before the
//! version checks; two commits creating the same path collide on the
//! primary key and surface as a conflict.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, DbConn, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};

use promptly_core::error::StoreError;
use promptly_core::ports::{
    DocPath, Document, DocumentStore, Fields, ListenerId, Snapshot, SnapshotHandler, Write,
};

use super::entity::document::{self, Entity as DocumentEntity};
use crate::store::ChangeFeed;

struct Staged {
    version: u64,
    data: Option<Fields>,
    row_exists: bool,
}

/// PostgreSQL-backed document store.
///
/// Change notification is in-process: listeners see commits made through
/// this instance only.
pub struct PostgresDocumentStore {
    db: DbConn,
    feed: ChangeFeed,
}

impl PostgresDocumentStore {
    pub fn new(db: DbConn) -> Self {
        Self {
            db,
            feed: ChangeFeed::new(),
        }
    }

    async fn find(&self, path: &DocPath) -> Result<Option<document::Model>, StoreError> {
        DocumentEntity::find_by_id((path.collection.clone(), path.id.clone()))
            .one(&self.db)
            .await
            .map_err(query_error)
    }

    async fn current(
        txn: &DatabaseTransaction,
        staged: &BTreeMap<DocPath, Staged>,
        path: &DocPath,
    ) -> Result<(u64, Option<Fields>, bool), StoreError> {
        if let Some(entry) = staged.get(path) {
            return Ok((entry.version, entry.data.clone(), entry.row_exists));
        }
        let row = DocumentEntity::find_by_id((path.collection.clone(), path.id.clone()))
            .lock_exclusive()
            .one(txn)
            .await
            .map_err(query_error)?;
        Ok(match row {
            Some(row) => (row.version(), row.fields(), true),
            None => (0, None, false),
        })
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError> {
        Ok(self.find(path).await?.and_then(document::Model::into_document))
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let rows = DocumentEntity::find()
            .filter(document::Column::Collection.eq(collection))
            .filter(document::Column::Data.is_not_null())
            .order_by_asc(document::Column::Id)
            .all(&self.db)
            .await
            .map_err(query_error)?;

        Ok(rows
            .into_iter()
            .filter_map(document::Model::into_document)
            .collect())
    }

    async fn commit(&self, writes: Vec<Write>) -> Result<(), StoreError> {
        if writes.is_empty() {
            return Ok(());
        }

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let mut staged: BTreeMap<DocPath, Staged> = BTreeMap::new();
        for write in &writes {
            let (version, data, row_exists) = Self::current(&txn, &staged, &write.path).await?;
            write.check_version(version)?;
            let next = write.apply(data.as_ref())?;
            staged.insert(
                write.path.clone(),
                Staged {
                    version: version + 1,
                    data: next,
                    row_exists,
                },
            );
        }

        let now = Utc::now();
        let mut snapshots = Vec::with_capacity(staged.len());
        for (path, entry) in staged {
            let model = document::ActiveModel {
                collection: Set(path.collection.clone()),
                id: Set(path.id.clone()),
                version: Set(entry.version as i64),
                data: Set(entry.data.clone().map(serde_json::Value::Object)),
                updated_at: Set(now.into()),
            };
            let saved = if entry.row_exists {
                model.update(&txn).await
            } else {
                model.insert(&txn).await
            };
            saved.map_err(|e| write_error(&path, e))?;

            snapshots.push(Snapshot {
                path,
                version: entry.version,
                data: entry.data,
            });
        }

        txn.commit().await.map_err(query_error)?;

        tracing::debug!(writes = writes.len(), "Transaction committed");
        self.feed.publish(&snapshots).await;
        Ok(())
    }

    async fn listen(
        &self,
        path: &DocPath,
        handler: SnapshotHandler,
    ) -> Result<ListenerId, StoreError> {
        let initial = self.snapshot(path).await?;
        let id = self.feed.register(initial, handler).await;

        // A commit between the read and the registration would be missed;
        // replaying the current state closes that gap. Stale versions are
        // dropped by the feed.
        let current = self.snapshot(path).await?;
        self.feed.publish(&[current]).await;
        Ok(id)
    }

    async fn unlisten(&self, id: ListenerId) {
        self.feed.remove(id).await;
    }
}

impl PostgresDocumentStore {
    async fn snapshot(&self, path: &DocPath) -> Result<Snapshot, StoreError> {
        Ok(match self.find(path).await? {
            Some(row) => row.snapshot(),
            None => Snapshot {
                path: path.clone(),
                version: 0,
                data: None,
            },
        })
    }
}

fn query_error(e: DbErr) -> StoreError {
    match e {
        DbErr::Conn(_) | DbErr::ConnectionAcquire(_) => StoreError::Connection(e.to_string()),
        _ => StoreError::Query(e.to_string()),
    }
}

/// A racing insert of the same path, or an update of a row that vanished,
/// is a conflict like any stale version.
fn write_error(path: &DocPath, e: DbErr) -> StoreError {
    let message = e.to_string();
    if matches!(e, DbErr::RecordNotUpdated)
        || message.contains("duplicate")
        || message.contains("unique")
    {
        StoreError::Conflict(path.to_string())
    } else {
        query_error(e)
    }
}
