//! Shared fixtures: seeded accounts and store wrappers that inject
//! failures, conflicts and interleavings.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Barrier;

use promptly_core::domain::{Caller, Identity, ItemDraft};
use promptly_core::error::StoreError;
use promptly_core::ports::{
    DocPath, Document, DocumentStore, ListenerId, SnapshotHandler, Write,
};
use promptly_core::services::AccountService;
use promptly_infra::InMemoryDocumentStore;

pub fn memory_store() -> Arc<dyn DocumentStore> {
    Arc::new(InMemoryDocumentStore::new())
}

pub fn user(id: &str) -> Caller {
    Caller::User(
        Identity::new(id, format!("{id}@example.com"))
            .with_name(format!("User {id}"))
            .with_username(id),
    )
}

/// Creates the account with the default signup credits.
pub async fn sign_up(store: &Arc<dyn DocumentStore>, id: &str) -> Caller {
    let caller = user(id);
    AccountService::new(store.clone())
        .ensure_account(&caller, None)
        .await
        .unwrap();
    caller
}

pub fn draft(title: &str) -> ItemDraft {
    ItemDraft {
        title: title.to_string(),
        body: format!("{title}, highly detailed"),
        ..Default::default()
    }
}

/// Fails every commit that touches a matching path.
pub struct FlakyStore {
    inner: Arc<dyn DocumentStore>,
    fails: Box<dyn Fn(&DocPath) -> bool + Send + Sync>,
}

impl FlakyStore {
    pub fn new(
        inner: Arc<dyn DocumentStore>,
        fails: impl Fn(&DocPath) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner,
            fails: Box::new(fails),
        }
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError> {
        self.inner.get(path).await
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        self.inner.list(collection).await
    }

    async fn commit(&self, writes: Vec<Write>) -> Result<(), StoreError> {
        if writes.iter().any(|write| (self.fails)(&write.path)) {
            return Err(StoreError::Connection("injected failure".to_string()));
        }
        self.inner.commit(writes).await
    }

    async fn listen(
        &self,
        path: &DocPath,
        handler: SnapshotHandler,
    ) -> Result<ListenerId, StoreError> {
        self.inner.listen(path, handler).await
    }

    async fn unlisten(&self, id: ListenerId) {
        self.inner.unlisten(id).await
    }
}

/// Rejects the first `conflicts` version-guarded commits on `collection`
/// as if another writer had got there first.
pub struct ConflictingStore {
    inner: Arc<dyn DocumentStore>,
    collection: &'static str,
    remaining: AtomicU32,
    pub guarded_commits: AtomicU32,
}

impl ConflictingStore {
    pub fn new(inner: Arc<dyn DocumentStore>, collection: &'static str, conflicts: u32) -> Self {
        Self {
            inner,
            collection,
            remaining: AtomicU32::new(conflicts),
            guarded_commits: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl DocumentStore for ConflictingStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError> {
        self.inner.get(path).await
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        self.inner.list(collection).await
    }

    async fn commit(&self, writes: Vec<Write>) -> Result<(), StoreError> {
        let guarded = writes
            .iter()
            .find(|w| w.expected_version.is_some() && w.path.collection == self.collection);
        if let Some(guarded) = guarded {
            self.guarded_commits.fetch_add(1, Ordering::SeqCst);
            if take_one(&self.remaining) {
                return Err(StoreError::Conflict(guarded.path.to_string()));
            }
        }
        self.inner.commit(writes).await
    }

    async fn listen(
        &self,
        path: &DocPath,
        handler: SnapshotHandler,
    ) -> Result<ListenerId, StoreError> {
        self.inner.listen(path, handler).await
    }

    async fn unlisten(&self, id: ListenerId) {
        self.inner.unlisten(id).await
    }
}

/// Holds the first `parties` reads of `collection` until all of them have
/// arrived, so concurrent read-then-write operations all read the same
/// state before any of them writes.
pub struct GatedStore {
    inner: Arc<dyn DocumentStore>,
    collection: &'static str,
    barrier: Barrier,
    remaining: AtomicUsize,
}

impl GatedStore {
    pub fn new(inner: Arc<dyn DocumentStore>, collection: &'static str, parties: usize) -> Self {
        Self {
            inner,
            collection,
            barrier: Barrier::new(parties),
            remaining: AtomicUsize::new(parties),
        }
    }
}

#[async_trait]
impl DocumentStore for GatedStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError> {
        let doc = self.inner.get(path).await;
        if path.collection == self.collection
            && self
                .remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        {
            self.barrier.wait().await;
        }
        doc
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        self.inner.list(collection).await
    }

    async fn commit(&self, writes: Vec<Write>) -> Result<(), StoreError> {
        self.inner.commit(writes).await
    }

    async fn listen(
        &self,
        path: &DocPath,
        handler: SnapshotHandler,
    ) -> Result<ListenerId, StoreError> {
        self.inner.listen(path, handler).await
    }

    async fn unlisten(&self, id: ListenerId) {
        self.inner.unlisten(id).await
    }
}

/// A store that is unreachable.
pub struct BrokenStore;

#[async_trait]
impl DocumentStore for BrokenStore {
    async fn get(&self, _path: &DocPath) -> Result<Option<Document>, StoreError> {
        Err(StoreError::Connection("store offline".to_string()))
    }

    async fn list(&self, _collection: &str) -> Result<Vec<Document>, StoreError> {
        Err(StoreError::Connection("store offline".to_string()))
    }

    async fn commit(&self, _writes: Vec<Write>) -> Result<(), StoreError> {
        Err(StoreError::Connection("store offline".to_string()))
    }

    async fn listen(
        &self,
        _path: &DocPath,
        _handler: SnapshotHandler,
    ) -> Result<ListenerId, StoreError> {
        Err(StoreError::Connection("store offline".to_string()))
    }

    async fn unlisten(&self, _id: ListenerId) {}
}

fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}
