//! Live views over accounts, catalogs and single items.
//!
//! Item ids do not encode their owning catalog, so an item subscription
//! first resolves the owner with a one-shot scan and only then attaches a
//! listener to that catalog. Every subscription shares one store listener
//! per document through [`SubscriptionRegistry`].

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::watch;

use super::entries::decode_catalog;
use super::projection::newest_first;
use crate::domain::collections::{ACCOUNTS, CATALOG};
use crate::domain::{ProjectedItem, UserAccount, project};
use crate::error::StoreError;
use crate::ports::{DocPath, DocumentStore, ListenerId, Snapshot, SnapshotHandler};

/// Consumer callback of a subscription.
pub type Callback<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Finds the author whose catalog holds an item.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, item_id: &str) -> Option<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionState {
    Resolving,
    Subscribed { path: DocPath },
    /// Nothing to listen to. The callback never fires.
    Unresolved,
    /// Terminal.
    Disposed,
}

/// One consumer of a shared listener. Drops snapshots that are not newer
/// than the last one it delivered.
struct Watcher {
    deliver: SnapshotHandler,
    /// Last delivered version plus one; zero before the first delivery.
    delivered: AtomicU64,
}

impl Watcher {
    fn new(deliver: SnapshotHandler) -> Self {
        Self {
            deliver,
            delivered: AtomicU64::new(0),
        }
    }

    fn offer(&self, snapshot: &Snapshot) {
        let next = snapshot.version + 1;
        if self.delivered.fetch_max(next, Ordering::AcqRel) < next {
            (self.deliver)(snapshot.clone());
        }
    }
}

#[derive(Default)]
struct FanoutState {
    watchers: HashMap<u64, Arc<Watcher>>,
    latest: Option<Snapshot>,
}

/// Receives the snapshots of one store listener and hands them to every
/// watcher of that document.
#[derive(Default)]
struct Fanout {
    state: Mutex<FanoutState>,
}

impl Fanout {
    fn lock(&self) -> std::sync::MutexGuard<'_, FanoutState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, snapshot: Snapshot) {
        let watchers: Vec<Arc<Watcher>> = {
            let mut state = self.lock();
            if state
                .latest
                .as_ref()
                .is_none_or(|latest| latest.version < snapshot.version)
            {
                state.latest = Some(snapshot.clone());
            }
            state.watchers.values().cloned().collect()
        };
        for watcher in watchers {
            watcher.offer(&snapshot);
        }
    }

    /// Adds a watcher and replays the latest snapshot to it.
    fn join(&self, id: u64, watcher: Arc<Watcher>) {
        let latest = {
            let mut state = self.lock();
            state.watchers.insert(id, watcher.clone());
            state.latest.clone()
        };
        if let Some(snapshot) = latest {
            watcher.offer(&snapshot);
        }
    }

    /// Returns `true` once the last watcher has left.
    fn leave(&self, id: u64) -> bool {
        let mut state = self.lock();
        state.watchers.remove(&id);
        state.watchers.is_empty()
    }
}

struct Listening {
    listener: ListenerId,
    fanout: Arc<Fanout>,
}

/// Shared store listeners keyed by document path.
#[derive(Clone)]
pub struct SubscriptionRegistry {
    store: Arc<dyn DocumentStore>,
    listening: Arc<tokio::sync::Mutex<HashMap<DocPath, Listening>>>,
    next_watcher: Arc<AtomicU64>,
}

impl SubscriptionRegistry {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            listening: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
            next_watcher: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Adds a watcher on `path`, opening the store listener if it is the
    /// first one. Returns the watcher id for [`detach`](Self::detach).
    pub async fn attach(
        &self,
        path: &DocPath,
        deliver: SnapshotHandler,
    ) -> Result<u64, StoreError> {
        let id = self.next_watcher.fetch_add(1, Ordering::Relaxed);
        let watcher = Arc::new(Watcher::new(deliver));
        let mut listening = self.listening.lock().await;

        if let Some(existing) = listening.get(path) {
            existing.fanout.join(id, watcher);
            return Ok(id);
        }

        let fanout = Arc::new(Fanout::default());
        fanout.join(id, watcher);
        let sink = fanout.clone();
        let listener = self
            .store
            .listen(path, Arc::new(move |snapshot| sink.publish(snapshot)))
            .await?;

        tracing::debug!(path = %path, "Store listener opened");
        listening.insert(path.clone(), Listening { listener, fanout });
        Ok(id)
    }

    /// Removes a watcher; the store listener closes with the last one.
    /// Unknown ids are ignored.
    pub async fn detach(&self, path: &DocPath, watcher_id: u64) {
        let mut listening = self.listening.lock().await;
        let Some(entry) = listening.get(path) else {
            return;
        };
        if !entry.fanout.leave(watcher_id) {
            return;
        }
        if let Some(entry) = listening.remove(path) {
            self.store.unlisten(entry.listener).await;
            tracing::debug!(path = %path, "Store listener closed");
        }
    }

    /// Number of documents with an open store listener.
    pub async fn active_listeners(&self) -> usize {
        self.listening.lock().await.len()
    }
}

struct Attachment {
    registry: SubscriptionRegistry,
    path: DocPath,
    watcher_id: u64,
}

struct SubscriptionInner {
    state: watch::Sender<SubscriptionState>,
    attachment: tokio::sync::Mutex<Option<Attachment>>,
}

/// Handle of a live subscription. Clones share the same subscription.
#[derive(Clone)]
pub struct Subscription {
    inner: Arc<SubscriptionInner>,
}

impl Subscription {
    fn resolving() -> Self {
        let (state, _) = watch::channel(SubscriptionState::Resolving);
        Self {
            inner: Arc::new(SubscriptionInner {
                state,
                attachment: tokio::sync::Mutex::new(None),
            }),
        }
    }

    pub fn state(&self) -> SubscriptionState {
        self.inner.state.borrow().clone()
    }

    /// Waits until resolution has finished one way or the other.
    pub async fn settled(&self) -> SubscriptionState {
        let mut state = self.inner.state.subscribe();
        let settled = state
            .wait_for(|state| *state != SubscriptionState::Resolving)
            .await
            .map(|state| state.clone());
        settled.unwrap_or(SubscriptionState::Disposed)
    }

    /// Stops delivery and releases the listener. Safe to call at any time
    /// and any number of times.
    pub async fn dispose(&self) {
        let attachment = {
            let mut slot = self.inner.attachment.lock().await;
            self.inner.state.send_replace(SubscriptionState::Disposed);
            slot.take()
        };
        if let Some(attachment) = attachment {
            attachment
                .registry
                .detach(&attachment.path, attachment.watcher_id)
                .await;
        }
    }

    fn is_disposed(&self) -> bool {
        *self.inner.state.borrow() == SubscriptionState::Disposed
    }

    /// Wraps `deliver` so nothing reaches it once disposal has begun. Holds
    /// the subscription weakly; the registry keeps the handler alive.
    fn gate(&self, deliver: SnapshotHandler) -> SnapshotHandler {
        let inner = Arc::downgrade(&self.inner);
        Arc::new(move |snapshot: Snapshot| {
            let live = inner
                .upgrade()
                .is_some_and(|inner| !Subscription { inner }.is_disposed());
            if live {
                deliver(snapshot);
            }
        })
    }
}

/// Entry point for account, catalog and item subscriptions.
#[derive(Clone)]
pub struct SubscriptionService {
    registry: SubscriptionRegistry,
    resolver: Arc<dyn Resolver>,
}

impl SubscriptionService {
    pub fn new(registry: SubscriptionRegistry, resolver: Arc<dyn Resolver>) -> Self {
        Self { registry, resolver }
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// Emits the account on every change while it exists.
    pub fn subscribe_to_account(
        &self,
        user_id: &str,
        callback: Callback<UserAccount>,
    ) -> Subscription {
        let path = DocPath::new(ACCOUNTS, user_id);
        let deliver: SnapshotHandler = Arc::new(move |snapshot: Snapshot| {
            let Some(doc) = snapshot.document() else {
                return;
            };
            match doc.decode::<UserAccount>() {
                Ok(account) => callback(account),
                Err(e) => {
                    tracing::warn!(path = %doc.path, error = %e, "Undecodable account snapshot")
                }
            }
        });
        self.start(async move { Some(path) }, deliver)
    }

    /// Emits the author's projected items, newest first. A missing catalog
    /// emits an empty list.
    pub fn subscribe_to_catalog(
        &self,
        author_id: &str,
        callback: Callback<Vec<ProjectedItem>>,
    ) -> Subscription {
        let path = DocPath::new(CATALOG, author_id);
        let deliver: SnapshotHandler = Arc::new(move |snapshot: Snapshot| {
            let Some(doc) = snapshot.document() else {
                callback(Vec::new());
                return;
            };
            match decode_catalog(&doc) {
                Ok(catalog) => {
                    let root = catalog.root();
                    let mut items: Vec<ProjectedItem> =
                        catalog.entries.iter().map(|item| project(item, &root)).collect();
                    newest_first(&mut items);
                    callback(items);
                }
                Err(e) => {
                    tracing::warn!(path = %doc.path, error = %e, "Undecodable catalog snapshot")
                }
            }
        });
        self.start(async move { Some(path) }, deliver)
    }

    /// Resolves the item's owner, then emits the projected item on every
    /// change of that catalog. Emits nothing while the item is absent.
    pub fn subscribe_to_item(
        &self,
        item_id: &str,
        callback: Callback<ProjectedItem>,
    ) -> Subscription {
        let resolver = self.resolver.clone();
        let lookup_id = item_id.to_string();
        let resolve = async move {
            resolver
                .resolve(&lookup_id)
                .await
                .map(|owner_id| DocPath::new(CATALOG, owner_id))
        };

        let item_id = item_id.to_string();
        let deliver: SnapshotHandler = Arc::new(move |snapshot: Snapshot| {
            let Some(doc) = snapshot.document() else {
                return;
            };
            let catalog = match decode_catalog(&doc) {
                Ok(catalog) => catalog,
                Err(e) => {
                    tracing::warn!(path = %doc.path, error = %e, "Undecodable catalog snapshot");
                    return;
                }
            };
            if let Some(item) = catalog.find(&item_id) {
                callback(project(item, &catalog.root()));
            }
        });
        self.start(resolve, deliver)
    }

    fn start<R>(&self, resolve: R, deliver: SnapshotHandler) -> Subscription
    where
        R: Future<Output = Option<DocPath>> + Send + 'static,
    {
        let subscription = Subscription::resolving();
        let handle = subscription.clone();
        let registry = self.registry.clone();
        let deliver = subscription.gate(deliver);

        tokio::spawn(async move {
            let path = resolve.await;
            let mut slot = handle.inner.attachment.lock().await;
            if handle.is_disposed() {
                return;
            }
            let Some(path) = path else {
                tracing::debug!("Subscription target not found");
                handle.inner.state.send_replace(SubscriptionState::Unresolved);
                return;
            };

            match registry.attach(&path, deliver).await {
                Ok(watcher_id) => {
                    *slot = Some(Attachment {
                        registry: registry.clone(),
                        path: path.clone(),
                        watcher_id,
                    });
                    handle
                        .inner
                        .state
                        .send_replace(SubscriptionState::Subscribed { path });
                }
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "Failed to attach listener");
                    handle.inner.state.send_replace(SubscriptionState::Unresolved);
                }
            }
        });

        subscription
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    fn snapshot(version: u64) -> Snapshot {
        Snapshot {
            path: DocPath::new("c", "x"),
            version,
            data: None,
        }
    }

    #[test]
    fn test_watcher_skips_stale_versions() {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = seen.clone();
        let watcher = Watcher::new(Arc::new(move |s: Snapshot| {
            sink.lock().unwrap().push(s.version)
        }));

        for version in [0, 2, 1, 2, 3] {
            watcher.offer(&snapshot(version));
        }
        assert_eq!(*seen.lock().unwrap(), vec![0, 2, 3]);
    }

    #[test]
    fn test_fanout_replays_latest_to_late_joiner() {
        let fanout = Fanout::default();
        fanout.publish(snapshot(4));
        fanout.publish(snapshot(3));

        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = seen.clone();
        fanout.join(1, Arc::new(Watcher::new(Arc::new(move |s: Snapshot| {
            sink.lock().unwrap().push(s.version)
        }))));

        assert_eq!(*seen.lock().unwrap(), vec![4]);
        assert!(fanout.leave(1));
    }

    #[tokio::test]
    async fn test_gate_stops_delivery_once_disposed() {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = seen.clone();
        let subscription = Subscription::resolving();
        let deliver = subscription.gate(Arc::new(move |s: Snapshot| {
            sink.lock().unwrap().push(s.version)
        }));

        deliver(snapshot(1));
        subscription.dispose().await;
        deliver(snapshot(2));
        assert_eq!(*seen.lock().unwrap(), vec![1]);

        drop(subscription);
        deliver(snapshot(3));
        assert_eq!(*seen.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_dispose_is_idempotent_before_resolution() {
        let subscription = Subscription::resolving();
        subscription.dispose().await;
        subscription.dispose().await;
        assert_eq!(subscription.state(), SubscriptionState::Disposed);
        assert_eq!(subscription.settled().await, SubscriptionState::Disposed);
    }
}
