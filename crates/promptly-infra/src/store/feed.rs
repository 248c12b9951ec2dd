//! Snapshot fan-out shared by the store adapters.
//!
//! Every listener gets its own unbounded queue and delivery task, so a
//! slow handler never holds up a commit or another listener.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::{RwLock, mpsc};

use promptly_core::ports::{DocPath, ListenerId, Snapshot, SnapshotHandler};

struct Listener {
    path: DocPath,
    sender: mpsc::UnboundedSender<Snapshot>,
    active: Arc<AtomicBool>,
}

/// Registered document listeners.
pub struct ChangeFeed {
    listeners: RwLock<HashMap<ListenerId, Listener>>,
    next_id: AtomicU64,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers `handler` for `initial.path` and queues `initial` as its
    /// first delivery. Later snapshots not newer than the last delivered
    /// one are dropped.
    pub async fn register(&self, initial: Snapshot, handler: SnapshotHandler) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, mut receiver) = mpsc::unbounded_channel::<Snapshot>();
        let active = Arc::new(AtomicBool::new(true));
        let path = initial.path.clone();

        // The receiver is alive, so this cannot fail.
        let _ = sender.send(initial);

        let running = active.clone();
        tokio::spawn(async move {
            let mut delivered: Option<u64> = None;
            while let Some(snapshot) = receiver.recv().await {
                if !running.load(Ordering::Acquire) {
                    break;
                }
                if delivered.is_some_and(|last| snapshot.version <= last) {
                    continue;
                }
                delivered = Some(snapshot.version);
                handler(snapshot);
            }
        });

        tracing::debug!(listener = id.0, path = %path, "Listener registered");
        self.listeners.write().await.insert(
            id,
            Listener {
                path,
                sender,
                active,
            },
        );
        id
    }

    /// Queues each snapshot for every listener of its path.
    pub async fn publish(&self, snapshots: &[Snapshot]) {
        let listeners = self.listeners.read().await;
        for snapshot in snapshots {
            for listener in listeners.values().filter(|l| l.path == snapshot.path) {
                let _ = listener.sender.send(snapshot.clone());
            }
        }
    }

    /// Stops a listener. Snapshots still queued for it are discarded.
    pub async fn remove(&self, id: ListenerId) -> bool {
        match self.listeners.write().await.remove(&id) {
            Some(listener) => {
                listener.active.store(false, Ordering::Release);
                tracing::debug!(listener = id.0, path = %listener.path, "Listener removed");
                true
            }
            None => false,
        }
    }

    pub async fn listener_count(&self) -> usize {
        self.listeners.read().await.len()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}
