//! Document store port - schemaless aggregates with versioned, atomic commits.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::StoreError;

/// Body of a document.
pub type Fields = Map<String, Value>;

/// Field-level operations applied by a merge or update write.
pub type FieldUpdates = Vec<(String, FieldOp)>;

/// Address of a single document.
///
/// Subcollections are encoded in the collection name, e.g.
/// `accounts/u1/history`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocPath {
    pub collection: String,
    pub id: String,
}

impl DocPath {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Name of a subcollection nested under this document.
    pub fn subcollection(&self, name: &str) -> String {
        format!("{}/{}/{}", self.collection, self.id, name)
    }

    /// Path of a document inside a nested subcollection.
    pub fn child(&self, collection: &str, id: impl Into<String>) -> Self {
        Self::new(self.subcollection(collection), id)
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// A stored document together with its version.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub path: DocPath,
    pub version: u64,
    pub data: Fields,
}

impl Document {
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        Ok(serde_json::from_value(Value::Object(self.data.clone()))?)
    }
}

/// Point-in-time view of one document, as pushed to listeners.
///
/// `data` is `None` while the document does not exist.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub path: DocPath,
    pub version: u64,
    pub data: Option<Fields>,
}

impl Snapshot {
    pub fn exists(&self) -> bool {
        self.data.is_some()
    }

    pub fn document(&self) -> Option<Document> {
        self.data.as_ref().map(|data| Document {
            path: self.path.clone(),
            version: self.version,
            data: data.clone(),
        })
    }
}

/// A single field transform.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
    Set(Value),
    Increment(i64),
    /// Appends each value not already present. Equality is structural.
    ArrayUnion(Vec<Value>),
    ArrayRemove(Vec<Value>),
    Delete,
}

impl FieldOp {
    pub fn set<T: Serialize>(value: &T) -> Result<Self, StoreError> {
        Ok(Self::Set(serde_json::to_value(value)?))
    }

    pub fn union_str(value: &str) -> Self {
        Self::ArrayUnion(vec![Value::from(value)])
    }

    pub fn remove_str(value: &str) -> Self {
        Self::ArrayRemove(vec![Value::from(value)])
    }

    pub fn apply(&self, data: &mut Fields, field: &str) {
        match self {
            FieldOp::Set(value) => {
                data.insert(field.to_string(), value.clone());
            }
            FieldOp::Increment(by) => {
                let current = data.get(field).and_then(Value::as_i64).unwrap_or(0);
                data.insert(field.to_string(), Value::from(current + by));
            }
            FieldOp::ArrayUnion(values) => {
                let slot = data
                    .entry(field.to_string())
                    .or_insert_with(|| Value::Array(Vec::new()));
                if !slot.is_array() {
                    *slot = Value::Array(Vec::new());
                }
                if let Value::Array(items) = slot {
                    for value in values {
                        if !items.contains(value) {
                            items.push(value.clone());
                        }
                    }
                }
            }
            FieldOp::ArrayRemove(values) => {
                if let Some(Value::Array(items)) = data.get_mut(field) {
                    items.retain(|item| !values.contains(item));
                }
            }
            FieldOp::Delete => {
                data.remove(field);
            }
        }
    }
}

/// What a write does to its target document.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Replace the whole body.
    Set(Fields),
    /// Apply field ops, creating the document if absent.
    Merge(FieldUpdates),
    /// Apply field ops; the document must exist.
    Update(FieldUpdates),
    Delete,
}

/// One write inside a commit.
#[derive(Debug, Clone, PartialEq)]
pub struct Write {
    pub path: DocPath,
    pub op: WriteOp,
    /// Commit only if the document is still at this version.
    pub expected_version: Option<u64>,
}

impl Write {
    pub fn set(path: DocPath, data: Fields) -> Self {
        Self::new(path, WriteOp::Set(data))
    }

    pub fn merge(path: DocPath, updates: FieldUpdates) -> Self {
        Self::new(path, WriteOp::Merge(updates))
    }

    pub fn update(path: DocPath, updates: FieldUpdates) -> Self {
        Self::new(path, WriteOp::Update(updates))
    }

    pub fn delete(path: DocPath) -> Self {
        Self::new(path, WriteOp::Delete)
    }

    fn new(path: DocPath, op: WriteOp) -> Self {
        Self {
            path,
            op,
            expected_version: None,
        }
    }

    /// Guards this write with the version the caller read.
    pub fn at_version(mut self, version: u64) -> Self {
        self.expected_version = Some(version);
        self
    }

    pub fn check_version(&self, current: u64) -> Result<(), StoreError> {
        match self.expected_version {
            Some(expected) if expected != current => {
                Err(StoreError::Conflict(self.path.to_string()))
            }
            _ => Ok(()),
        }
    }

    /// Computes the body after this write. `None` means deleted.
    pub fn apply(&self, current: Option<&Fields>) -> Result<Option<Fields>, StoreError> {
        match &self.op {
            WriteOp::Set(data) => Ok(Some(data.clone())),
            WriteOp::Merge(updates) => {
                let mut data = current.cloned().unwrap_or_default();
                apply_updates(&mut data, updates);
                Ok(Some(data))
            }
            WriteOp::Update(updates) => {
                let mut data = current
                    .cloned()
                    .ok_or_else(|| StoreError::NotFound(self.path.to_string()))?;
                apply_updates(&mut data, updates);
                Ok(Some(data))
            }
            WriteOp::Delete => Ok(None),
        }
    }
}

fn apply_updates(data: &mut Fields, updates: &FieldUpdates) {
    for (field, op) in updates {
        op.apply(data, field);
    }
}

/// Serializes a value that must encode as a JSON object.
pub fn to_fields<T: Serialize>(value: &T) -> Result<Fields, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Serialization(format!(
            "expected an object, got {other}"
        ))),
    }
}

/// Callback invoked with every snapshot of a listened document.
pub type SnapshotHandler = Arc<dyn Fn(Snapshot) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Document store trait - abstraction over document backends (PostgreSQL, in-memory).
///
/// Implementations must guarantee:
/// - `commit` is all-or-nothing across every write it carries.
/// - A write whose `expected_version` does not match fails the whole
///   commit with [`StoreError::Conflict`].
/// - Versions grow by at least one per committed write, and keep growing
///   across delete and re-create.
/// - Listeners receive the current snapshot first, then one snapshot per
///   committed change, in version order.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError>;

    /// Every existing document of a collection, ordered by id.
    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError>;

    async fn commit(&self, writes: Vec<Write>) -> Result<(), StoreError>;

    async fn listen(
        &self,
        path: &DocPath,
        handler: SnapshotHandler,
    ) -> Result<ListenerId, StoreError>;

    /// Detaches a listener. Unknown ids are ignored.
    async fn unlisten(&self, id: ListenerId);

    async fn set(&self, path: &DocPath, data: Fields) -> Result<(), StoreError> {
        self.commit(vec![Write::set(path.clone(), data)]).await
    }

    async fn merge(&self, path: &DocPath, updates: FieldUpdates) -> Result<(), StoreError> {
        self.commit(vec![Write::merge(path.clone(), updates)]).await
    }

    async fn update(&self, path: &DocPath, updates: FieldUpdates) -> Result<(), StoreError> {
        self.commit(vec![Write::update(path.clone(), updates)]).await
    }

    async fn delete(&self, path: &DocPath) -> Result<(), StoreError> {
        self.commit(vec![Write::delete(path.clone())]).await
    }

    /// Stores `data` under a fresh id in `collection`.
    async fn add(&self, collection: &str, data: Fields) -> Result<DocPath, StoreError> {
        let path = DocPath::new(collection, Uuid::new_v4().simple().to_string());
        self.commit(vec![Write::set(path.clone(), data).at_version(0)])
            .await?;
        Ok(path)
    }
}
