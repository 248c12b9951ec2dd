//! The single seam for rewriting a catalog's `entries` array.
//!
//! The store cannot address one element of an array, so every change to an
//! item loads the whole aggregate, edits it in memory and writes the whole
//! array back.

use std::collections::HashMap;

use serde_json::Value;

use crate::domain::collections::CATALOG;
use crate::domain::{AuthorCatalog, AuthorSnapshot, ContentItem};
use crate::error::StoreError;
use crate::ports::{DocPath, Document, DocumentStore, FieldOp, Write};

const ENTRIES: &str = "entries";

/// In-memory copy of one catalog, indexed by item id.
#[derive(Debug, Clone)]
pub struct EntriesEditor {
    path: DocPath,
    version: u64,
    catalog: AuthorCatalog,
    index: HashMap<String, usize>,
}

impl EntriesEditor {
    /// Loads a catalog. `Ok(None)` if the author has no catalog.
    pub async fn load(
        store: &dyn DocumentStore,
        author_id: &str,
    ) -> Result<Option<Self>, StoreError> {
        let path = DocPath::new(CATALOG, author_id);
        match store.get(&path).await? {
            Some(doc) => Self::from_document(&doc).map(Some),
            None => Ok(None),
        }
    }

    pub fn from_document(doc: &Document) -> Result<Self, StoreError> {
        let catalog = decode_catalog(doc)?;
        let index = build_index(&catalog.entries);

        Ok(Self {
            path: doc.path.clone(),
            version: doc.version,
            catalog,
            index,
        })
    }

    pub fn author_id(&self) -> &str {
        &self.path.id
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn root(&self) -> AuthorSnapshot {
        self.catalog.root()
    }

    pub fn entries(&self) -> &[ContentItem] {
        &self.catalog.entries
    }

    pub fn find(&self, item_id: &str) -> Option<&ContentItem> {
        self.index
            .get(item_id)
            .map(|&position| &self.catalog.entries[position])
    }

    /// Runs `edit` on the item with `item_id`. Returns whether it exists.
    pub fn modify<F>(&mut self, item_id: &str, edit: F) -> bool
    where
        F: FnOnce(&mut ContentItem),
    {
        match self.index.get(item_id) {
            Some(&position) => {
                edit(&mut self.catalog.entries[position]);
                true
            }
            None => false,
        }
    }

    /// Drops every item for which `keep` is false. Returns how many went.
    pub fn retain<F>(&mut self, keep: F) -> usize
    where
        F: FnMut(&ContentItem) -> bool,
    {
        let before = self.catalog.entries.len();
        self.catalog.entries.retain(keep);
        self.index = build_index(&self.catalog.entries);
        before - self.catalog.entries.len()
    }

    /// Write replacing the stored array, with no isolation: whatever
    /// happened to the aggregate since `load` is overwritten.
    pub fn into_write(self) -> Result<Write, StoreError> {
        let entries = serde_json::to_value(&self.catalog.entries)?;
        Ok(Write::update(
            self.path,
            vec![(ENTRIES.to_string(), FieldOp::Set(entries))],
        ))
    }

    /// Same as [`into_write`](Self::into_write) but only commits if the
    /// aggregate is still at the loaded version.
    pub fn into_guarded_write(self) -> Result<Write, StoreError> {
        let version = self.version;
        Ok(self.into_write()?.at_version(version))
    }

    pub async fn save(self, store: &dyn DocumentStore) -> Result<(), StoreError> {
        let write = self.into_write()?;
        store.commit(vec![write]).await
    }
}

/// Decodes a catalog document; the key doubles as the author id.
pub fn decode_catalog(doc: &Document) -> Result<AuthorCatalog, StoreError> {
    let mut catalog: AuthorCatalog = doc.decode()?;
    if catalog.author_id.is_empty() {
        catalog.author_id = doc.path.id.clone();
    }
    Ok(catalog)
}

/// Field update appending one item with structural de-duplication.
pub fn append_entry(item: &ContentItem) -> Result<(String, FieldOp), StoreError> {
    let value: Value = serde_json::to_value(item)?;
    Ok((ENTRIES.to_string(), FieldOp::ArrayUnion(vec![value])))
}

fn build_index(entries: &[ContentItem]) -> HashMap<String, usize> {
    entries
        .iter()
        .enumerate()
        .map(|(position, item)| (item.id.clone(), position))
        .collect()
}
