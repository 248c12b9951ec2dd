//! Document entity for SeaORM.

use sea_orm::entity::prelude::*;

use promptly_core::ports::{DocPath, Document, Fields, Snapshot};

/// One row per document path. Deleted documents keep their row with a
/// `NULL` body so the version survives.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "documents")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub collection: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub version: i64,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub data: Option<Json>,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn path(&self) -> DocPath {
        DocPath::new(&self.collection, &self.id)
    }

    pub fn version(&self) -> u64 {
        self.version.max(0) as u64
    }

    /// Body of a live document. `None` for tombstones and non-object rows.
    pub fn fields(&self) -> Option<Fields> {
        match &self.data {
            Some(Json::Object(map)) => Some(map.clone()),
            _ => None,
        }
    }

    pub fn into_document(self) -> Option<Document> {
        let data = self.fields()?;
        Some(Document {
            path: self.path(),
            version: self.version(),
            data,
        })
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            path: self.path(),
            version: self.version(),
            data: self.fields(),
        }
    }
}
