//! Ports - trait definitions for external dependencies.
//! These are the "interfaces" that infrastructure must implement.

mod auth;
mod store;

pub use auth::{AuthError, TokenClaims, TokenService};
pub use store::{
    DocPath, Document, DocumentStore, FieldOp, FieldUpdates, Fields, ListenerId, Snapshot,
    SnapshotHandler, Write, WriteOp, to_fields,
};
