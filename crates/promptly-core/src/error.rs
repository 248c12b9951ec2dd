//! Domain-level error types.

use thiserror::Error;

/// Domain errors - business rule failures surfaced by mutations.
///
/// Read paths never return these; they log and fall back to empty results.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: &'static str, id: String },

    #[error("Insufficient credits: {available} available")]
    InsufficientCredits { available: i64 },

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Transaction aborted after {attempts} conflicting attempts")]
    TransactionConflict { attempts: u32 },

    /// The first half of a two-step write landed, the second did not.
    /// Nothing is rolled back.
    #[error("Partial failure: {completed} written, {failed} failed: {source}")]
    PartialFailure {
        completed: &'static str,
        failed: &'static str,
        source: StoreError,
    },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DomainError {
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Whether the caller may simply try the same operation again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransactionConflict { .. }
                | Self::Store(StoreError::Conflict(_))
                | Self::Store(StoreError::Connection(_))
        )
    }
}

/// Document store errors.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Store connection failed: {0}")]
    Connection(String),

    #[error("Query execution failed: {0}")]
    Query(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    /// A version precondition did not hold at commit time.
    #[error("Concurrent modification of {0}")]
    Conflict(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
