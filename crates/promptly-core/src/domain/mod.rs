//! Domain entities - the core business objects.

mod account;
mod catalog;
mod identity;
mod roadmap;

pub use account::fields as account_fields;
pub use account::{ActivityEntry, ProfilePatch, SecuritySettings, UserAccount};
pub use catalog::{
    ANONYMOUS, AuthorCatalog, AuthorSnapshot, Comment, ContentItem, Counters, ItemDraft,
    ItemPatch, ProjectedItem, generate_item_id, project,
};
pub use identity::{Caller, Identity};
pub use roadmap::{Feature, ModelOption};

/// Collection names of the persisted schema.
pub mod collections {
    pub const CATALOG: &str = "catalog";
    pub const ACCOUNTS: &str = "accounts";
    pub const HISTORY: &str = "history";
    pub const MODELS: &str = "models";
    pub const FEATURES: &str = "features";
    pub const SUBSCRIBERS: &str = "subscribers";
}
