//! Use cases over the document store port.

mod accounts;
mod activity;
mod catalog;
mod credits;
mod entries;
mod follows;
mod likes;
mod optimistic;
mod projection;
mod roadmap;
mod subscriptions;

pub use accounts::{AccountService, DEFAULT_SIGNUP_CREDITS};
pub use activity::ActivityLog;
pub use catalog::{CatalogService, author_snapshot};
pub use credits::{CreditService, UnlockOutcome};
pub use entries::{EntriesEditor, append_entry, decode_catalog};
pub use follows::FollowService;
pub use likes::{DEFAULT_MAX_ATTEMPTS, LikeService};
pub use optimistic::{ItemEngagement, with_optimistic_update};
pub use projection::{feed, flatten, newest_first, order_by_request};
pub use roadmap::RoadmapService;
pub use subscriptions::{
    Callback, Resolver, Subscription, SubscriptionRegistry, SubscriptionService,
    SubscriptionState,
};
