//! Application state - shared across all handlers.

use std::sync::Arc;

use promptly_core::ports::{DocumentStore, TokenService};
use promptly_core::services::{
    AccountService, CatalogService, CreditService, FollowService, LikeService, Resolver,
    RoadmapService, SubscriptionRegistry, SubscriptionService,
};
use promptly_infra::InMemoryDocumentStore;

use crate::config::AppConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<CatalogService>,
    pub likes: Arc<LikeService>,
    pub follows: Arc<FollowService>,
    pub credits: Arc<CreditService>,
    pub accounts: Arc<AccountService>,
    pub roadmap: Arc<RoadmapService>,
    pub subscriptions: Arc<SubscriptionService>,
    /// `None` when the server was built without identity tokens; every
    /// caller is then anonymous.
    pub tokens: Option<Arc<dyn TokenService>>,
    pub feed_limit: usize,
    pub backend: &'static str,
}

impl AppState {
    /// Build the application state with appropriate implementations.
    pub async fn new(config: &AppConfig) -> Self {
        let (store, backend) = Self::open_store(config).await;

        #[cfg(feature = "auth")]
        let tokens: Option<Arc<dyn TokenService>> =
            Some(Arc::new(promptly_infra::JwtTokenService::from_env()));

        #[cfg(not(feature = "auth"))]
        let tokens: Option<Arc<dyn TokenService>> = {
            tracing::info!("Running without auth feature - all callers are anonymous");
            None
        };

        let state = Self::with_store(store, tokens, config).with_backend(backend);
        tracing::info!(backend, "Application state initialized");
        state
    }

    /// Wires every service over one document store.
    pub fn with_store(
        store: Arc<dyn DocumentStore>,
        tokens: Option<Arc<dyn TokenService>>,
        config: &AppConfig,
    ) -> Self {
        let catalog = Arc::new(CatalogService::new(store.clone()));
        let resolver: Arc<dyn Resolver> = catalog.clone();

        Self {
            catalog,
            likes: Arc::new(
                LikeService::new(store.clone()).with_max_attempts(config.like_max_attempts),
            ),
            follows: Arc::new(FollowService::new(store.clone())),
            credits: Arc::new(CreditService::new(store.clone())),
            accounts: Arc::new(
                AccountService::new(store.clone()).with_signup_credits(config.signup_credits),
            ),
            roadmap: Arc::new(RoadmapService::new(store.clone())),
            subscriptions: Arc::new(SubscriptionService::new(
                SubscriptionRegistry::new(store),
                resolver,
            )),
            tokens,
            feed_limit: config.feed_limit,
            backend: "memory",
        }
    }

    fn with_backend(mut self, backend: &'static str) -> Self {
        self.backend = backend;
        self
    }

    #[cfg(feature = "postgres")]
    async fn open_store(config: &AppConfig) -> (Arc<dyn DocumentStore>, &'static str) {
        use promptly_infra::{DatabaseConfig, PostgresDocumentStore, database};

        let Some(settings) = &config.database else {
            tracing::warn!("DATABASE_URL not set. Running on the in-memory document store.");
            return (Arc::new(InMemoryDocumentStore::new()), "memory");
        };

        let db_config = DatabaseConfig {
            url: settings.url.clone(),
            max_connections: settings.max_connections,
            min_connections: settings.min_connections,
        };
        match database::connect(&db_config).await {
            Ok(db) => (Arc::new(PostgresDocumentStore::new(db)), "postgres"),
            Err(e) => {
                tracing::error!(
                    "Failed to connect to database: {}. Using in-memory fallback.",
                    e
                );
                (Arc::new(InMemoryDocumentStore::new()), "memory")
            }
        }
    }

    #[cfg(not(feature = "postgres"))]
    async fn open_store(config: &AppConfig) -> (Arc<dyn DocumentStore>, &'static str) {
        if config.database.is_some() {
            tracing::warn!("DATABASE_URL ignored: built without the postgres feature");
        }
        (Arc::new(InMemoryDocumentStore::new()), "memory")
    }
}
