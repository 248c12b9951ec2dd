//! Application configuration loaded from environment variables.

use std::env;
use std::str::FromStr;

use promptly_core::services::{DEFAULT_MAX_ATTEMPTS, DEFAULT_SIGNUP_CREDITS};

/// Connection settings for the PostgreSQL document store.
#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database: Option<DatabaseSettings>,
    /// Default page size for listing endpoints.
    pub feed_limit: usize,
    /// Attempts before a like transaction gives up.
    pub like_max_attempts: u32,
    /// Credits granted at first sign-in.
    pub signup_credits: i64,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let database = env::var("DATABASE_URL").ok().map(|url| DatabaseSettings {
            url,
            max_connections: parsed("DB_MAX_CONNECTIONS", 20),
            min_connections: parsed("DB_MIN_CONNECTIONS", 2),
        });

        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parsed("PORT", 8080),
            database,
            feed_limit: parsed("FEED_LIMIT", 50),
            like_max_attempts: parsed("LIKE_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS),
            signup_credits: parsed("SIGNUP_CREDITS", DEFAULT_SIGNUP_CREDITS),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            database: None,
            feed_limit: 50,
            like_max_attempts: DEFAULT_MAX_ATTEMPTS,
            signup_credits: DEFAULT_SIGNUP_CREDITS,
        }
    }
}

fn parsed<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "Unparseable setting, using default");
            default
        }),
        Err(_) => default,
    }
}
