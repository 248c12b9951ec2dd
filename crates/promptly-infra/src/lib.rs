//! # Promptly Infrastructure
//!
//! Concrete implementations of the ports defined in `promptly-core`.
//!
//! ## Feature Flags
//!
//! - `full` (default) - All features enabled
//! - `minimal` - No external dependencies, in-memory only
//! - `postgres` - PostgreSQL document store via SeaORM
//! - `auth` - JWT identity tokens

pub mod store;

#[cfg(feature = "postgres")]
pub mod database;

#[cfg(feature = "auth")]
pub mod auth;

pub use store::{ChangeFeed, InMemoryDocumentStore};

#[cfg(feature = "postgres")]
pub use database::{DatabaseConfig, PostgresDocumentStore};

#[cfg(feature = "auth")]
pub use auth::{JwtConfig, JwtTokenService};
